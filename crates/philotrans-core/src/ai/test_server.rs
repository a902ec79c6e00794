//! Scripted HTTP server on a loopback port for exercising the real clients.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct Scripted {
    pub base_url: String,
    /// Raw text of every request received, in order.
    pub requests: JoinHandle<Vec<String>>,
}

/// Accept one connection per canned response. Each request is read in full,
/// answered with the response bytes verbatim, and the connection is closed.
pub async fn serve(responses: Vec<String>) -> Scripted {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let requests = tokio::spawn(async move {
        let mut seen = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut stream).await;
            seen.push(String::from_utf8_lossy(&raw).into_owned());
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        }
        seen
    });

    Scripted {
        base_url: format!("http://{}", addr),
        requests,
    }
}

pub fn reply(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

/// A 200 that promises more body than it sends before hanging up.
pub fn truncated_reply() -> String {
    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{\"cho"
        .to_string()
}

async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let body_len = buf.len() - (end + 4);
        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());

        match content_length {
            Some(len) if body_len >= len => break,
            Some(_) => {}
            None if head.contains("transfer-encoding: chunked") => {
                if buf.ends_with(b"0\r\n\r\n") {
                    break;
                }
            }
            None => break,
        }
    }
    buf
}
