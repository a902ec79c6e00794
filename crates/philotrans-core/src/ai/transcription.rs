use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ProcessError;

pub const DEFAULT_ASR_MODEL: &str = "TeleAI/TeleSpeechASR";

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Speech-to-text over an OpenAI-compatible `/audio/transcriptions` endpoint.
#[derive(Clone)]
pub struct TranscriptionClient {
    client: Client,
    base_url: String,
    model: String,
}

impl TranscriptionClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        api_token: &str,
    ) -> Result<String, ProcessError> {
        if api_token.trim().is_empty() {
            return Err(ProcessError::MissingCredential);
        }

        debug!(bytes = audio.len(), file_name, "uploading audio for transcription");

        let part = multipart::Part::bytes(audio).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_token.trim())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| format!("request failed: {}", status));
            return Err(ProcessError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProcessError::Network(e.to_string()))?;
        let result: TranscriptionResponse = serde_json::from_slice(&body)
            .map_err(|e| ProcessError::MalformedResponse(format!("unexpected response body: {}", e)))?;
        let text = result.text.trim().to_string();
        if text.is_empty() {
            return Err(ProcessError::MalformedResponse("no speech recognised".to_string()));
        }

        info!(chars = text.chars().count(), "transcription complete");
        Ok(text)
    }
}

/// Append transcribed speech to whatever the user already typed.
pub fn append_transcript(existing: &str, transcript: &str) -> String {
    if existing.trim().is_empty() {
        transcript.to_string()
    } else {
        format!("{} {}", existing.trim_end(), transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_token_fails_before_upload() {
        let client = TranscriptionClient::new("http://127.0.0.1:9", DEFAULT_ASR_MODEL);
        let err = client
            .transcribe(vec![0u8; 4], "recording.webm", "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::MissingCredential));
    }

    #[test]
    fn transcript_appends_with_single_space() {
        assert_eq!(append_transcript("", "hello"), "hello");
        assert_eq!(append_transcript("Dasein ist ", "In-der-Welt-sein"), "Dasein ist In-der-Welt-sein");
    }

    #[test]
    fn endpoint_is_under_base_url() {
        let client = TranscriptionClient::new("https://api.siliconflow.cn/v1", DEFAULT_ASR_MODEL);
        assert_eq!(client.endpoint(), "https://api.siliconflow.cn/v1/audio/transcriptions");
    }

    use crate::ai::test_server::{reply, serve, truncated_reply};

    #[tokio::test]
    async fn uploads_file_and_model_parts() {
        let server = serve(vec![reply("200 OK", r#"{"text":"  存在先于本质 "}"#)]).await;
        let client = TranscriptionClient::new(&server.base_url, DEFAULT_ASR_MODEL);

        let text = client
            .transcribe(b"RIFFfake".to_vec(), "clip.wav", "sk-test")
            .await
            .unwrap();
        assert_eq!(text, "存在先于本质");

        let requests = server.requests.await.unwrap();
        let raw = requests[0].to_ascii_lowercase();
        assert!(raw.starts_with("post /audio/transcriptions "), "request was {}", raw);
        assert!(raw.contains("authorization: bearer sk-test"));
        assert!(raw.contains("multipart/form-data"));
        assert!(raw.contains(r#"name="file"; filename="clip.wav""#));
        assert!(raw.contains(r#"name="model""#));
        assert!(raw.contains("teleai/telespeechasr"));
        assert!(raw.contains("rifffake"));
    }

    #[tokio::test]
    async fn error_status_surfaces_server_message() {
        let body = r#"{"code":20015,"message":"audio too short"}"#;
        let server = serve(vec![reply("400 Bad Request", body)]).await;
        let err = TranscriptionClient::new(&server.base_url, DEFAULT_ASR_MODEL)
            .transcribe(vec![1, 2, 3], "clip.wav", "sk")
            .await
            .unwrap_err();

        match err {
            ProcessError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "audio too short");
            }
            other => panic!("expected Http, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_status_without_message_names_the_status() {
        let server = serve(vec![reply("500 Internal Server Error", "oops")]).await;
        let err = TranscriptionClient::new(&server.base_url, DEFAULT_ASR_MODEL)
            .transcribe(vec![1, 2, 3], "clip.wav", "sk")
            .await
            .unwrap_err();

        match err {
            ProcessError::Http { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("500"), "message was {}", message);
            }
            other => panic!("expected Http, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_text_means_no_speech() {
        let server = serve(vec![reply("200 OK", r#"{"text":"   "}"#)]).await;
        let err = TranscriptionClient::new(&server.base_url, DEFAULT_ASR_MODEL)
            .transcribe(vec![1, 2, 3], "clip.wav", "sk")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProcessError::MalformedResponse(ref m) if m == "no speech recognised"),
            "got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn body_cut_short_is_a_network_error() {
        let server = serve(vec![truncated_reply()]).await;
        let err = TranscriptionClient::new(&server.base_url, DEFAULT_ASR_MODEL)
            .transcribe(vec![1, 2, 3], "clip.wav", "sk")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Network(_)), "got {:?}", err);
    }
}
