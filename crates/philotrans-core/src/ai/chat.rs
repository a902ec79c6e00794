use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProcessError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    /// A system + user exchange that asks for a JSON object back.
    pub fn json_object(model: &str, system: &str, user: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Anything that can carry one chat-completion round trip and hand back the
/// raw message content.
pub trait CompletionTransport: Send + Sync {
    fn complete(
        &self,
        request: &ChatRequest,
        api_token: &str,
    ) -> impl Future<Output = Result<String, ProcessError>> + Send;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl CompletionTransport for ChatClient {
    async fn complete(&self, request: &ChatRequest, api_token: &str) -> Result<String, ProcessError> {
        let url = self.endpoint();
        debug!(url = %url, model = %request.model, "sending chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_token)
            .json(request)
            .send()
            .await
            .map_err(|e| ProcessError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProcessError::Http {
                status: status.as_u16(),
                message: if text.is_empty() {
                    status.to_string()
                } else {
                    text
                },
            });
        }

        // A body cut short is a transport fault, only a complete body can be malformed
        let body = response
            .bytes()
            .await
            .map_err(|e| ProcessError::Network(e.to_string()))?;
        let chat_response: ChatResponse = serde_json::from_slice(&body)
            .map_err(|e| ProcessError::MalformedResponse(format!("unexpected response body: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProcessError::MalformedResponse("response has no message content".to_string()))
    }
}
