use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::ai::{ChatClient, ChatRequest, CompletionTransport};
use crate::config::Config;
use crate::error::ProcessError;
use crate::mode::{Mode, Style};
use crate::prompt::build_instruction;
use crate::retry::{RetryPolicy, RetryState};
use crate::settings::SettingsStore;
use crate::state::{ProcessingRequest, ProcessingResult, Term, DEFAULT_CONTEXT_NOTE};

/// Sends processing requests to the model and turns the reply into a
/// [`ProcessingResult`], retrying transient failures.
#[derive(Clone)]
pub struct Dispatcher<T> {
    transport: T,
    settings: SettingsStore,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl Dispatcher<ChatClient> {
    pub fn from_config(config: &Config, settings: SettingsStore) -> Self {
        Dispatcher::new(ChatClient::new(&config.base_url), settings, &config.chat_model)
            .with_temperature(config.temperature)
            .with_policy(config.retry_policy())
    }
}

impl<T: CompletionTransport> Dispatcher<T> {
    pub fn new(transport: T, settings: SettingsStore, model: &str) -> Self {
        Self {
            transport,
            settings,
            model: model.to_string(),
            temperature: crate::config::DEFAULT_TEMPERATURE,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn process(
        &self,
        text: &str,
        mode: Mode,
        style: Style,
    ) -> Result<ProcessingResult, ProcessError> {
        self.process_request(&ProcessingRequest::new(text, mode, style))
            .await
    }

    pub async fn process_request(
        &self,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult, ProcessError> {
        let token = self
            .settings
            .api_token()
            .ok_or(ProcessError::MissingCredential)?;

        let instruction = build_instruction(request.mode, request.style);
        let chat_request =
            ChatRequest::json_object(&self.model, &instruction, &request.text, self.temperature);

        let mut state = RetryState::start();
        let mut content = None;
        let mut last_error = None;

        while !state.is_terminal() {
            match state {
                RetryState::Attempting(attempt) => {
                    debug!(attempt, mode = request.mode.as_str(), "dispatching request");
                    match self.transport.complete(&chat_request, &token).await {
                        Ok(reply) => {
                            content = Some(reply);
                            state = state.on_success();
                        }
                        Err(err) => {
                            let retryable = err.is_retryable();
                            warn!(attempt, retryable, "attempt failed: {}", err);
                            state = state.on_failure(&self.policy, retryable);
                            last_error = Some(err);
                        }
                    }
                }
                RetryState::BackingOff(attempt, delay) => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
                    tokio::time::sleep(delay).await;
                    state = state.resume();
                }
                RetryState::Succeeded | RetryState::Failed { .. } => {}
            }
        }

        match state {
            RetryState::Failed { attempts, retryable } => {
                let err = last_error
                    .take()
                    .unwrap_or_else(|| ProcessError::Network("request failed".to_string()));
                if retryable {
                    return Err(ProcessError::RetriesExhausted {
                        attempts,
                        last_error: err.to_string(),
                    });
                }
                Err(err)
            }
            _ => {
                let result = parse_content(content.as_deref().unwrap_or_default())?;
                info!(
                    model = %self.model,
                    mode = request.mode.as_str(),
                    terms = result.terms.len(),
                    "request processed"
                );
                Ok(result)
            }
        }
    }
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```(?:[^\n]*\n)?(.*?)\r?\n?```$").expect("fence pattern is valid")
    })
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match fence_pattern().captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

fn has_control_chars(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

#[derive(Deserialize)]
struct RawTerm {
    #[serde(default)]
    original: String,
    #[serde(default)]
    translation: String,
    #[serde(default)]
    definition: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    translated_text: Option<String>,
    terms: Option<Vec<RawTerm>>,
    context_note: Option<String>,
}

/// Validate and normalize the model's message content.
pub fn parse_content(content: &str) -> Result<ProcessingResult, ProcessError> {
    let body = strip_code_fence(content);

    if has_control_chars(body) {
        return Err(ProcessError::MalformedResponse(
            "response contains control characters".to_string(),
        ));
    }

    let raw: RawResult = serde_json::from_str(body)
        .map_err(|e| ProcessError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let translated_text = raw
        .translated_text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ProcessError::MalformedResponse("missing translatedText".to_string()))?;

    let terms = raw
        .terms
        .unwrap_or_default()
        .into_iter()
        .map(|t| Term {
            original: t.original,
            translation: t.translation,
            definition: t.definition,
        })
        .collect();

    let context_note = raw
        .context_note
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONTEXT_NOTE.to_string());

    Ok(ProcessingResult {
        translated_text,
        terms,
        context_note,
    })
}
