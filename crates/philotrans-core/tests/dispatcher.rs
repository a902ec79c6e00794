use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use philotrans_core::ai::ChatRequest;
use philotrans_core::{
    CompletionTransport, Dispatcher, HistoryStore, MemoryStorage, Mode, ProcessError,
    ProcessingRequest, RetryPolicy, Settings, SettingsStore, Style,
};
use tokio::time::Instant;

const REPLY: &str = r#"{"translatedText":"先验的","terms":[{"original":"transzendental","translation":"先验的","definition":"关于认识之可能性条件的"}],"contextNote":"康德"}"#;

/// Replays a fixed script of replies and records every request it sees.
#[derive(Clone, Default)]
struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Result<String, ProcessError>>>>,
    seen: Arc<Mutex<Vec<(ChatRequest, String)>>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<String, ProcessError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            seen: Arc::default(),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl CompletionTransport for ScriptedTransport {
    async fn complete(&self, request: &ChatRequest, api_token: &str) -> Result<String, ProcessError> {
        self.seen
            .lock()
            .unwrap()
            .push((request.clone(), api_token.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessError::Network("script exhausted".to_string())))
    }
}

fn http(status: u16) -> ProcessError {
    ProcessError::Http {
        status,
        message: format!("status {}", status),
    }
}

fn settings_with_token(token: &str) -> SettingsStore {
    let store = SettingsStore::new(Arc::new(MemoryStorage::new()));
    store
        .save(&Settings {
            api_token: token.to_string(),
        })
        .unwrap();
    store
}

fn dispatcher(transport: &ScriptedTransport, settings: SettingsStore) -> Dispatcher<ScriptedTransport> {
    Dispatcher::new(transport.clone(), settings, "test-model")
}

#[tokio::test]
async fn missing_credential_makes_no_calls() {
    let transport = ScriptedTransport::new(vec![Ok(REPLY.to_string())]);
    let settings = SettingsStore::new(Arc::new(MemoryStorage::new()));

    let err = dispatcher(&transport, settings)
        .process("Sein und Zeit", Mode::Translation, Style::Academic)
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::MissingCredential));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn request_carries_instruction_token_and_json_format() {
    let transport = ScriptedTransport::new(vec![Ok(REPLY.to_string())]);

    let result = dispatcher(&transport, settings_with_token(" sk-test "))
        .process("transzendental", Mode::Translation, Style::Literal)
        .await
        .unwrap();
    assert_eq!(result.translated_text, "先验的");
    assert_eq!(result.terms.len(), 1);

    let seen = transport.seen.lock().unwrap();
    let (request, token) = &seen[0];
    assert_eq!(token, "sk-test");
    assert_eq!(request.model, "test-model");
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role, "system");
    assert!(request.messages[0].content.contains("直译"));
    assert_eq!(request.messages[1].content, "transzendental");
    assert_eq!(request.response_format.kind, "json_object");
    assert!((request.temperature - 0.3).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn two_transient_failures_then_success_backs_off_one_then_two_seconds() {
    let transport = ScriptedTransport::new(vec![
        Err(http(503)),
        Err(ProcessError::Network("connection reset".to_string())),
        Ok(format!("```json\n{}\n```", REPLY)),
    ]);

    let start = Instant::now();
    let result = dispatcher(&transport, settings_with_token("sk"))
        .process("text", Mode::Note, Style::Academic)
        .await
        .unwrap();

    assert_eq!(result.context_note, "康德");
    assert_eq!(transport.calls(), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3100), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_attempts_and_last_error() {
    let transport = ScriptedTransport::new(vec![Err(http(500)), Err(http(500)), Err(http(503))]);

    let err = dispatcher(&transport, settings_with_token("sk"))
        .process("text", Mode::Meeting, Style::Academic)
        .await
        .unwrap_err();

    match err {
        ProcessError::RetriesExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"), "last error was {}", last_error);
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn non_retryable_status_fails_on_first_attempt() {
    let transport = ScriptedTransport::new(vec![Err(http(401)), Ok(REPLY.to_string())]);

    let err = dispatcher(&transport, settings_with_token("sk"))
        .process("text", Mode::Polish, Style::Academic)
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::Http { status: 401, .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn malformed_content_is_not_retried() {
    let transport = ScriptedTransport::new(vec![
        Ok("{\"translatedText\":\"x\u{0007}\"}".to_string()),
        Ok(REPLY.to_string()),
    ]);

    let err = dispatcher(&transport, settings_with_token("sk"))
        .process("text", Mode::Translation, Style::Academic)
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::MalformedResponse(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_policy_limits_attempts() {
    let transport = ScriptedTransport::new(vec![Err(http(503)), Err(http(503))]);

    let start = Instant::now();
    let err = dispatcher(&transport, settings_with_token("sk"))
        .with_policy(RetryPolicy::new(2, Duration::from_millis(100)))
        .process("text", Mode::Translation, Style::Academic)
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::RetriesExhausted { attempts: 2, .. }));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(200), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn failed_processing_leaves_history_untouched() {
    let storage = Arc::new(MemoryStorage::new());
    let history = HistoryStore::new(storage.clone());
    let settings = SettingsStore::new(storage.clone());
    settings
        .save(&Settings {
            api_token: "sk".to_string(),
        })
        .unwrap();

    let transport = ScriptedTransport::new(vec![Err(http(400)), Ok(REPLY.to_string())]);
    let dispatcher = dispatcher(&transport, settings);

    let request = ProcessingRequest::new("Aufhebung", Mode::Translation, Style::Academic);
    assert!(dispatcher.process_request(&request).await.is_err());
    assert!(history.list().is_empty());

    let result = dispatcher.process_request(&request).await.unwrap();
    let entry = history.append(&request, &result).unwrap();
    assert_eq!(history.list(), vec![entry]);
}
