pub mod chat;
pub mod transcription;

#[cfg(test)]
pub(crate) mod test_server;

pub use chat::{ChatClient, ChatMessage, ChatRequest, CompletionTransport};
pub use transcription::{append_transcript, TranscriptionClient, DEFAULT_ASR_MODEL};
