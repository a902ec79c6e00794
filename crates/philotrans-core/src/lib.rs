pub mod ai;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod mode;
pub mod prompt;
pub mod retry;
pub mod settings;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use ai::{ChatClient, CompletionTransport, TranscriptionClient};
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{ProcessError, StorageError};
pub use history::HistoryStore;
pub use mode::{Mode, Style};
pub use prompt::build_instruction;
pub use retry::{RetryPolicy, RetryState};
pub use settings::SettingsStore;
pub use state::{HistoryEntry, ProcessingRequest, ProcessingResult, Settings, Term};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
