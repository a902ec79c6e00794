//! UI-agnostic data types
//!
//! Shared between the terminal front end and anything else that embeds the
//! core library. Field names serialize in camelCase so stored history stays
//! readable by the web build.

use serde::{Deserialize, Serialize};

use crate::mode::{Mode, Style};

/// Placeholder used when the model omits the context note.
pub const DEFAULT_CONTEXT_NOTE: &str = "暂无说明。";

/// A single text submitted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub text: String,
    pub mode: Mode,
    pub style: Style,
}

impl ProcessingRequest {
    pub fn new(text: impl Into<String>, mode: Mode, style: Style) -> Self {
        Self {
            text: text.into(),
            mode,
            style,
        }
    }
}

/// An extracted concept with its rendering and a short definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub original: String,
    pub translation: String,
    pub definition: String,
}

/// Normalized output of one model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub translated_text: String,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub context_note: String,
}

/// A persisted record of one completed request. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    pub original_text: String,
    pub translated_text: String,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub context_note: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub style: Style,
}

impl HistoryEntry {
    pub fn result(&self) -> ProcessingResult {
        ProcessingResult {
            translated_text: self.translated_text.clone(),
            terms: self.terms.clone(),
            context_note: self.context_note.clone(),
        }
    }

    /// First line of the original text, shortened for list views.
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.original_text.lines().next().unwrap_or_default().trim();
        if first_line.chars().count() > max_chars {
            let truncated: String = first_line.chars().take(max_chars).collect();
            format!("{}…", truncated)
        } else {
            first_line.to_string()
        }
    }
}

/// The single persisted settings record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_token: String,
}
