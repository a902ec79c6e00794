use std::sync::Arc;

use tracing::warn;

use crate::error::StorageError;
use crate::state::Settings;
use crate::storage::{Storage, SETTINGS_KEY};

#[derive(Clone)]
pub struct SettingsStore {
    storage: Arc<dyn Storage>,
    token_override: Option<String>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            token_override: None,
        }
    }

    /// A token that wins over the stored one for this process only (e.g.
    /// from the environment). It is never written back.
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        self.token_override = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Stored settings, or defaults when absent or unreadable.
    pub fn get(&self) -> Settings {
        let raw = match self.storage.get_item(SETTINGS_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read settings: {}", e);
                return Settings::default();
            }
        };

        raw.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| warn!("Discarding unreadable settings record: {}", e))
                .ok()
        })
        .unwrap_or_default()
    }

    /// Replace the stored record wholesale.
    pub fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        let json = serde_json::to_string(settings)?;
        self.storage.set_item(SETTINGS_KEY, &json)
    }

    /// The token to authenticate with, if one is configured.
    pub fn api_token(&self) -> Option<String> {
        if let Some(token) = &self.token_override {
            return Some(token.trim().to_string());
        }
        let token = self.get().api_token;
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    pub fn token_source(&self) -> Option<&'static str> {
        if self.token_override.is_some() {
            Some("env")
        } else if self.api_token().is_some() {
            Some("saved")
        } else {
            None
        }
    }
}
