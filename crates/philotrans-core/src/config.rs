use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::DEFAULT_ASR_MODEL;
use crate::history::MAX_HISTORY_ENTRIES;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_CHAT_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

const APP_DIR: &str = "philotrans";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub chat_model: String,
    pub asr_model: String,
    pub temperature: f32,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub history_limit: usize,
    pub data_dir: Option<PathBuf>,
    /// Session-only token from `PHILOTRANS_API_TOKEN`; never saved.
    #[serde(skip)]
    pub token_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            asr_model: DEFAULT_ASR_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 1000,
            history_limit: MAX_HISTORY_ENTRIES,
            data_dir: None,
            token_override: None,
        }
    }
}

impl Config {
    /// Load from the platform config dir, falling back to defaults when the
    /// file does not exist, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let mut config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("PHILOTRANS_BASE_URL") {
            self.base_url = url.trim().to_string();
        }
        if let Some(model) = non_empty("PHILOTRANS_MODEL") {
            self.chat_model = model.trim().to_string();
        }
        self.token_override = non_empty("PHILOTRANS_API_TOKEN").map(|t| t.trim().to_string());
    }

    fn normalize(&mut self) {
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.max_attempts = self.max_attempts.max(1);
        self.history_limit = self.history_limit.clamp(1, MAX_HISTORY_ENTRIES);
        if self.base_url.trim().is_empty() {
            self.base_url = DEFAULT_BASE_URL.to_string();
        }
        if self.chat_model.trim().is_empty() {
            self.chat_model = DEFAULT_CHAT_MODEL.to_string();
        }
        if self.asr_model.trim().is_empty() {
            self.asr_model = DEFAULT_ASR_MODEL.to_string();
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join(APP_DIR))
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("storage.db"))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("logs"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"chat_model": "deepseek-ai/DeepSeek-V3", "max_attempts": 0}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.chat_model, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            base_delay_ms: 250,
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.storage_path().unwrap(), dir.path().join("storage.db"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "PHILOTRANS_MODEL" => Some("m2".to_string()),
            "PHILOTRANS_API_TOKEN" => Some(" sk-env ".to_string()),
            "PHILOTRANS_BASE_URL" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.chat_model, "m2");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_override.as_deref(), Some("sk-env"));
    }
}
