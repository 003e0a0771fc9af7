//! Runtime configuration
//!
//! Configuration comes from three layers: built-in defaults, an optional
//! JSON file, and the `VIBE_API_KEY` environment variable, which always
//! wins for the API key.

use crate::error::{VibeError, VibeResult};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "VIBE_API_KEY";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub api_key: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            api_key: None,
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from a JSON file, then applies the environment
    /// override
    pub fn from_file(path: impl AsRef<Path>) -> VibeResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VibeError::io(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        let mut config: RuntimeConfig = serde_json::from_str(&contents).map_err(|e| {
            VibeError::general(format!("invalid config '{}': {}", path.display(), e))
        })?;
        config.apply_env();
        Ok(config)
    }

    /// Applies environment overrides in place
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> VibeResult<()> {
        if self.provider.is_empty() {
            return Err(VibeError::general("config: provider must not be empty"));
        }
        if self.model.is_empty() {
            return Err(VibeError::general("config: model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(VibeError::general(format!(
                "config: temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(VibeError::general("config: max_tokens must be positive"));
        }
        if self.timeout_ms == 0 {
            return Err(VibeError::general("config: timeout_ms must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_validate() {
        let config = RuntimeConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"model": "gpt-4", "temperature": 0.2}"#).unwrap();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RuntimeConfig::default();
        config.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.provider = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RuntimeConfig::from_file("/nonexistent/vibe.json").unwrap_err();
        assert!(matches!(err, VibeError::Io { .. }));
    }

    #[test]
    fn test_malformed_json_is_general_error() {
        let path = std::env::temp_dir().join(format!(
            "vibeconfig-malformed-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ \"model\": ").unwrap();

        let err = RuntimeConfig::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, VibeError::General { .. }));
        assert!(err.message().contains("invalid config"));
    }
}
