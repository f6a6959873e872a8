//! Save coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// How the coordinator reacts when the store reports a revision mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Re-send the local draft, replacing the remote copy.
    #[default]
    Overwrite,
    /// Apply locally changed fields on top of the remote copy.
    Merge,
    /// Stay in `conflict` until `resolve_conflict` is called.
    Prompt,
}

impl std::str::FromStr for ConflictResolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "merge" => Ok(Self::Merge),
            "prompt" => Ok(Self::Prompt),
            other => Err(ConfigError::Invalid(format!(
                "conflict resolution must be overwrite, merge or prompt (got '{other}')"
            ))),
        }
    }
}

/// Configuration for the save coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaveConfig {
    /// Quiet period before a normal/low priority save runs.
    ///
    /// Additional edits restart the window.
    pub debounce_ms: u64,

    /// Automatic retries after the first failed attempt.
    pub max_retries: u32,

    /// Base delay for linear retry backoff (`retry_delay_ms * retry_count`).
    pub retry_delay_ms: u64,

    pub conflict_resolution: ConflictResolution,

    /// Refuse to queue drafts that fail validation.
    pub enabled_when_valid: bool,

    /// Number of save results kept for diagnostics.
    pub history_limit: usize,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            max_retries: 3,
            retry_delay_ms: 1000,
            conflict_resolution: ConflictResolution::Overwrite,
            enabled_when_valid: false,
            history_limit: 50,
        }
    }
}

impl SaveConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "save history_limit must be at least 1".to_string(),
            ));
        }
        if self.max_retries > 20 {
            return Err(ConfigError::Invalid(format!(
                "save max_retries must be at most 20 (got {})",
                self.max_retries
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SaveConfig::default();
        assert_eq!(config.debounce(), Duration::from_secs(2));
        assert_eq!(config.conflict_resolution, ConflictResolution::Overwrite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SaveConfig = serde_json::from_str(r#"{"max_retries": 1}"#).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_rejects_zero_history() {
        let config = SaveConfig {
            history_limit: 0,
            ..SaveConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conflict_resolution_parse() {
        assert_eq!(
            "Prompt".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::Prompt
        );
        assert!("ask".parse::<ConflictResolution>().is_err());
    }
}
