//! Change detection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::VOLATILE_FIELDS;
use crate::config::ConfigError;

/// Configuration for the change detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChangeDetectionConfig {
    /// Quiet period before the change set is recomputed.
    pub debounce_ms: u64,

    /// Walk nested values instead of comparing serialized top-level fields.
    pub deep_compare: bool,

    /// Field paths ignored when diffing (dotted for nested fields).
    pub exclude_fields: Vec<String>,

    pub confirm_on_navigate: bool,
    pub confirm_on_close: bool,

    /// The save coordinator persists edits on its own; navigation is never blocked.
    pub auto_save_enabled: bool,
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            deep_compare: true,
            exclude_fields: VOLATILE_FIELDS.map(String::from).to_vec(),
            confirm_on_navigate: true,
            confirm_on_close: true,
            auto_save_enabled: false,
        }
    }
}

impl ChangeDetectionConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(field) = self
            .exclude_fields
            .iter()
            .find(|field| field.trim().is_empty() || field.starts_with('.') || field.ends_with('.'))
        {
            return Err(ConfigError::Invalid(format!(
                "exclude_fields entry '{field}' is not a field path"
            )));
        }
        Ok(())
    }
}
