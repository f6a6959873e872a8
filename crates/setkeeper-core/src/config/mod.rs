//! Engine configuration.
//!
//! One fully-enumerated struct per component, aggregated in [`EngineConfig`].
//! Values come from defaults, an optional JSON document, and `SETKEEPER_*`
//! environment overrides, in that order. Everything is validated before a
//! component is built.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::changes::ChangeDetectionConfig;
use crate::notify::NotificationConfig;
use crate::save::{ConflictResolution, SaveConfig};
use crate::validation::ValidationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub save: SaveConfig,
    pub changes: ChangeDetectionConfig,
    pub validation: ValidationConfig,
    pub notifications: NotificationConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document; missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `SETKEEPER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Apply `SETKEEPER_*` environment overrides on top of `self`.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        self.with_lookup(|name| values.get(name).cloned())
    }

    /// Defaults overridden by variables resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::default().with_lookup(lookup)
    }

    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let save = &mut self.save;
        override_with(&lookup, "SETKEEPER_SAVE_DEBOUNCE_MS", &mut save.debounce_ms)?;
        override_with(&lookup, "SETKEEPER_MAX_RETRIES", &mut save.max_retries)?;
        override_with(&lookup, "SETKEEPER_RETRY_DELAY_MS", &mut save.retry_delay_ms)?;
        override_with(&lookup, "SETKEEPER_HISTORY_LIMIT", &mut save.history_limit)?;
        if let Some(value) = optional_trimmed(&lookup, "SETKEEPER_CONFLICT_RESOLUTION") {
            save.conflict_resolution = value.parse::<ConflictResolution>()?;
        }
        override_flag(&lookup, "SETKEEPER_ENABLED_WHEN_VALID", &mut save.enabled_when_valid)?;

        let changes = &mut self.changes;
        override_with(&lookup, "SETKEEPER_CHANGE_DEBOUNCE_MS", &mut changes.debounce_ms)?;
        override_flag(&lookup, "SETKEEPER_DEEP_COMPARE", &mut changes.deep_compare)?;
        override_flag(&lookup, "SETKEEPER_CONFIRM_ON_NAVIGATE", &mut changes.confirm_on_navigate)?;
        override_flag(&lookup, "SETKEEPER_CONFIRM_ON_CLOSE", &mut changes.confirm_on_close)?;
        override_flag(&lookup, "SETKEEPER_AUTO_SAVE", &mut changes.auto_save_enabled)?;
        if let Some(fields) = optional_trimmed(&lookup, "SETKEEPER_EXCLUDE_FIELDS") {
            changes.exclude_fields = fields
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(String::from)
                .collect();
        }

        let validation = &mut self.validation;
        override_flag(&lookup, "SETKEEPER_CACHE_ENABLED", &mut validation.enable_caching)?;
        override_with(&lookup, "SETKEEPER_CACHE_TTL_MS", &mut validation.cache_ttl_ms)?;
        override_flag(&lookup, "SETKEEPER_SUGGESTIONS", &mut validation.enable_suggestions)?;
        override_with(&lookup, "SETKEEPER_MAX_SUGGESTIONS", &mut validation.max_suggestions)?;
        override_flag(&lookup, "SETKEEPER_CONTEXTUAL_VALIDATION", &mut validation.contextual_validation)?;

        override_with(
            &lookup,
            "SETKEEPER_NOTIFY_MAX_VISIBLE",
            &mut self.notifications.max_visible,
        )?;

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.save.validate()?;
        self.changes.validate()?;
        self.validation.validate()?;
        self.notifications.validate()
    }
}

fn override_with<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = optional_trimmed(lookup, name) {
        *target = value
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative integer (got '{value}')")))?;
    }
    Ok(())
}

fn override_flag(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut bool,
) -> Result<(), ConfigError> {
    if let Some(value) = optional_trimmed(lookup, name) {
        *target = match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be true or false (got '{value}')"
                )))
            }
        };
    }
    Ok(())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
