//! Validation cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub enable_caching: bool,

    /// How long a cached result is served before it is recomputed.
    pub cache_ttl_ms: u64,

    pub enable_suggestions: bool,

    /// Attach tier-aware context (ceilings, volume) to results.
    pub contextual_validation: bool,

    /// Upper bound on suggestions per result.
    pub max_suggestions: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            cache_ttl_ms: 5000,
            enable_suggestions: true,
            contextual_validation: true,
            max_suggestions: 5,
        }
    }
}

impl ValidationConfig {
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_caching && self.cache_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache_ttl_ms must be positive when caching is enabled".to_string(),
            ));
        }
        if self.enable_suggestions && !(1..=20).contains(&self.max_suggestions) {
            return Err(ConfigError::Invalid(format!(
                "max_suggestions must be between 1 and 20 (got {})",
                self.max_suggestions
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
        let config = ValidationConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.max_suggestions, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected_only_with_caching() {
        let mut config = ValidationConfig {
            cache_ttl_ms: 0,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());
        config.enable_caching = false;
        assert!(config.validate().is_ok());
    }
}
