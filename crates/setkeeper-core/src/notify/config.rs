//! Notification hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::NotificationKind;
use crate::config::ConfigError;

/// Auto-dismiss durations in milliseconds; `0` keeps a notification until dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationConfig {
    pub success_ms: u64,
    pub warning_ms: u64,
    pub info_ms: u64,
    pub error_ms: u64,
    pub loading_ms: u64,

    /// Oldest low-priority transient entries are evicted beyond this.
    pub max_visible: usize,

    /// Identical notifications inside this window are collapsed.
    pub dedupe_window_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            success_ms: 4000,
            warning_ms: 6000,
            info_ms: 3000,
            error_ms: 0,
            loading_ms: 0,
            max_visible: 5,
            dedupe_window_ms: 1000,
        }
    }
}

impl NotificationConfig {
    /// Default lifetime for `kind`, `None` when persistent.
    pub const fn lifetime(&self, kind: NotificationKind) -> Option<Duration> {
        let ms = match kind {
            NotificationKind::Success => self.success_ms,
            NotificationKind::Warning => self.warning_ms,
            NotificationKind::Info => self.info_ms,
            NotificationKind::Error => self.error_ms,
            NotificationKind::Loading => self.loading_ms,
        };
        if ms == 0 {
            None
        } else {
            Some(Duration::from_millis(ms))
        }
    }

    pub const fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_visible == 0 {
            return Err(ConfigError::Invalid(
                "notification max_visible must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
