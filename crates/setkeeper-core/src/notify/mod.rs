//! User-facing notifications published by the save coordinator and the
//! change detector.
//!
//! The hub only keeps state; rendering and auto-dismiss timers belong to
//! whoever drives [`NotificationHub::expire`].

mod config;
mod hub;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

pub use config::NotificationConfig;
pub use hub::NotificationHub;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
    Loading,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Loading => "loading",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type ActionCallback = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// A labelled button on a notification.
#[derive(Clone)]
pub struct NotificationAction {
    pub label: String,
    callback: ActionCallback,
}

impl NotificationAction {
    /// `callback` reports failure as `Err(message)`.
    pub fn new(
        label: impl Into<String>,
        callback: impl Fn() -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            callback: Arc::new(callback),
        }
    }

    fn invoke(&self) -> Result<(), String> {
        (self.callback)()
    }
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A notification about to be published.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    /// Overrides the configured lifetime; `Some(Duration::ZERO)` is persistent
    pub duration: Option<Duration>,
    pub actions: Vec<NotificationAction>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            priority: NotificationPriority::Normal,
            duration: None,
            actions: Vec::new(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message).with_priority(NotificationPriority::High)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message).with_priority(NotificationPriority::Low)
    }

    pub fn loading(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Loading, title, message)
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }

    fn dedupe_key(&self) -> String {
        format!("{}\u{1f}{}\u{1f}{}", self.kind, self.title, self.message)
    }
}

/// A visible notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    /// `None` stays until dismissed
    pub lifetime: Option<Duration>,
    pub actions: Vec<NotificationAction>,
    pub created_at: Instant,
    dedupe_key: String,
}

impl Notification {
    pub const fn is_persistent(&self) -> bool {
        self.lifetime.is_none()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.lifetime.map(|lifetime| self.created_at + lifetime)
    }
}
