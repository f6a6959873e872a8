//! Error types for setkeeper-core

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias using setkeeper-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in setkeeper-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid engine configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The save coordinator task is no longer running
    #[error("Save coordinator has shut down")]
    CoordinatorClosed,

    /// A forced save found no pending draft to persist
    #[error("Nothing to save")]
    NothingToSave,

    /// The draft failed validation and saving is gated on validity
    #[error("Save blocked by validation: {}", .0.join("; "))]
    BlockedByValidation(Vec<String>),

    /// Pending work was discarded before it produced a result
    #[error("Save request was cancelled")]
    Cancelled,

    /// A conflict resolution was requested while no conflict is pending
    #[error("No save conflict is pending")]
    NoPendingConflict,

    /// A confirmation dialog is already open
    #[error("A {0} confirmation is already shown")]
    ConfirmationPending(String),

    /// A confirmation was resolved while none is shown
    #[error("No confirmation is shown")]
    NoConfirmation,

    /// Unknown validation field name
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Notification lookup failed
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    /// Store IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
