use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] setkeeper_core::Error),
    #[error(transparent)]
    Config(#[from] setkeeper_core::ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
    #[error("Failed to read draft {path}: {reason}")]
    InvalidDraftFile { path: String, reason: String },
    #[error("Draft has {0} validation error(s)")]
    ValidationFailed(usize),
    #[error("Stored copy changed since the draft was loaded; rerun with --overwrite to replace it")]
    Conflict,
    #[error("Save failed after {attempts} attempt(s): {reason}")]
    SaveFailed { attempts: u32, reason: String },
}
