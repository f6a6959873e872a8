//! Change detection: what differs between the draft and the last persisted
//! snapshot, plus the confirmation workflow guarding destructive actions.

mod config;
mod confirm;
mod detector;
mod diff;

pub use config::ChangeDetectionConfig;
pub use confirm::{ConfirmationKind, ConfirmationPhase, ConfirmationPrompt, ConfirmationState};
pub use detector::{ChangeDetector, ChangeState};
pub use diff::{diff_workouts, merge_onto_remote, ChangeSet};

/// Fields that change on every save and never count as user edits.
pub const VOLATILE_FIELDS: [&str; 4] = [
    "id",
    "metadata.created_at",
    "metadata.updated_at",
    "metadata.revision",
];
