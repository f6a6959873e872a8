//! Remote workout stores consumed by the save coordinator.
//!
//! A store is the injected save function: it receives one attempt and
//! reports the outcome through `Result`. Expected failures (network, server,
//! revision mismatch) are values; a panicking store is caught by the
//! coordinator and recorded as a generic failure.

mod file;
mod memory;

use std::future::Future;

use chrono::Utc;
use thiserror::Error;

use crate::models::{Workout, WorkoutId};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// One call into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveAttempt {
    pub draft: Workout,
    /// Ignore revision mismatches and replace the remote copy
    pub overwrite: bool,
}

/// Expected store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network or server failure; safe to retry
    #[error("{0}")]
    Transient(String),

    /// The remote copy changed since the draft's base revision
    #[error("Revision conflict: draft based on {expected}, remote is at {actual}")]
    Conflict {
        expected: u64,
        actual: u64,
        remote: Option<Box<Workout>>,
    },
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence backend for workouts
pub trait WorkoutStore: Send + Sync + 'static {
    /// Persist the attempt's draft and return the stored copy (with id and revision).
    fn save(&self, attempt: SaveAttempt) -> impl Future<Output = StoreResult<Workout>> + Send;
}

/// Adapter turning an async closure into a [`WorkoutStore`].
pub struct FnStore<F>(F);

/// Wrap an async closure as a store.
pub const fn save_fn<F, Fut>(save: F) -> FnStore<F>
where
    F: Fn(SaveAttempt) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<Workout>> + Send + 'static,
{
    FnStore(save)
}

impl<F, Fut> WorkoutStore for FnStore<F>
where
    F: Fn(SaveAttempt) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<Workout>> + Send + 'static,
{
    fn save(&self, attempt: SaveAttempt) -> impl Future<Output = StoreResult<Workout>> + Send {
        (self.0)(attempt)
    }
}

/// Apply optimistic revision rules to produce the copy that gets stored.
///
/// New workouts get an id and revision 1. Existing workouts must be based on
/// the current remote revision unless `overwrite` is set.
pub(crate) fn next_revision(existing: Option<&Workout>, attempt: SaveAttempt) -> StoreResult<Workout> {
    let SaveAttempt {
        mut draft,
        overwrite,
    } = attempt;
    let now = Utc::now();

    match existing {
        Some(remote) => {
            if !overwrite && draft.metadata.revision != remote.metadata.revision {
                return Err(StoreError::Conflict {
                    expected: draft.metadata.revision,
                    actual: remote.metadata.revision,
                    remote: Some(Box::new(remote.clone())),
                });
            }
            draft.metadata.revision = remote.metadata.revision + 1;
            draft.metadata.created_at = remote.metadata.created_at.or(Some(now));
        }
        None => {
            draft.metadata.revision += 1;
            draft.metadata.created_at = draft.metadata.created_at.or(Some(now));
        }
    }

    draft.id = Some(draft.id.unwrap_or_default());
    draft.metadata.updated_at = Some(now);
    Ok(draft)
}

/// Identifier a stored workout is filed under.
pub(crate) fn stored_id(workout: &Workout) -> WorkoutId {
    workout.id.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    #[test]
    fn new_workout_gets_id_and_first_revision() {
        let attempt = SaveAttempt {
            draft: Workout::new("Leg Day", 30, Difficulty::Beginner),
            overwrite: false,
        };
        let stored = next_revision(None, attempt).unwrap();
        assert!(stored.id.is_some());
        assert_eq!(stored.metadata.revision, 1);
        assert!(stored.metadata.created_at.is_some());
    }

    #[test]
    fn stale_revision_conflicts_unless_overwriting() {
        let mut remote = Workout::new("Leg Day", 30, Difficulty::Beginner);
        remote.id = Some(WorkoutId::new());
        remote.metadata.revision = 3;

        let mut draft = remote.clone();
        draft.metadata.revision = 2;
        draft.title = "Leg Day II".to_string();

        let conflict = next_revision(
            Some(&remote),
            SaveAttempt {
                draft: draft.clone(),
                overwrite: false,
            },
        )
        .unwrap_err();
        assert!(matches!(
            conflict,
            StoreError::Conflict {
                expected: 2,
                actual: 3,
                ..
            }
        ));

        let stored = next_revision(
            Some(&remote),
            SaveAttempt {
                draft,
                overwrite: true,
            },
        )
        .unwrap();
        assert_eq!(stored.metadata.revision, 4);
        assert_eq!(stored.title, "Leg Day II");
    }
}
