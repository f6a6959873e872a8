//! In-memory store with optimistic revision checks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{next_revision, stored_id, SaveAttempt, StoreError, StoreResult, WorkoutStore};
use crate::models::{Workout, WorkoutId};

/// Thread-safe in-memory workout store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    workouts: Arc<Mutex<HashMap<WorkoutId, Workout>>>,
    attempts: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` saves fail with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Simulate a concurrent edit by another client, bumping the revision.
    pub fn put_remote(&self, mut workout: Workout) -> Workout {
        let mut workouts = self.workouts.lock();
        let id = stored_id(&workout);
        let revision = workouts
            .get(&id)
            .map_or(workout.metadata.revision, |existing| existing.metadata.revision);
        workout.id = Some(id);
        workout.metadata.revision = revision + 1;
        workouts.insert(id, workout.clone());
        workout
    }

    pub fn get(&self, id: &WorkoutId) -> Option<Workout> {
        self.workouts.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.workouts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total save calls received, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn save_now(&self, attempt: SaveAttempt) -> StoreResult<Workout> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if should_fail {
            return Err(StoreError::transient("simulated network failure"));
        }

        let mut workouts = self.workouts.lock();
        let existing = attempt.draft.id.and_then(|id| workouts.get(&id));
        let stored = next_revision(existing, attempt)?;
        workouts.insert(stored_id(&stored), stored.clone());
        Ok(stored)
    }
}

impl WorkoutStore for MemoryStore {
    fn save(&self, attempt: SaveAttempt) -> impl Future<Output = StoreResult<Workout>> + Send {
        let result = self.save_now(attempt);
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn attempt(draft: Workout) -> SaveAttempt {
        SaveAttempt {
            draft,
            overwrite: false,
        }
    }

    #[tokio::test]
    async fn saves_and_updates_with_revisions() {
        let store = MemoryStore::new();
        let first = store
            .save(attempt(Workout::new("Push", 45, Difficulty::Intermediate)))
            .await
            .unwrap();
        let mut edited = first.clone();
        edited.title = "Push Day".to_string();
        let second = store.save(attempt(edited)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.metadata.revision, 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remote_edit_causes_conflict() {
        let store = MemoryStore::new();
        let saved = store
            .save(attempt(Workout::new("Pull", 40, Difficulty::Beginner)))
            .await
            .unwrap();
        let mut remote = saved.clone();
        remote.title = "Pull (coach edit)".to_string();
        store.put_remote(remote);

        let error = store.save(attempt(saved)).await.unwrap_err();
        assert!(matches!(error, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn fail_next_injects_transient_failures() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let draft = Workout::new("Core", 20, Difficulty::Beginner);

        assert!(store.save(attempt(draft.clone())).await.is_err());
        assert!(store.save(attempt(draft)).await.is_ok());
        assert_eq!(store.attempts(), 2);
    }
}
