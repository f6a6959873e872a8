//! JSON-file store: one `<id>.json` per workout in a directory.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{next_revision, stored_id, SaveAttempt, StoreError, StoreResult, WorkoutStore};
use crate::models::{Workout, WorkoutId};

/// Directory-backed store used by the CLI.
#[derive(Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &WorkoutId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Load a stored workout, if present.
    pub async fn load(&self, id: &WorkoutId) -> crate::Result<Option<Workout>> {
        match tokio::fs::read_to_string(self.path_for(id)).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn write(&self, attempt: SaveAttempt) -> StoreResult<Workout> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|error| StoreError::transient(format!("failed to create store dir: {error}")))?;

        let existing = match attempt.draft.id {
            Some(id) => self
                .load(&id)
                .await
                .map_err(|error| StoreError::transient(error.to_string()))?,
            None => None,
        };
        let stored = next_revision(existing.as_ref(), attempt)?;

        let body = serde_json::to_string_pretty(&stored)
            .map_err(|error| StoreError::transient(format!("failed to encode workout: {error}")))?;
        let path = self.path_for(&stored_id(&stored));
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, body)
            .await
            .map_err(|error| StoreError::transient(format!("failed to write {}: {error}", temp_path.display())))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|error| StoreError::transient(format!("failed to replace {}: {error}", path.display())))?;

        tracing::debug!(path = %path.display(), revision = stored.metadata.revision, "Wrote workout file");
        Ok(stored)
    }
}

impl WorkoutStore for JsonFileStore {
    fn save(&self, attempt: SaveAttempt) -> impl Future<Output = StoreResult<Workout>> + Send {
        let store = self.clone();
        async move { store.write(attempt).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    #[tokio::test]
    async fn writes_and_reloads_workout() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let stored = store
            .save(SaveAttempt {
                draft: Workout::new("Leg Day", 30, Difficulty::Beginner),
                overwrite: false,
            })
            .await
            .unwrap();
        let id = stored.id.unwrap();

        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded, Some(stored));
        assert!(!store.path_for(&id).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn stale_draft_conflicts_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let first = store
            .save(SaveAttempt {
                draft: Workout::new("Arms", 25, Difficulty::Beginner),
                overwrite: false,
            })
            .await
            .unwrap();
        store
            .save(SaveAttempt {
                draft: first.clone(),
                overwrite: false,
            })
            .await
            .unwrap();

        let error = store
            .save(SaveAttempt {
                draft: first,
                overwrite: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Conflict { actual: 2, .. }));
    }
}
