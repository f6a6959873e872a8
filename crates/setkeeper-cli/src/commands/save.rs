use std::path::Path;
use std::sync::Arc;

use setkeeper_core::save::{ConflictResolution, SaveCoordinator};
use setkeeper_core::store::JsonFileStore;
use setkeeper_core::timing::SystemClock;
use setkeeper_core::validation::ValidationCache;
use setkeeper_core::{EngineConfig, SavePriority, Workout};
use tokio::sync::mpsc;

use crate::commands::common::{read_draft, write_draft};
use crate::error::CliError;

pub async fn run_save(
    draft_path: &Path,
    store_dir: &Path,
    overwrite: bool,
    config: EngineConfig,
) -> Result<(), CliError> {
    let draft = read_draft(draft_path)?;
    let saved = save_draft(draft, store_dir, overwrite, config).await?;
    write_draft(draft_path, &saved)?;

    let id = saved.id.map(|id| id.to_string()).unwrap_or_default();
    println!("{id} (revision {})", saved.metadata.revision);
    Ok(())
}

/// Save `draft` through a coordinator and wait for the final outcome.
///
/// Without `overwrite` a revision conflict is reported instead of replacing
/// the stored copy.
pub async fn save_draft(
    draft: Workout,
    store_dir: &Path,
    overwrite: bool,
    mut config: EngineConfig,
) -> Result<Workout, CliError> {
    config.save.conflict_resolution = if overwrite {
        ConflictResolution::Overwrite
    } else {
        ConflictResolution::Prompt
    };
    let max_retries = config.save.max_retries;

    let validation = Arc::new(ValidationCache::new(config.validation, Arc::new(SystemClock))?);
    let store = JsonFileStore::new(store_dir);
    let coordinator = SaveCoordinator::spawn(store, config.save)?.with_gate(validation);

    let (results, mut outcomes) = mpsc::unbounded_channel();
    let subscription = coordinator.subscribe_results(move |result| {
        let _ = results.send(result.clone());
    });
    coordinator.queue_save(draft, SavePriority::High)?;

    let outcome: Result<Workout, CliError> = loop {
        let Some(result) = outcomes.recv().await else {
            break Err(setkeeper_core::Error::CoordinatorClosed.into());
        };
        if let Some(saved) = result.saved {
            break Ok(saved);
        }
        if result.conflict {
            if overwrite {
                continue;
            }
            break Err(CliError::Conflict);
        }
        let reason = result.error.unwrap_or_default();
        if result.attempt > max_retries {
            break Err(CliError::SaveFailed {
                attempts: result.attempt,
                reason,
            });
        }
        tracing::warn!(attempt = result.attempt, %reason, "Save attempt failed");
    };

    subscription.unsubscribe();
    outcome
}
