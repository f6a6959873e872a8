//! Editing session: one draft wired through change detection, validation,
//! saving and notifications.
//!
//! Edits flow into the change detector and the validation cache; when
//! auto-save is on they are queued on the save coordinator. Save results
//! advance the detector's snapshot and surface as notifications.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::changes::{ChangeDetector, ChangeState, ConfirmationKind};
use crate::config::EngineConfig;
use crate::models::{SavePriority, SaveResult, SaveStatus, Snapshot, Workout, WorkoutId};
use crate::notify::{NewNotification, NotificationAction, NotificationHub, NotificationPriority};
use crate::observe::Subscription;
use crate::save::{ConflictChoice, ConflictResolution, SaveCoordinator};
use crate::store::WorkoutStore;
use crate::timing::Clock;
use crate::validation::{DraftValidation, ValidationCache};
use crate::{Error, Result};

pub struct EditingSession {
    detector: Arc<Mutex<ChangeDetector>>,
    coordinator: SaveCoordinator,
    validation: Arc<ValidationCache>,
    notifications: Arc<NotificationHub>,
    subscriptions: Vec<Subscription>,
}

impl EditingSession {
    /// Build every component from `config` and start the save coordinator
    /// on the current tokio runtime.
    pub fn start<S: WorkoutStore>(
        initial: Workout,
        store: S,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let EngineConfig {
            save,
            changes,
            validation,
            notifications,
        } = config;
        let max_retries = save.max_retries;
        let conflict_resolution = save.conflict_resolution;

        let validation = Arc::new(ValidationCache::new(validation, Arc::clone(&clock))?);
        let notifications = Arc::new(NotificationHub::new(notifications, Arc::clone(&clock))?);
        let detector = Arc::new(Mutex::new(ChangeDetector::new(initial.clone(), changes, clock)?));
        let coordinator = SaveCoordinator::spawn(store, save)?.with_gate(validation.clone());
        if initial.is_persisted() {
            coordinator.set_baseline(initial)?;
        }

        let feedback = SaveFeedback {
            detector: Arc::clone(&detector),
            notifications: Arc::clone(&notifications),
            coordinator: coordinator.clone(),
            max_retries,
            conflict_resolution,
            resolving: Mutex::new(HashSet::new()),
        };
        let subscription = coordinator.subscribe_results(move |result| feedback.handle(result));

        Ok(Self {
            detector,
            coordinator,
            validation,
            notifications,
            subscriptions: vec![subscription],
        })
    }

    /// Replace the edited workout with a freshly loaded copy.
    pub fn load(&self, workout: Workout) -> Result<()> {
        self.coordinator.clear_queue()?;
        if workout.is_persisted() {
            self.coordinator.set_baseline(workout.clone())?;
        }
        self.detector.lock().load(workout);
        Ok(())
    }

    /// Record an edit and return its validation report.
    ///
    /// With auto-save enabled the draft is also queued; a draft rejected by
    /// the validation gate is simply not queued.
    pub fn edit(&self, draft: Workout) -> Result<DraftValidation> {
        let report = self.validation.validate_draft(&draft);
        let auto_save = {
            let mut detector = self.detector.lock();
            detector.update_draft(draft.clone());
            detector.config().auto_save_enabled
        };
        if auto_save {
            match self.coordinator.queue_save(draft, SavePriority::Normal) {
                Ok(()) | Err(Error::BlockedByValidation(_)) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(report)
    }

    /// Save the current draft immediately.
    pub async fn save_now(&self) -> Result<SaveResult> {
        let draft = {
            let mut detector = self.detector.lock();
            detector.flush();
            detector.current_draft().clone()
        };
        self.coordinator.force_save(Some(draft)).await
    }

    /// Ask before saving. Resolves to `true` once the draft was saved.
    pub async fn confirm_save(&self) -> Result<bool> {
        let prompt = self.detector.lock().open_confirmation(ConfirmationKind::Save)?;
        if !prompt.answer().await {
            return Ok(false);
        }
        let result = self.save_now().await?;
        Ok(result.success)
    }

    /// Ask before throwing away unsaved changes. Resolves to `true` once the
    /// snapshot has been restored.
    pub async fn confirm_discard(&self) -> Result<bool> {
        let prompt = self.detector.lock().open_confirmation(ConfirmationKind::Discard)?;
        if !prompt.answer().await {
            return Ok(false);
        }
        self.coordinator.clear_queue()?;
        Ok(true)
    }

    /// Ask before leaving the editor. Resolves to `true` when navigation may
    /// proceed; accepted navigation discards unsaved changes.
    pub async fn confirm_navigate(&self) -> Result<bool> {
        let prompt = {
            let mut detector = self.detector.lock();
            if !detector.block_navigation() {
                return Ok(true);
            }
            detector.open_confirmation(ConfirmationKind::Navigate)?
        };
        if !prompt.answer().await {
            return Ok(false);
        }
        self.coordinator.clear_queue()?;
        self.detector.lock().reset_changes();
        Ok(true)
    }

    /// Answer the confirmation currently shown.
    pub fn resolve_confirmation(&self, accepted: bool) -> Result<ConfirmationKind> {
        self.detector.lock().resolve_confirmation(accepted)
    }

    /// Settle a conflict left pending in `prompt` mode.
    ///
    /// Discarding reloads the remote copy into the editor.
    pub async fn resolve_conflict(&self, choice: ConflictChoice) -> Result<Option<Workout>> {
        let remote = self.coordinator.resolve_conflict(choice).await?;
        if let Some(remote) = &remote {
            self.detector.lock().load(remote.clone());
        }
        Ok(remote)
    }

    /// Run due timers: the change-detection debounce and notification expiry.
    pub fn tick(&self) {
        self.detector.lock().poll();
        self.notifications.expire();
    }

    /// Next instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let detector = self.detector.lock().next_deadline();
        let expiry = self.notifications.next_expiry();
        detector.into_iter().chain(expiry).min()
    }

    pub fn current_draft(&self) -> Workout {
        self.detector.lock().current_draft().clone()
    }

    /// Last successfully saved copy.
    pub fn snapshot(&self) -> Snapshot {
        self.detector.lock().snapshot().clone()
    }

    pub fn change_state(&self) -> ChangeState {
        self.detector.lock().state()
    }

    pub fn should_confirm_close(&self) -> bool {
        self.detector.lock().should_confirm_close()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.coordinator.status()
    }

    pub fn subscribe_changes(&self, listener: impl Fn(&ChangeState) + Send + Sync + 'static) -> Subscription {
        self.detector.lock().subscribe(listener)
    }

    pub const fn coordinator(&self) -> &SaveCoordinator {
        &self.coordinator
    }

    pub fn validation(&self) -> &ValidationCache {
        &self.validation
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }
}

impl Drop for EditingSession {
    fn drop(&mut self) {
        // Result listeners hold coordinator handles; release them so the task can stop.
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

/// Turns coordinator results into snapshot commits and notifications.
struct SaveFeedback {
    detector: Arc<Mutex<ChangeDetector>>,
    notifications: Arc<NotificationHub>,
    coordinator: SaveCoordinator,
    max_retries: u32,
    conflict_resolution: ConflictResolution,
    /// Workouts whose conflict is being resolved automatically
    resolving: Mutex<HashSet<WorkoutId>>,
}

impl SaveFeedback {
    fn handle(&self, result: &SaveResult) {
        if let Some(saved) = &result.saved {
            self.detector.lock().commit_snapshot(saved.clone());
            if self.settle_conflict(result) {
                let message = match self.conflict_resolution {
                    ConflictResolution::Merge => "The workout was changed elsewhere; your edits were merged into it",
                    ConflictResolution::Overwrite | ConflictResolution::Prompt => {
                        "The workout was changed elsewhere; your version replaced it"
                    }
                };
                self.warn_conflict(message);
            }
            self.notifications
                .push(NewNotification::success("Saved", format!("{} saved", saved.title)));
            return;
        }

        if result.conflict {
            match self.conflict_resolution {
                ConflictResolution::Prompt => {
                    self.warn_conflict("The workout was changed elsewhere; choose to overwrite, merge or discard");
                }
                ConflictResolution::Overwrite | ConflictResolution::Merge => {
                    if let Some(id) = result.workout_id {
                        self.resolving.lock().insert(id);
                    }
                }
            }
            return;
        }

        if result.attempt <= self.max_retries {
            return;
        }
        self.settle_conflict(result);
        let retry = NotificationAction::new("Retry", {
            let detector = Arc::clone(&self.detector);
            let coordinator = self.coordinator.clone();
            move || {
                let draft = detector.lock().current_draft().clone();
                coordinator
                    .queue_save(draft, SavePriority::High)
                    .map_err(|error| error.to_string())
            }
        });
        let error = result.error.clone().unwrap_or_default();
        self.notifications
            .push(NewNotification::error("Save failed", error).with_action(retry));
    }

    /// Whether `result` ends an automatic conflict resolution.
    fn settle_conflict(&self, result: &SaveResult) -> bool {
        result
            .workout_id
            .is_some_and(|id| self.resolving.lock().remove(&id))
    }

    fn warn_conflict(&self, message: &str) {
        self.notifications.push(
            NewNotification::warning("Save conflict", message).with_priority(NotificationPriority::High),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::changes::ChangeDetectionConfig;
    use crate::models::{Difficulty, Exercise, SaveState};
    use crate::notify::NotificationKind;
    use crate::save::SaveConfig;
    use crate::store::{save_fn, MemoryStore, SaveAttempt, StoreError};
    use crate::timing::SystemClock;
    use pretty_assertions::assert_eq;

    fn leg_day() -> Workout {
        Workout::new("Leg Day", 30, Difficulty::Beginner).with_exercise(Exercise::new("Squat", 3, 10))
    }

    fn session(store: &MemoryStore, config: EngineConfig) -> EditingSession {
        EditingSession::start(leg_day(), store.clone(), config, Arc::new(SystemClock)).unwrap()
    }

    fn auto_save() -> EngineConfig {
        EngineConfig {
            changes: ChangeDetectionConfig {
                auto_save_enabled: true,
                ..ChangeDetectionConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn retitled(session: &EditingSession, title: &str) -> Workout {
        Workout {
            title: title.to_string(),
            ..session.current_draft()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn auto_save_commits_snapshot_and_notifies() {
        let store = MemoryStore::new();
        let session = session(&store, auto_save());

        session.edit(retitled(&session, "Leg Day Heavy")).unwrap();
        sleep_ms(600).await;
        session.tick();
        assert!(session.change_state().has_unsaved_changes);
        assert!(!session.change_state().block_navigation);

        sleep_ms(2000).await;
        assert_eq!(session.save_status().state, SaveState::Saved);
        assert!(!session.change_state().has_unsaved_changes);
        assert!(session.current_draft().is_persisted());
        assert_eq!(store.len(), 1);

        let visible = session.notifications().visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].kind, NotificationKind::Success);
        assert_eq!(visible[0].message, "Leg Day Heavy saved");
    }

    #[tokio::test(start_paused = true)]
    async fn manual_mode_does_not_queue_edits() {
        let store = MemoryStore::new();
        let session = session(&store, EngineConfig::default());

        session.edit(retitled(&session, "Push Day")).unwrap();
        sleep_ms(5000).await;
        session.tick();
        assert_eq!(store.attempts(), 0);
        assert!(session.change_state().block_navigation);

        let result = session.save_now().await.unwrap();
        assert!(result.success);
        assert!(!session.change_state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_reports_validation() {
        let store = MemoryStore::new();
        let session = session(&store, EngineConfig::default());

        let report = session
            .edit(Workout {
                duration: -5,
                ..leg_day()
            })
            .unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|error| error.starts_with("duration:")));
    }

    #[tokio::test(start_paused = true)]
    async fn gated_auto_save_skips_invalid_drafts() {
        let store = MemoryStore::new();
        let mut config = auto_save();
        config.save.enabled_when_valid = true;
        let session = session(&store, config);

        let report = session
            .edit(Workout {
                duration: -5,
                ..leg_day()
            })
            .unwrap();
        assert!(!report.is_valid);
        sleep_ms(5000).await;
        assert_eq!(store.attempts(), 0);
        assert_eq!(session.save_status().state, SaveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_block_cleared_by_discard() {
        let store = MemoryStore::new();
        let session = Arc::new(session(&store, EngineConfig::default()));

        session.edit(retitled(&session, "Arm Day")).unwrap();
        sleep_ms(600).await;
        session.tick();
        let state = session.change_state();
        assert!(state.block_navigation);
        assert_eq!(state.change_set.fields(), ["title"]);

        let waiting = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.confirm_discard().await }
        });
        sleep_ms(1).await;
        assert_eq!(session.resolve_confirmation(true).unwrap(), ConfirmationKind::Discard);
        assert!(waiting.await.unwrap().unwrap());

        let state = session.change_state();
        assert!(!state.block_navigation);
        assert!(state.change_set.is_empty());
        assert_eq!(session.current_draft().title, "Leg Day");
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_save_persists_on_accept() {
        let store = MemoryStore::new();
        let session = Arc::new(session(&store, EngineConfig::default()));
        session.edit(retitled(&session, "Back Day")).unwrap();

        let waiting = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.confirm_save().await }
        });
        sleep_ms(1).await;
        session.resolve_confirmation(true).unwrap();
        assert!(waiting.await.unwrap().unwrap());
        assert_eq!(store.len(), 1);
        assert!(!session.change_state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_navigation_keeps_changes() {
        let store = MemoryStore::new();
        let session = Arc::new(session(&store, EngineConfig::default()));
        assert!(session.confirm_navigate().await.unwrap());

        session.edit(retitled(&session, "Core")).unwrap();
        sleep_ms(600).await;
        session.tick();

        let waiting = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.confirm_navigate().await }
        });
        sleep_ms(1).await;
        session.resolve_confirmation(false).unwrap();
        assert!(!waiting.await.unwrap().unwrap());
        assert!(session.change_state().block_navigation);
        assert_eq!(session.current_draft().title, "Core");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_offer_retry_action() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            save: SaveConfig {
                max_retries: 1,
                ..SaveConfig::default()
            },
            ..EngineConfig::default()
        };
        let session = session(&store, config);
        store.fail_next(2);

        let result = session.save_now().await.unwrap();
        assert!(!result.success);
        sleep_ms(2000).await;
        assert_eq!(session.save_status().state, SaveState::Error);
        assert_eq!(store.attempts(), 2);

        let visible = session.notifications().visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Save failed");
        assert_eq!(visible[0].message, "simulated network failure");

        session.notifications().invoke_action(visible[0].id, "Retry").unwrap();
        sleep_ms(10).await;
        assert_eq!(session.save_status().state, SaveState::Saved);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_saves_keep_snapshot_until_retry_succeeds() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            save: SaveConfig {
                max_retries: 1,
                ..SaveConfig::default()
            },
            ..EngineConfig::default()
        };
        let session = session(&store, config);
        session.edit(retitled(&session, "Leg Day Heavy")).unwrap();
        let before = session.snapshot();
        store.fail_next(2);

        assert!(!session.save_now().await.unwrap().success);
        sleep_ms(2000).await;
        assert_eq!(session.save_status().state, SaveState::Error);
        assert_eq!(session.snapshot(), before);
        assert!(session.change_state().has_unsaved_changes);
        assert!(session.should_confirm_close());

        let failed = session
            .notifications()
            .visible()
            .into_iter()
            .find(|entry| entry.title == "Save failed")
            .unwrap();
        session.notifications().invoke_action(failed.id, "Retry").unwrap();
        sleep_ms(10).await;

        let after = session.snapshot();
        assert_eq!(after.workout().title, "Leg Day Heavy");
        assert!(after.workout().is_persisted());
        assert!(after.taken_at() >= before.taken_at());
        assert!(!session.change_state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_keeps_snapshot_until_resolved() {
        let store = MemoryStore::new();
        let mut config = EngineConfig::default();
        config.save.conflict_resolution = ConflictResolution::Prompt;
        let session = session(&store, config);

        assert!(session.save_now().await.unwrap().success);
        let saved = session.snapshot();
        store.put_remote(Workout {
            title: "Leg Day (coach)".to_string(),
            ..session.current_draft()
        });

        session.edit(retitled(&session, "Leg Day (mine)")).unwrap();
        assert!(session.save_now().await.unwrap().conflict);
        sleep_ms(100).await;
        assert_eq!(session.snapshot(), saved);
        assert!(session.change_state().has_unsaved_changes);

        assert_eq!(session.resolve_conflict(ConflictChoice::Overwrite).await.unwrap(), None);
        sleep_ms(100).await;
        assert_eq!(session.save_status().state, SaveState::Saved);
        assert_eq!(session.snapshot().workout().title, "Leg Day (mine)");
        assert!(!session.change_state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_overwrite_reports_conflict_once_saved() {
        let store = MemoryStore::new();
        let session = session(&store, EngineConfig::default());

        assert!(session.save_now().await.unwrap().success);
        store.put_remote(Workout {
            title: "Leg Day (coach)".to_string(),
            ..session.current_draft()
        });
        session.edit(retitled(&session, "Leg Day (mine)")).unwrap();
        assert!(session.save_now().await.unwrap().conflict);
        sleep_ms(100).await;

        assert_eq!(session.save_status().state, SaveState::Saved);
        assert_eq!(session.snapshot().workout().title, "Leg Day (mine)");
        let conflict = session
            .notifications()
            .visible()
            .into_iter()
            .find(|entry| entry.title == "Save conflict")
            .unwrap();
        assert_eq!(
            conflict.message,
            "The workout was changed elsewhere; your version replaced it"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_overwrite_does_not_claim_replacement() {
        let store = MemoryStore::new();
        let backend = store.clone();
        let flaky = save_fn(move |attempt: SaveAttempt| {
            let backend = backend.clone();
            async move {
                if attempt.overwrite {
                    Err(StoreError::transient("remote unavailable"))
                } else {
                    backend.save(attempt).await
                }
            }
        });
        let config = EngineConfig {
            save: SaveConfig {
                max_retries: 0,
                ..SaveConfig::default()
            },
            ..EngineConfig::default()
        };
        let session = EditingSession::start(leg_day(), flaky, config, Arc::new(SystemClock)).unwrap();

        assert!(session.save_now().await.unwrap().success);
        let saved = session.snapshot();
        store.put_remote(Workout {
            title: "Leg Day (coach)".to_string(),
            ..session.current_draft()
        });
        session.edit(retitled(&session, "Leg Day (mine)")).unwrap();
        assert!(session.save_now().await.unwrap().conflict);
        sleep_ms(100).await;

        let titles: Vec<String> = session
            .notifications()
            .visible()
            .into_iter()
            .map(|entry| entry.title)
            .collect();
        assert!(titles.iter().any(|title| title == "Save failed"));
        assert!(!titles.iter().any(|title| title == "Save conflict"));
        assert_eq!(session.snapshot(), saved);
        assert!(session.change_state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_conflict_discard_reloads_remote() {
        let store = MemoryStore::new();
        let mut config = EngineConfig::default();
        config.save.conflict_resolution = ConflictResolution::Prompt;
        let session = session(&store, config);

        let saved = session.save_now().await.unwrap();
        assert!(saved.success);
        store.put_remote(Workout {
            title: "Leg Day (coach)".to_string(),
            ..session.current_draft()
        });

        session.edit(retitled(&session, "Leg Day (mine)")).unwrap();
        let conflicted = session.save_now().await.unwrap();
        assert!(conflicted.conflict);
        sleep_ms(100).await;
        assert_eq!(session.save_status().state, SaveState::Conflict);
        assert!(session
            .notifications()
            .visible()
            .iter()
            .any(|entry| entry.title == "Save conflict"));

        let remote = session.resolve_conflict(ConflictChoice::Discard).await.unwrap();
        assert_eq!(remote.map(|remote| remote.title), Some("Leg Day (coach)".to_string()));
        assert_eq!(session.current_draft().title, "Leg Day (coach)");
        assert!(!session.change_state().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn close_guard_follows_dirtiness() {
        let store = MemoryStore::new();
        let session = session(&store, EngineConfig::default());
        assert!(!session.should_confirm_close());

        session.edit(retitled(&session, "Full Body")).unwrap();
        session.tick();
        assert!(session.next_deadline().is_some());
        sleep_ms(600).await;
        session.tick();
        assert!(session.should_confirm_close());
    }
}
