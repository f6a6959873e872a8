//! Tracks the draft against its last persisted snapshot.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use super::config::ChangeDetectionConfig;
use super::confirm::{Confirmation, ConfirmationKind, ConfirmationPrompt, ConfirmationState};
use super::diff::{diff_workouts, ChangeSet};
use crate::models::{Snapshot, Workout};
use crate::observe::{Observable, Subscription};
use crate::timing::{Clock, Debouncer};
use crate::Result;

/// Published after every recomputation or confirmation transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeState {
    pub has_unsaved_changes: bool,
    pub change_set: ChangeSet,
    /// The UI should intercept navigation and run the confirmation workflow
    pub block_navigation: bool,
    /// Closing the editor should ask first
    pub confirm_close: bool,
    pub confirmation: Option<ConfirmationState>,
}

pub struct ChangeDetector {
    config: ChangeDetectionConfig,
    clock: Arc<dyn Clock>,
    snapshot: Snapshot,
    draft: Workout,
    pending: Debouncer<Workout>,
    confirmation: Confirmation,
    state: Observable<ChangeState>,
}

impl ChangeDetector {
    /// Start tracking with `initial` as both snapshot and draft.
    pub fn new(initial: Workout, config: ChangeDetectionConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let pending = Debouncer::new(config.debounce());
        Ok(Self {
            config,
            clock,
            snapshot: Snapshot::new(initial.clone()),
            draft: initial,
            pending,
            confirmation: Confirmation::default(),
            state: Observable::new(ChangeState::default()),
        })
    }

    pub const fn config(&self) -> &ChangeDetectionConfig {
        &self.config
    }

    /// Replace snapshot and draft with a freshly loaded workout.
    pub fn load(&mut self, workout: Workout) {
        self.pending.cancel();
        self.snapshot = Snapshot::new(workout.clone());
        self.draft = workout;
        self.refresh();
    }

    /// Record an edit. The change set is recomputed once the debounce window
    /// passes without further edits (see [`poll`](Self::poll)).
    pub fn update_draft(&mut self, draft: Workout) {
        self.pending.push(draft, self.clock.now());
    }

    /// Recompute if the debounce window has elapsed. Returns whether it did.
    pub fn poll(&mut self) -> bool {
        let Some(draft) = self.pending.poll(self.clock.now()) else {
            return false;
        };
        self.draft = draft;
        self.refresh();
        true
    }

    /// Apply any pending edit and recompute now.
    pub fn flush(&mut self) {
        if let Some(draft) = self.pending.flush() {
            self.draft = draft;
        }
        self.refresh();
    }

    /// When the pending edit becomes due, if any.
    pub const fn next_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    /// Latest edit, including one still inside the debounce window.
    pub fn current_draft(&self) -> &Workout {
        self.pending.pending().unwrap_or(&self.draft)
    }

    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn state(&self) -> ChangeState {
        self.state.get()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state.get().has_unsaved_changes
    }

    pub fn change_set(&self) -> ChangeSet {
        self.state.get().change_set
    }

    pub fn block_navigation(&self) -> bool {
        self.state.get().block_navigation
    }

    pub fn should_confirm_close(&self) -> bool {
        self.state.get().confirm_close
    }

    pub fn subscribe(&self, listener: impl Fn(&ChangeState) + Send + Sync + 'static) -> Subscription {
        self.state.subscribe(listener)
    }

    /// Advance the snapshot to a successfully saved copy.
    ///
    /// The draft (and any pending edit) adopts the saved id, revision and
    /// timestamps so the next save updates the same record.
    pub fn commit_snapshot(&mut self, saved: Workout) {
        adopt_identity(&mut self.draft, &saved);
        if let Some(mut pending) = self.pending.cancel() {
            adopt_identity(&mut pending, &saved);
            self.pending.push(pending, self.clock.now());
        }
        self.snapshot = Snapshot::new(saved);
        self.refresh();
    }

    /// Restore the snapshot as the draft without persisting anything.
    pub fn reset_changes(&mut self) -> Workout {
        self.pending.cancel();
        self.draft = self.snapshot.workout().clone();
        tracing::debug!("Discarded unsaved changes");
        self.refresh();
        self.draft.clone()
    }

    /// Show a confirmation dialog. Only one may be shown at a time.
    pub fn open_confirmation(&mut self, kind: ConfirmationKind) -> Result<ConfirmationPrompt> {
        let prompt = self.confirmation.open(kind)?;
        self.publish_confirmation();
        Ok(prompt)
    }

    /// Answer the shown dialog. An accepted discard resets the draft here;
    /// save and navigate answers are acted on by whoever awaits the prompt.
    pub fn resolve_confirmation(&mut self, accepted: bool) -> Result<ConfirmationKind> {
        let kind = self.confirmation.resolve(accepted)?;
        tracing::debug!(%kind, accepted, "Confirmation resolved");
        if kind == ConfirmationKind::Discard && accepted {
            self.reset_changes();
        } else {
            self.publish_confirmation();
        }
        Ok(kind)
    }

    fn refresh(&mut self) {
        let change_set = diff_workouts(
            &self.draft,
            self.snapshot.workout(),
            self.config.deep_compare,
            &self.config.exclude_fields,
        );
        let dirty = !change_set.is_empty();
        let next = ChangeState {
            has_unsaved_changes: dirty,
            block_navigation: dirty && self.config.confirm_on_navigate && !self.config.auto_save_enabled,
            confirm_close: dirty && self.config.confirm_on_close,
            change_set,
            confirmation: self.confirmation.state(),
        };
        if next != self.state.get() {
            tracing::debug!(changed = ?next.change_set.fields(), "Change set updated");
            self.state.set(next);
        }
    }

    fn publish_confirmation(&self) {
        let confirmation = self.confirmation.state();
        self.state.update(|state| state.confirmation = confirmation);
    }
}

fn adopt_identity(draft: &mut Workout, saved: &Workout) {
    draft.id = saved.id;
    draft.metadata.revision = saved.metadata.revision;
    draft.metadata.created_at = saved.metadata.created_at;
    draft.metadata.updated_at = saved.metadata.updated_at;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{Difficulty, Exercise, WorkoutId};
    use crate::store::{MemoryStore, SaveAttempt, WorkoutStore};
    use crate::timing::ManualClock;
    use pretty_assertions::assert_eq;

    fn leg_day() -> Workout {
        Workout::new("Leg Day", 30, Difficulty::Beginner).with_exercise(Exercise::new("Squat", 3, 10))
    }

    fn detector(config: ChangeDetectionConfig) -> (ChangeDetector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let detector = ChangeDetector::new(leg_day(), config, clock.clone()).unwrap();
        (detector, clock)
    }

    fn retitled(title: &str) -> Workout {
        Workout {
            title: title.to_string(),
            ..leg_day()
        }
    }

    #[test]
    fn recomputes_after_debounce_window() {
        let (mut detector, clock) = detector(ChangeDetectionConfig::default());
        detector.update_draft(retitled("Heavy Leg Day"));

        clock.advance(Duration::from_millis(400));
        assert!(!detector.poll());
        assert!(!detector.has_unsaved_changes());

        clock.advance(Duration::from_millis(100));
        assert!(detector.poll());
        assert!(detector.has_unsaved_changes());
        assert_eq!(detector.change_set().fields(), ["title".to_string()]);
    }

    #[test]
    fn equal_draft_is_clean() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig::default());
        let mut draft = leg_day();
        draft.id = Some(WorkoutId::new());
        draft.metadata.revision = 4;
        detector.update_draft(draft);
        detector.flush();

        assert!(!detector.has_unsaved_changes());
        assert!(detector.change_set().is_empty());
    }

    #[test]
    fn navigation_block_then_discard() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig::default());
        detector.update_draft(retitled("Arm Day"));
        detector.flush();
        assert!(detector.block_navigation());
        assert!(detector.should_confirm_close());

        let _prompt = detector.open_confirmation(ConfirmationKind::Discard).unwrap();
        detector.resolve_confirmation(true).unwrap();

        assert!(!detector.block_navigation());
        assert!(detector.change_set().is_empty());
        assert_eq!(detector.current_draft().title, "Leg Day");
    }

    #[test]
    fn declined_discard_keeps_changes() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig::default());
        detector.update_draft(retitled("Arm Day"));
        detector.flush();

        let _prompt = detector.open_confirmation(ConfirmationKind::Discard).unwrap();
        detector.resolve_confirmation(false).unwrap();

        assert!(detector.block_navigation());
        assert_eq!(detector.state().confirmation.and_then(|state| state.accepted), Some(false));
    }

    #[test]
    fn auto_save_never_blocks_navigation() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig {
            auto_save_enabled: true,
            ..ChangeDetectionConfig::default()
        });
        detector.update_draft(retitled("Arm Day"));
        detector.flush();

        assert!(detector.has_unsaved_changes());
        assert!(!detector.block_navigation());
    }

    #[test]
    fn commit_snapshot_clears_dirtiness_and_adopts_identity() {
        let (mut detector, clock) = detector(ChangeDetectionConfig::default());
        detector.update_draft(retitled("Arm Day"));
        detector.flush();

        let mut saved = retitled("Arm Day");
        saved.id = Some(WorkoutId::new());
        saved.metadata.revision = 1;
        detector.update_draft(Workout {
            duration: 45,
            ..retitled("Arm Day")
        });
        detector.commit_snapshot(saved.clone());
        assert!(!detector.has_unsaved_changes());
        assert_eq!(detector.snapshot().workout(), &saved);

        clock.advance(Duration::from_millis(500));
        assert!(detector.poll());
        assert_eq!(detector.change_set().fields(), ["duration".to_string()]);
        assert_eq!(detector.current_draft().id, saved.id);
    }

    #[test]
    fn shallow_mode_reports_metadata_changes() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig {
            deep_compare: false,
            exclude_fields: vec!["id".to_string()],
            ..ChangeDetectionConfig::default()
        });
        let mut draft = leg_day();
        draft.metadata.owner = Some("coach".to_string());
        detector.update_draft(draft);
        detector.flush();

        assert_eq!(detector.change_set().fields(), ["metadata".to_string()]);
    }

    #[tokio::test]
    async fn shallow_mode_is_clean_after_store_round_trip() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig {
            deep_compare: false,
            ..ChangeDetectionConfig::default()
        });
        detector.update_draft(retitled("Arm Day"));
        detector.flush();
        assert!(detector.has_unsaved_changes());

        let store = MemoryStore::new();
        let saved = store
            .save(SaveAttempt {
                draft: detector.current_draft().clone(),
                overwrite: false,
            })
            .await
            .unwrap();
        assert!(saved.metadata.updated_at.is_some());

        detector.commit_snapshot(saved);
        assert!(!detector.has_unsaved_changes());
        assert!(detector.change_set().is_empty());

        detector.flush();
        assert!(!detector.has_unsaved_changes());
    }

    #[test]
    fn subscribers_see_transitions() {
        let (mut detector, _clock) = detector(ChangeDetectionConfig::default());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = detector.subscribe(move |state| sink.lock().push(state.has_unsaved_changes));

        detector.update_draft(retitled("Arm Day"));
        detector.flush();
        detector.reset_changes();

        assert_eq!(*seen.lock(), vec![false, true, false]);
    }
}
