//! Save coordinator: debounced, serialized, retrying saves for one draft.
//!
//! The coordinator is a tokio task that owns the queue, both timers and the
//! single in-flight save. [`SaveCoordinator`] is the cloneable handle the
//! editor talks to; status and history are published from the task only.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use super::config::{ConflictResolution, SaveConfig};
use super::history::SaveHistory;
use super::queue::{Pushed, QueuedSave, SaveQueue, Waiter};
use crate::changes::{merge_onto_remote, VOLATILE_FIELDS};
use crate::models::{SavePriority, SaveRequest, SaveResult, SaveState, SaveStatus, Workout};
use crate::observe::{Listeners, Observable, Subscription};
use crate::store::{SaveAttempt, StoreError, StoreResult, WorkoutStore};
use crate::timing::{linear_backoff, ScheduledTask};
use crate::{Error, Result};

/// Decides whether a draft may be handed to the coordinator.
pub trait SaveGate: Send + Sync {
    /// `Err` carries the reasons the draft is not saveable.
    fn check(&self, draft: &Workout) -> std::result::Result<(), Vec<String>>;
}

/// User decision for a pending conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Overwrite,
    Merge,
    Discard,
}

enum Command {
    Queue {
        draft: Workout,
        priority: SavePriority,
    },
    Force {
        draft: Option<Workout>,
        reply: Waiter,
    },
    Clear,
    ResolveConflict {
        choice: ConflictChoice,
        reply: oneshot::Sender<Result<Option<Workout>>>,
    },
    SetBaseline(Workout),
}

struct Shared {
    status: Observable<SaveStatus>,
    results: Listeners<SaveResult>,
    history: Mutex<SaveHistory>,
}

/// Handle to a running save coordinator.
#[derive(Clone)]
pub struct SaveCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    gate: Option<Arc<dyn SaveGate>>,
    enabled_when_valid: bool,
}

impl SaveCoordinator {
    /// Validate `config` and start the coordinator task on the current runtime.
    pub fn spawn<S: WorkoutStore>(store: S, config: SaveConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            status: Observable::new(SaveStatus::default()),
            results: Listeners::new(),
            history: Mutex::new(SaveHistory::new(config.history_limit)),
        });
        let (commands, receiver) = mpsc::unbounded_channel();
        let enabled_when_valid = config.enabled_when_valid;

        let worker = Worker {
            store: Arc::new(store),
            config,
            shared: Arc::clone(&shared),
            queue: SaveQueue::default(),
            debounce: ScheduledTask::new(),
            retry: ScheduledTask::new(),
            ready: false,
            in_flight: None,
            epoch: 0,
            conflict: None,
            baseline: None,
        };
        tokio::spawn(worker.run(receiver));

        Ok(Self {
            commands,
            shared,
            gate: None,
            enabled_when_valid,
        })
    }

    /// Gate saves on `gate` when `enabled_when_valid` is configured.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn SaveGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Enqueue `draft`, replacing any pending save for the same workout.
    ///
    /// `High` priority skips the debounce window.
    pub fn queue_save(&self, draft: Workout, priority: SavePriority) -> Result<()> {
        self.check_gate(&draft)?;
        self.send(Command::Queue { draft, priority })
    }

    /// Save now, bypassing the debounce window. With `None`, the next pending
    /// request is promoted (or the in-flight save is awaited).
    pub async fn force_save(&self, draft: Option<Workout>) -> Result<SaveResult> {
        if let Some(draft) = &draft {
            self.check_gate(draft)?;
        }
        let (reply, receiver) = oneshot::channel();
        self.send(Command::Force { draft, reply })?;
        receiver.await.map_err(|_| Error::Cancelled)?
    }

    /// Drop pending work and reset status to idle. An in-flight save finishes.
    pub fn clear_queue(&self) -> Result<()> {
        self.send(Command::Clear)
    }

    /// Resolve a pending conflict. `Discard` returns the remote copy, if known.
    pub async fn resolve_conflict(&self, choice: ConflictChoice) -> Result<Option<Workout>> {
        let (reply, receiver) = oneshot::channel();
        self.send(Command::ResolveConflict { choice, reply })?;
        receiver.await.map_err(|_| Error::CoordinatorClosed)?
    }

    /// Record the last persisted copy, used as the merge base for conflicts.
    pub fn set_baseline(&self, workout: Workout) -> Result<()> {
        self.send(Command::SetBaseline(workout))
    }

    pub fn status(&self) -> SaveStatus {
        self.shared.status.get()
    }

    /// Receive the current status now and after every transition.
    pub fn subscribe(&self, listener: impl Fn(&SaveStatus) + Send + Sync + 'static) -> Subscription {
        self.shared.status.subscribe(listener)
    }

    /// Receive every completed save attempt.
    pub fn subscribe_results(
        &self,
        listener: impl Fn(&SaveResult) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.results.subscribe(listener)
    }

    /// Recent save attempts, oldest first.
    pub fn history(&self) -> Vec<SaveResult> {
        self.shared.history.lock().to_vec()
    }

    fn check_gate(&self, draft: &Workout) -> Result<()> {
        if !self.enabled_when_valid {
            return Ok(());
        }
        let Some(gate) = &self.gate else {
            return Ok(());
        };
        gate.check(draft).map_err(|reasons| {
            tracing::debug!(reasons = reasons.len(), "Save blocked by validation");
            Error::BlockedByValidation(reasons)
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::CoordinatorClosed)
    }
}

struct InFlight {
    request: SaveRequest,
    waiters: Vec<Waiter>,
    epoch: u64,
    started: Instant,
    handle: JoinHandle<StoreResult<Workout>>,
}

struct PendingConflict {
    request: SaveRequest,
    waiters: Vec<Waiter>,
    remote: Option<Workout>,
}

struct Worker<S> {
    store: Arc<S>,
    config: SaveConfig,
    shared: Arc<Shared>,
    queue: SaveQueue,
    debounce: ScheduledTask,
    retry: ScheduledTask,
    /// A timer fired or a flush happened; pending work may start
    ready: bool,
    in_flight: Option<InFlight>,
    /// Bumped by `clear_queue` so results of older work stop driving status
    epoch: u64,
    conflict: Option<PendingConflict>,
    baseline: Option<Workout>,
}

impl<S: WorkoutStore> Worker<S> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            self.dispatch();

            let debounce_at = self.debounce.deadline();
            let retry_at = self.retry.deadline();
            let has_in_flight = self.in_flight.is_some();
            let in_flight = self.in_flight.as_mut().map(|in_flight| &mut in_flight.handle);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = tokio::time::sleep_until(debounce_at.unwrap_or_else(Instant::now)), if debounce_at.is_some() => {
                    self.debounce.cancel();
                    self.ready = true;
                }
                () = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry.cancel();
                    self.ready = true;
                }
                joined = async move {
                    match in_flight {
                        Some(handle) => handle.await,
                        None => std::future::pending().await,
                    }
                }, if has_in_flight => self.complete(joined),
            }
        }

        // Every handle is gone; let the outstanding save finish so it is recorded.
        if let Some(in_flight) = self.in_flight.as_mut() {
            let joined = (&mut in_flight.handle).await;
            self.complete(joined);
        }
        tracing::debug!("Save coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Queue { draft, priority } => self.enqueue(draft, priority, None),
            Command::Force { draft, reply } => self.force(draft, reply),
            Command::Clear => self.clear(),
            Command::ResolveConflict { choice, reply } => {
                let _ = reply.send(self.resolve_conflict(choice));
            }
            Command::SetBaseline(workout) => self.baseline = Some(workout),
        }
    }

    fn enqueue(&mut self, draft: Workout, priority: SavePriority, waiter: Option<Waiter>) {
        let request = SaveRequest::new(draft, priority);
        let request_id = request.id;
        let pushed = self.queue.push(request, waiter);

        if priority == SavePriority::High {
            self.debounce.cancel();
            self.ready = true;
        } else {
            self.debounce.schedule(Instant::now(), self.config.debounce());
        }

        tracing::debug!(
            request = %request_id,
            ?priority,
            replaced = pushed == Pushed::Replaced,
            queue_length = self.queue.len(),
            "Queued save"
        );
        let queue_length = self.queue.len();
        self.shared.status.update(|status| {
            status.has_unsaved_changes = true;
            status.queue_length = queue_length;
        });
    }

    fn force(&mut self, draft: Option<Workout>, reply: Waiter) {
        self.debounce.cancel();
        self.retry.cancel();

        if let Some(draft) = draft {
            self.enqueue(draft, SavePriority::High, Some(reply));
            return;
        }

        if let Some(next) = self.queue.peek_next_mut() {
            next.request.priority = SavePriority::High;
            next.waiters.push(reply);
            self.ready = true;
        } else if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.waiters.push(reply);
        } else {
            let _ = reply.send(Err(Error::NothingToSave));
        }
    }

    fn clear(&mut self) {
        let dropped = self.queue.clear();
        self.debounce.cancel();
        self.retry.cancel();
        self.ready = false;
        self.conflict = None;
        self.epoch += 1;

        tracing::debug!(dropped = dropped.len(), "Cleared save queue");
        drop(dropped);
        self.shared.status.update(|status| {
            status.state = SaveState::Idle;
            status.has_unsaved_changes = false;
            status.queue_length = 0;
            status.last_error = None;
            status.retry_count = 0;
        });
    }

    fn dispatch(&mut self) {
        if self.in_flight.is_some() || self.conflict.is_some() || !self.ready || self.retry.is_armed() {
            return;
        }
        let Some(next_priority) = self.queue.peek_next_mut().map(|next| next.request.priority) else {
            self.ready = false;
            return;
        };
        if self.debounce.is_armed() && next_priority != SavePriority::High {
            return;
        }
        if let Some(entry) = self.queue.pop_next() {
            self.execute(entry);
        }
    }

    fn execute(&mut self, entry: QueuedSave) {
        let QueuedSave {
            request, waiters, ..
        } = entry;
        let attempt = SaveAttempt {
            draft: request.draft.clone(),
            overwrite: request.overwrite,
        };
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move { store.save(attempt).await });

        tracing::debug!(
            request = %request.id,
            attempt = request.retry_count + 1,
            overwrite = request.overwrite,
            "Executing save"
        );
        let queue_length = self.queue.len();
        let retry_count = request.retry_count;
        self.shared.status.update(|status| {
            status.state = SaveState::Saving;
            status.queue_length = queue_length;
            status.retry_count = retry_count;
        });

        self.in_flight = Some(InFlight {
            request,
            waiters,
            epoch: self.epoch,
            started: Instant::now(),
            handle,
        });
    }

    fn complete(&mut self, joined: std::result::Result<StoreResult<Workout>, JoinError>) {
        let Some(InFlight {
            request,
            waiters,
            epoch,
            started,
            ..
        }) = self.in_flight.take()
        else {
            return;
        };
        let elapsed = started.elapsed();
        let stale = epoch != self.epoch;
        let outcome = joined.unwrap_or_else(|error| {
            let message = if error.is_panic() {
                "Save failed unexpectedly"
            } else {
                "Save task was cancelled"
            };
            tracing::error!(request = %request.id, %error, "Save task did not complete");
            Err(StoreError::transient(message))
        });

        match outcome {
            Ok(saved) => self.on_success(request, waiters, saved, elapsed, stale),
            Err(StoreError::Conflict { remote, .. }) => {
                let result = SaveResult::failed(
                    &request,
                    "The workout was changed elsewhere since it was loaded",
                    true,
                    elapsed,
                );
                self.record(&result, waiters.into_iter());
                if stale {
                    return;
                }
                self.on_conflict(request, remote.map(|remote| *remote));
            }
            Err(StoreError::Transient(message)) => {
                let result = SaveResult::failed(&request, message, false, elapsed);
                self.record(&result, waiters.into_iter());
                if stale {
                    return;
                }
                self.on_failure(request, &result);
            }
        }
    }

    fn on_success(
        &mut self,
        request: SaveRequest,
        waiters: Vec<Waiter>,
        saved: Workout,
        elapsed: std::time::Duration,
        stale: bool,
    ) {
        let result = SaveResult::succeeded(&request, saved.clone(), elapsed);
        self.queue.rebase(request.key, &saved);
        self.baseline = Some(saved);
        self.record(&result, waiters.into_iter());

        tracing::info!(
            request = %request.id,
            workout = ?result.workout_id,
            attempt = result.attempt,
            elapsed_ms = elapsed.as_millis(),
            "Saved workout"
        );
        let queue_length = self.queue.len();
        self.shared.status.update(|status| {
            status.last_saved_at = Some(result.timestamp);
            if stale {
                return;
            }
            status.state = SaveState::Saved;
            status.last_error = None;
            status.has_unsaved_changes = queue_length > 0;
            status.queue_length = queue_length;
            status.retry_count = 0;
        });
    }

    fn on_failure(&mut self, request: SaveRequest, result: &SaveResult) {
        let error = result.error.clone();
        let queue_length = self.queue.len();

        if request.retry_count >= self.config.max_retries {
            tracing::error!(
                request = %request.id,
                attempts = result.attempt,
                error = error.as_deref().unwrap_or_default(),
                "Save failed; retries exhausted"
            );
            self.shared.status.update(|status| {
                status.state = SaveState::Error;
                status.last_error = error;
                status.has_unsaved_changes = true;
                status.queue_length = queue_length;
                status.retry_count = request.retry_count;
            });
            return;
        }

        let retry_count = request.retry_count + 1;
        let delay = linear_backoff(self.config.retry_delay(), retry_count);
        let retry = SaveRequest {
            retry_count,
            ..request
        };
        if self.queue.push_front(retry, Vec::new()) {
            self.retry.schedule(Instant::now(), delay);
        } else {
            self.ready = true;
        }

        tracing::warn!(
            attempt = result.attempt,
            retry_in_ms = delay.as_millis(),
            error = error.as_deref().unwrap_or_default(),
            "Save failed; retrying"
        );
        let queue_length = self.queue.len();
        self.shared.status.update(|status| {
            status.state = SaveState::Error;
            status.last_error = error;
            status.has_unsaved_changes = true;
            status.queue_length = queue_length;
            status.retry_count = retry_count;
        });
    }

    fn on_conflict(&mut self, request: SaveRequest, remote: Option<Workout>) {
        tracing::warn!(
            request = %request.id,
            workout = ?request.key,
            strategy = ?self.config.conflict_resolution,
            "Save rejected: remote revision changed"
        );
        self.conflict = Some(PendingConflict {
            request,
            waiters: Vec::new(),
            remote,
        });
        self.shared.status.update(|status| {
            status.state = SaveState::Conflict;
            status.last_error = Some("The workout was changed elsewhere".to_string());
            status.has_unsaved_changes = true;
        });

        let automatic = match self.config.conflict_resolution {
            ConflictResolution::Overwrite => Some(ConflictChoice::Overwrite),
            ConflictResolution::Merge => Some(ConflictChoice::Merge),
            ConflictResolution::Prompt => None,
        };
        if let Some(choice) = automatic {
            if choice == ConflictChoice::Overwrite {
                tracing::warn!("Overwriting remote changes per conflict_resolution = overwrite");
            }
            if let Err(error) = self.resolve_conflict(choice) {
                tracing::error!(%error, "Automatic conflict resolution failed");
            }
        }
    }

    fn resolve_conflict(&mut self, choice: ConflictChoice) -> Result<Option<Workout>> {
        let PendingConflict {
            request,
            mut waiters,
            remote,
        } = self.conflict.take().ok_or(Error::NoPendingConflict)?;

        // Edits queued while the conflict was pending are the freshest local state.
        let mut local = request;
        if let Some(newer) = self.queue.take(local.key) {
            waiters.extend(newer.waiters);
            local = newer.request;
        }

        if choice == ConflictChoice::Discard {
            drop(waiters);
            if let Some(remote) = &remote {
                self.baseline = Some(remote.clone());
            }
            tracing::info!(request = %local.id, "Discarded local changes after conflict");
            let queue_length = self.queue.len();
            self.shared.status.update(|status| {
                status.state = SaveState::Idle;
                status.last_error = None;
                status.has_unsaved_changes = queue_length > 0;
                status.queue_length = queue_length;
                status.retry_count = 0;
            });
            return Ok(remote);
        }

        let draft = match (&remote, choice) {
            (Some(remote), ConflictChoice::Merge) => {
                merge_onto_remote(&local.draft, self.baseline.as_ref(), remote, &VOLATILE_FIELDS.map(String::from))
            }
            (Some(remote), _) => {
                let mut draft = local.draft.clone();
                draft.id = draft.id.or(remote.id);
                draft.metadata.revision = remote.metadata.revision;
                draft
            }
            (None, _) => local.draft.clone(),
        };
        let resolved = SaveRequest {
            draft,
            retry_count: 0,
            priority: SavePriority::High,
            overwrite: choice == ConflictChoice::Overwrite || remote.is_none(),
            ..local
        };
        tracing::info!(request = %resolved.id, ?choice, "Re-submitting save after conflict");
        self.queue.push_front(resolved, waiters);
        self.ready = true;

        let queue_length = self.queue.len();
        self.shared.status.update(|status| {
            status.queue_length = queue_length;
        });
        Ok(None)
    }

    fn record(&self, result: &SaveResult, waiters: impl Iterator<Item = Waiter>) {
        self.shared.history.lock().push(result.clone());
        self.shared.results.emit(result);
        for waiter in waiters {
            let _ = waiter.send(Ok(result.clone()));
        }
    }
}
