//! Save queue, result and status models

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::workout::{Workout, WorkoutId};

/// Scheduling priority of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SavePriority {
    Low,
    #[default]
    Normal,
    /// Explicit "save now"; bypasses the debounce window
    High,
}

/// A pending save for one logical workout
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub id: Uuid,
    /// Queue key; `None` while the workout has never been saved
    pub key: Option<WorkoutId>,
    pub draft: Workout,
    pub enqueued_at: Instant,
    pub retry_count: u32,
    pub priority: SavePriority,
    /// Ask the store to ignore revision mismatches
    pub overwrite: bool,
}

impl SaveRequest {
    pub fn new(draft: Workout, priority: SavePriority) -> Self {
        Self {
            id: Uuid::now_v7(),
            key: draft.id,
            draft,
            enqueued_at: Instant::now(),
            retry_count: 0,
            priority,
            overwrite: false,
        }
    }
}

/// Outcome of one save attempt. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveResult {
    pub request_id: Uuid,
    pub workout_id: Option<WorkoutId>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The store rejected the save because the remote revision moved on
    pub conflict: bool,
    /// 1-based attempt number for the request
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    /// The persisted workout as returned by the store
    #[serde(skip)]
    pub saved: Option<Workout>,
}

impl SaveResult {
    pub fn succeeded(request: &SaveRequest, saved: Workout, duration: Duration) -> Self {
        Self {
            request_id: request.id,
            workout_id: saved.id,
            success: true,
            error: None,
            conflict: false,
            attempt: request.retry_count + 1,
            timestamp: Utc::now(),
            duration,
            saved: Some(saved),
        }
    }

    pub fn failed(
        request: &SaveRequest,
        error: impl Into<String>,
        conflict: bool,
        duration: Duration,
    ) -> Self {
        Self {
            request_id: request.id,
            workout_id: request.key,
            success: false,
            error: Some(error.into()),
            conflict,
            attempt: request.retry_count + 1,
            timestamp: Utc::now(),
            duration,
            saved: None,
        }
    }
}

/// Save state machine value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
    Conflict,
}

/// Observable save status; the single source of truth for the editor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SaveStatus {
    pub state: SaveState,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub has_unsaved_changes: bool,
    pub queue_length: usize,
    /// Retry counter of the request currently being worked on
    pub retry_count: u32,
}

/// Last-known persisted form of a workout. Replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    workout: Arc<Workout>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(workout: Workout) -> Self {
        Self {
            workout: Arc::new(workout),
            taken_at: Utc::now(),
        }
    }

    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}
