//! Workout model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a persisted workout, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkoutId(Uuid);

impl WorkoutId {
    /// Create a new unique workout ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for WorkoutId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkoutId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Difficulty tier of a workout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Longest session (minutes) that is reasonable for this tier.
    pub const fn duration_ceiling(self) -> i64 {
        match self {
            Self::Beginner => 60,
            Self::Intermediate => 90,
            Self::Advanced => 120,
        }
    }

    /// Highest sets x reps for a single exercise at this tier.
    pub const fn volume_ceiling(self) -> i64 {
        match self {
            Self::Beginner => 60,
            Self::Intermediate => 100,
            Self::Advanced => 150,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Repetitions per set, either a fixed count or a `min-max` scheme such as `8-12`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reps {
    Count(i64),
    Scheme(String),
}

impl Reps {
    /// Upper bound of the repetitions, if the value is well-formed.
    pub fn upper_bound(&self) -> Option<i64> {
        match self {
            Self::Count(count) => Some(*count),
            Self::Scheme(scheme) => parse_rep_range(scheme).map(|(_, max)| max),
        }
    }
}

impl Default for Reps {
    fn default() -> Self {
        Self::Count(10)
    }
}

/// Parse a `min-max` repetition range. Returns `None` for malformed input.
pub fn parse_rep_range(value: &str) -> Option<(i64, i64)> {
    let (min, max) = value.trim().split_once('-')?;
    let min = min.trim().parse::<i64>().ok()?;
    let max = max.trim().parse::<i64>().ok()?;
    (min <= max).then_some((min, max))
}

/// One exercise entry in a workout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub sets: i64,
    #[serde(default)]
    pub reps: Reps,
    /// Rest between sets, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<i64>,
}

impl Exercise {
    #[must_use]
    pub fn new(name: impl Into<String>, sets: i64, reps: i64) -> Self {
        Self {
            name: name.into(),
            sets,
            reps: Reps::Count(reps),
            rest_seconds: None,
        }
    }

    /// Sets multiplied by the upper repetition bound.
    pub fn volume(&self) -> Option<i64> {
        self.reps
            .upper_bound()
            .map(|reps| reps.saturating_mul(self.sets))
    }
}

/// Free-form bookkeeping carried with a workout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Remote revision the draft was based on, used for conflict detection
    #[serde(default)]
    pub revision: u64,
}

/// The in-progress workout draft being edited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    /// Absent until the first successful save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WorkoutId>,
    pub title: String,
    /// Planned session length in minutes
    pub duration: i64,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub metadata: WorkoutMetadata,
}

impl Workout {
    /// Create a new unsaved workout
    #[must_use]
    pub fn new(title: impl Into<String>, duration: i64, difficulty: Difficulty) -> Self {
        Self {
            id: None,
            title: title.into(),
            duration,
            difficulty,
            exercises: Vec::new(),
            metadata: WorkoutMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_exercise(mut self, exercise: Exercise) -> Self {
        self.exercises.push(exercise);
        self
    }

    /// Total number of working sets across all exercises
    pub fn total_sets(&self) -> i64 {
        self.exercises.iter().map(|exercise| exercise.sets.max(0)).sum()
    }

    /// Whether the workout has been persisted at least once
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}
