//! Validation result types.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::rules::{Field, Severity};
use super::suggestions::Suggestion;
use crate::models::{Difficulty, Exercise, Reps, Workout};

/// Surrounding draft state that rules and suggestions may consult.
///
/// Part of the cache key, so keep it minimal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exercise_names: Vec<String>,
    /// Sets of the exercise being validated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sets: Option<i64>,
    /// Reps of the exercise being validated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<Reps>,
}

impl ValidationContext {
    pub fn for_workout(workout: &Workout) -> Self {
        Self {
            difficulty: Some(workout.difficulty),
            exercise_names: workout
                .exercises
                .iter()
                .map(|exercise| exercise.name.trim().to_string())
                .collect(),
            sets: None,
            reps: None,
        }
    }

    /// Context for one exercise's fields: tier plus the sibling set/rep values.
    pub fn for_exercise(difficulty: Difficulty, exercise: &Exercise) -> Self {
        Self {
            difficulty: Some(difficulty),
            exercise_names: Vec::new(),
            sets: Some(exercise.sets),
            reps: Some(exercise.reps.clone()),
        }
    }
}

/// Result of validating one field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedValidationResult {
    pub field: Field,
    pub is_valid: bool,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub help_text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contextual_info: Option<String>,
    /// Ranked best first; advisory only
    pub suggestions: Vec<Suggestion>,
}

impl EnhancedValidationResult {
    /// The error or warning text, if any.
    pub fn message(&self) -> Option<&str> {
        self.error.as_deref().or(self.warning.as_deref())
    }
}

/// Aggregate result of validating a whole draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DraftValidation {
    pub is_valid: bool,
    /// Keyed by field path, e.g. `title` or `exercises[0].reps`
    pub fields: BTreeMap<String, Arc<EnhancedValidationResult>>,
    /// `path: message` for every failing field and cross-field rule
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Draft-level observations such as total working sets
    pub notes: Vec<String>,
}

impl DraftValidation {
    pub fn field(&self, path: &str) -> Option<&EnhancedValidationResult> {
        self.fields.get(path).map(AsRef::as_ref)
    }

    pub fn suggestion_count(&self) -> usize {
        self.fields.values().map(|result| result.suggestions.len()).sum()
    }

    /// Worst severity across the draft.
    pub fn severity(&self) -> Severity {
        if !self.errors.is_empty() {
            Severity::Error
        } else if !self.warnings.is_empty() {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}
