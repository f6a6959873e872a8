//! Memoized field and draft validation.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use super::config::ValidationConfig;
use super::result::{DraftValidation, EnhancedValidationResult, ValidationContext};
use super::rules::{rep_bounds, whole_number, Field};
use super::suggestions::{rank, SuggestionProvider};
use crate::models::Workout;
use crate::save::SaveGate;
use crate::timing::Clock;
use crate::Result;

/// Assumed seconds per repetition when estimating working time.
const SECONDS_PER_REP: i64 = 3;
/// Assumed rest when an exercise does not specify one.
const DEFAULT_REST_SECONDS: i64 = 60;

struct CacheEntry {
    result: Arc<EnhancedValidationResult>,
    cached_at: Instant,
}

/// Lookup counters, mainly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by an entry outliving its TTL
    pub expired: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

/// Field validation with time-boxed memoization.
///
/// A hit within the TTL returns the same `Arc`, so callers can compare
/// results by pointer to skip re-rendering.
pub struct ValidationCache {
    config: ValidationConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl ValidationCache {
    pub fn new(config: ValidationConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate by field name (`title`, `duration`, `exercise_name`, ...).
    pub fn validate_field(
        &self,
        name: &str,
        value: &Value,
        context: &ValidationContext,
    ) -> Result<Arc<EnhancedValidationResult>> {
        let field = name.parse::<Field>()?;
        Ok(self.validate(field, value, context))
    }

    pub fn validate(&self, field: Field, value: &Value, context: &ValidationContext) -> Arc<EnhancedValidationResult> {
        if !self.config.enable_caching {
            return Arc::new(self.compute(field, value, context));
        }

        let key = cache_key(field, value, context);
        let now = self.clock.now();
        {
            let mut inner = self.inner.lock();
            let cached = inner.entries.get(&key).map(|entry| {
                (
                    Arc::clone(&entry.result),
                    now.saturating_duration_since(entry.cached_at) < self.config.cache_ttl(),
                )
            });
            match cached {
                Some((result, true)) => {
                    inner.stats.hits += 1;
                    return result;
                }
                Some((_, false)) => {
                    inner.stats.expired += 1;
                    inner.stats.misses += 1;
                }
                None => inner.stats.misses += 1,
            }
        }

        let result = Arc::new(self.compute(field, value, context));
        tracing::debug!(%key, valid = result.is_valid, "Validation cache miss");
        let ttl = self.config.cache_ttl();
        let mut inner = self.inner.lock();
        inner
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.cached_at) < ttl);
        inner.entries.insert(
            key,
            CacheEntry {
                result: Arc::clone(&result),
                cached_at: now,
            },
        );
        result
    }

    /// Run every field rule plus the cross-field rules.
    pub fn validate_draft(&self, draft: &Workout) -> DraftValidation {
        let context = ValidationContext::for_workout(draft);
        let mut report = DraftValidation::default();

        self.check_into(&mut report, "title".to_string(), Field::Title, &Value::from(draft.title.as_str()), &context);
        self.check_into(&mut report, "duration".to_string(), Field::Duration, &Value::from(draft.duration), &context);
        self.check_into(
            &mut report,
            "difficulty".to_string(),
            Field::Difficulty,
            &Value::from(draft.difficulty.as_str()),
            &context,
        );

        for (index, exercise) in draft.exercises.iter().enumerate() {
            let exercise_context = ValidationContext::for_exercise(draft.difficulty, exercise);
            let reps = serde_json::to_value(&exercise.reps).unwrap_or(Value::Null);
            let rest = exercise.rest_seconds.map_or(Value::Null, Value::from);
            let fields = [
                (Field::ExerciseName, "name", Value::from(exercise.name.as_str())),
                (Field::Sets, "sets", Value::from(exercise.sets)),
                (Field::Reps, "reps", reps),
                (Field::RestSeconds, "rest_seconds", rest),
            ];
            for (field, key, value) in fields {
                let path = format!("exercises[{index}].{key}");
                self.check_into(&mut report, path, field, &value, &exercise_context);
            }
        }

        cross_field_rules(draft, &mut report);
        if self.config.contextual_validation {
            report.notes = draft_notes(draft);
        }
        report.is_valid = report.errors.is_empty();

        tracing::debug!(
            valid = report.is_valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Validated draft"
        );
        report
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Drop cached results whose key starts with `prefix` (keys are `field:hash`).
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    fn check_into(
        &self,
        report: &mut DraftValidation,
        path: String,
        field: Field,
        value: &Value,
        context: &ValidationContext,
    ) {
        let result = self.validate(field, value, context);
        if let Some(error) = &result.error {
            report.errors.push(format!("{path}: {error}"));
        }
        if let Some(warning) = &result.warning {
            report.warnings.push(format!("{path}: {warning}"));
        }
        report.fields.insert(path, result);
    }

    fn compute(&self, field: Field, value: &Value, context: &ValidationContext) -> EnhancedValidationResult {
        let outcome = field.check(value);
        let suggestions = if self.config.enable_suggestions {
            SuggestionProvider::for_field(field)
                .map(|provider| rank(provider.suggest(field, value, context), self.config.max_suggestions))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let contextual_info = if self.config.contextual_validation {
            contextual_info(field, value, context)
        } else {
            None
        };

        EnhancedValidationResult {
            field,
            is_valid: outcome.is_valid,
            severity: outcome.severity(),
            error: outcome.error,
            warning: outcome.warning,
            help_text: field.help_text(),
            contextual_info,
            suggestions,
        }
    }
}

impl SaveGate for ValidationCache {
    fn check(&self, draft: &Workout) -> std::result::Result<(), Vec<String>> {
        let report = self.validate_draft(draft);
        if report.is_valid {
            Ok(())
        } else {
            Err(report.errors)
        }
    }
}

fn cache_key(field: Field, value: &Value, context: &ValidationContext) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    serde_json::to_string(context)
        .unwrap_or_default()
        .hash(&mut hasher);
    format!("{field}:{:016x}", hasher.finish())
}

fn contextual_info(field: Field, value: &Value, context: &ValidationContext) -> Option<String> {
    let difficulty = context.difficulty?;
    match field {
        Field::Duration => Some(format!(
            "{difficulty} sessions typically run up to {} minutes",
            difficulty.duration_ceiling()
        )),
        Field::Sets | Field::Reps => {
            let (sets, reps) = if field == Field::Sets {
                (whole_number(value), context.reps.as_ref().and_then(|reps| reps.upper_bound()))
            } else {
                (context.sets, rep_bounds(value).map(|(_, high)| high))
            };
            let (sets, reps) = sets.zip(reps)?;
            Some(format!(
                "{sets} x {reps} = {} reps (ceiling for {difficulty}: {})",
                sets.saturating_mul(reps),
                difficulty.volume_ceiling()
            ))
        }
        Field::Difficulty => Some(format!(
            "{difficulty}: up to {} minutes and {} reps per exercise",
            difficulty.duration_ceiling(),
            difficulty.volume_ceiling()
        )),
        Field::Title | Field::ExerciseName | Field::RestSeconds => None,
    }
}

fn cross_field_rules(draft: &Workout, report: &mut DraftValidation) {
    if draft.exercises.is_empty() {
        report.errors.push("exercises: Add at least one exercise".to_string());
    }

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for exercise in &draft.exercises {
        *seen.entry(exercise.name.trim().to_lowercase()).or_default() += 1;
    }
    for exercise in &draft.exercises {
        let key = exercise.name.trim().to_lowercase();
        if seen.remove(&key).is_some_and(|count| count > 1) && !key.is_empty() {
            report.warnings.push(format!(
                "exercises: \"{}\" appears more than once",
                exercise.name.trim()
            ));
        }
    }
}

fn draft_notes(draft: &Workout) -> Vec<String> {
    if draft.exercises.is_empty() {
        return Vec::new();
    }

    let total_sets = draft.total_sets();
    let mut notes = vec![format!(
        "{total_sets} working sets across {} exercises",
        draft.exercises.len()
    )];

    let total_reps: i64 = draft
        .exercises
        .iter()
        .filter_map(crate::models::Exercise::volume)
        .sum();
    if total_reps > 0 {
        notes.push(format!("About {total_reps} total reps"));
    }

    let work_seconds: i64 = draft
        .exercises
        .iter()
        .map(|exercise| {
            let reps = exercise.reps.upper_bound().unwrap_or(0).max(0);
            let rest = exercise.rest_seconds.unwrap_or(DEFAULT_REST_SECONDS).max(0);
            exercise.sets.max(0) * (reps * SECONDS_PER_REP + rest)
        })
        .sum();
    let estimated_minutes = (work_seconds + 59) / 60;
    if estimated_minutes > draft.duration && draft.duration > 0 {
        notes.push(format!(
            "Estimated working time of {estimated_minutes} minutes exceeds the planned {} minutes",
            draft.duration
        ));
    } else {
        notes.push(format!("Estimated working time: {estimated_minutes} minutes"));
    }
    notes
}
