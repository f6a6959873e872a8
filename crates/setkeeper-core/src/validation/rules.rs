//! Field rules.
//!
//! Every rule is an independent predicate over a JSON value returning a
//! [`RuleOutcome`]; a field's rule list is evaluated in order and stops at
//! the first error.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{parse_rep_range, Difficulty};
use crate::Error;

pub const TITLE_LENGTH: (usize, usize) = (3, 100);
pub const DURATION_RANGE: (i64, i64) = (5, 300);
pub const DURATION_WARNING_ABOVE: i64 = 180;
pub const EXERCISE_NAME_LENGTH: (usize, usize) = (2, 50);
pub const SET_RANGE: (i64, i64) = (1, 20);
pub const SET_WARNING_ABOVE: i64 = 10;
pub const REP_RANGE: (i64, i64) = (1, 100);
pub const REP_WARNING_ABOVE: i64 = 50;
pub const REST_RANGE: (i64, i64) = (0, 600);
pub const REST_WARNING_BELOW: i64 = 15;
pub const REST_WARNING_ABOVE: i64 = 300;

static EXERCISE_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9 \-'()/&.]+$").expect("Invalid exercise name regex")
});

/// Result severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RuleOutcome {
    pub const fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
            warning: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(message.into()),
            warning: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            error: None,
            warning: Some(message.into()),
        }
    }

    pub fn severity(&self) -> Severity {
        if !self.is_valid {
            Severity::Error
        } else if self.warning.is_some() {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// A validatable field of the workout editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Duration,
    Difficulty,
    ExerciseName,
    Sets,
    Reps,
    RestSeconds,
}

impl Field {
    pub const ALL: [Self; 7] = [
        Self::Title,
        Self::Duration,
        Self::Difficulty,
        Self::ExerciseName,
        Self::Sets,
        Self::Reps,
        Self::RestSeconds,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Duration => "duration",
            Self::Difficulty => "difficulty",
            Self::ExerciseName => "exercise_name",
            Self::Sets => "sets",
            Self::Reps => "reps",
            Self::RestSeconds => "rest_seconds",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Duration => "Duration",
            Self::Difficulty => "Difficulty",
            Self::ExerciseName => "Exercise name",
            Self::Sets => "Sets",
            Self::Reps => "Reps",
            Self::RestSeconds => "Rest period",
        }
    }

    pub const fn help_text(self) -> &'static str {
        match self {
            Self::Title => "A short, descriptive name such as \"Upper Body Strength\" (3-100 characters).",
            Self::Duration => "Planned session length in minutes, between 5 and 300.",
            Self::Difficulty => "Who the workout is for: beginner, intermediate or advanced.",
            Self::ExerciseName => "Letters, numbers, spaces and - ' ( ) / & . (2-50 characters).",
            Self::Sets => "Working sets for this exercise, between 1 and 20.",
            Self::Reps => "Repetitions per set (1-100) or a range such as 8-12.",
            Self::RestSeconds => "Rest between sets in seconds, up to 10 minutes.",
        }
    }

    /// Rules evaluated for this field, in order.
    pub fn rules(self) -> Vec<Rule> {
        match self {
            Self::Title => vec![
                Rule::Required,
                Rule::Length {
                    min: TITLE_LENGTH.0,
                    max: TITLE_LENGTH.1,
                },
                Rule::TitleQuality,
            ],
            Self::Duration => vec![Rule::Required, Rule::DurationRange],
            Self::Difficulty => vec![Rule::Required, Rule::DifficultyTier],
            Self::ExerciseName => vec![
                Rule::Required,
                Rule::Length {
                    min: EXERCISE_NAME_LENGTH.0,
                    max: EXERCISE_NAME_LENGTH.1,
                },
                Rule::Pattern {
                    regex: &EXERCISE_NAME_CHARS,
                    message: "Exercise name may only contain letters, numbers, spaces and - ' ( ) / & .",
                },
                Rule::ExerciseName,
            ],
            Self::Sets => vec![Rule::Required, Rule::SetCount],
            Self::Reps => vec![Rule::Required, Rule::RepCount],
            Self::RestSeconds => vec![
                Rule::Range {
                    min: REST_RANGE.0,
                    max: REST_RANGE.1,
                    unit: "seconds",
                },
                Rule::RestPeriod,
            ],
        }
    }

    /// Run every rule; the first error wins, otherwise the first warning is kept.
    pub fn check(self, value: &Value) -> RuleOutcome {
        let mut warning = None;
        for rule in self.rules() {
            let outcome = rule.check(self, value);
            if !outcome.is_valid {
                return outcome;
            }
            if warning.is_none() {
                warning = outcome.warning;
            }
        }
        RuleOutcome {
            warning,
            ..RuleOutcome::ok()
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "title" => Ok(Self::Title),
            "duration" => Ok(Self::Duration),
            "difficulty" => Ok(Self::Difficulty),
            "exercise_name" | "exerciseName" | "name" => Ok(Self::ExerciseName),
            "sets" => Ok(Self::Sets),
            "reps" => Ok(Self::Reps),
            "rest_seconds" | "restSeconds" | "rest" => Ok(Self::RestSeconds),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}

/// One validation predicate.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Not null, not blank, not an empty list
    Required,
    /// Numeric bounds, inclusive
    Range { min: i64, max: i64, unit: &'static str },
    /// Character count bounds on trimmed text, inclusive
    Length { min: usize, max: usize },
    Pattern {
        regex: &'static Regex,
        message: &'static str,
    },
    TitleQuality,
    DurationRange,
    DifficultyTier,
    ExerciseName,
    SetCount,
    RepCount,
    RestPeriod,
}

impl Rule {
    /// Evaluate against `value`. Only `Required` rejects a missing value.
    pub fn check(&self, field: Field, value: &Value) -> RuleOutcome {
        if is_blank(value) {
            return match self {
                Self::Required => RuleOutcome::error(format!("{} is required", field.label())),
                _ => RuleOutcome::ok(),
            };
        }

        match self {
            Self::Required => RuleOutcome::ok(),
            Self::Range { min, max, unit } => check_range(field, value, *min, *max, unit),
            Self::Length { min, max } => check_length(field, value, *min, *max),
            Self::Pattern { regex, message } => match value.as_str() {
                Some(text) if regex.is_match(text.trim()) => RuleOutcome::ok(),
                Some(_) => RuleOutcome::error(*message),
                None => RuleOutcome::error(format!("{} must be text", field.label())),
            },
            Self::TitleQuality => value.as_str().map_or_else(
                || RuleOutcome::error("Title must be text"),
                title_quality,
            ),
            Self::DurationRange => duration_range(value),
            Self::DifficultyTier => match value.as_str().map(str::parse::<Difficulty>) {
                Some(Ok(_)) => RuleOutcome::ok(),
                _ => RuleOutcome::error("Difficulty must be one of beginner, intermediate, advanced"),
            },
            Self::ExerciseName => value.as_str().map_or_else(
                || RuleOutcome::error("Exercise name must be text"),
                exercise_name,
            ),
            Self::SetCount => set_count(value),
            Self::RepCount => rep_count(value),
            Self::RestPeriod => rest_period(value),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Whole number from a JSON number or numeric string.
pub(crate) fn whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < 1e15)
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn check_range(field: Field, value: &Value, min: i64, max: i64, unit: &str) -> RuleOutcome {
    let Some(number) = whole_number(value) else {
        return RuleOutcome::error(format!("{} must be a whole number", field.label()));
    };
    if number < min {
        RuleOutcome::error(format!("{} must be at least {min} {unit}", field.label()))
    } else if number > max {
        RuleOutcome::error(format!("{} must be at most {max} {unit}", field.label()))
    } else {
        RuleOutcome::ok()
    }
}

fn check_length(field: Field, value: &Value, min: usize, max: usize) -> RuleOutcome {
    let Some(text) = value.as_str() else {
        return RuleOutcome::error(format!("{} must be text", field.label()));
    };
    let length = text.trim().chars().count();
    if length < min {
        RuleOutcome::error(format!("{} must be at least {min} characters", field.label()))
    } else if length > max {
        RuleOutcome::error(format!("{} must be at most {max} characters", field.label()))
    } else {
        RuleOutcome::ok()
    }
}

fn title_quality(title: &str) -> RuleOutcome {
    let title = title.trim();
    if !title.chars().any(char::is_alphabetic) {
        return RuleOutcome::error("Title must contain letters");
    }
    if title.contains("  ") {
        return RuleOutcome::warning("Remove repeated spaces from the title");
    }
    let letters: Vec<char> = title.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 3 && letters.iter().all(|c| c.is_uppercase()) {
        return RuleOutcome::warning("Avoid writing the title in all capitals");
    }
    if title.chars().next().is_some_and(char::is_lowercase) {
        return RuleOutcome::warning("Start the title with a capital letter");
    }
    if title.split_whitespace().count() == 1 && title.chars().count() < 10 {
        return RuleOutcome::warning("Add a word describing the focus, e.g. \"Leg Day\"");
    }
    RuleOutcome::ok()
}

fn duration_range(value: &Value) -> RuleOutcome {
    let Some(minutes) = whole_number(value) else {
        return RuleOutcome::error("Duration must be a whole number of minutes");
    };
    let (min, max) = DURATION_RANGE;
    if minutes < min {
        RuleOutcome::error(format!("Duration must be at least {min} minutes"))
    } else if minutes > max {
        RuleOutcome::error(format!("Duration must be at most {max} minutes"))
    } else if minutes > DURATION_WARNING_ABOVE {
        RuleOutcome::warning(format!(
            "Sessions longer than {DURATION_WARNING_ABOVE} minutes are unusually long"
        ))
    } else {
        RuleOutcome::ok()
    }
}

fn exercise_name(name: &str) -> RuleOutcome {
    let name = name.trim();
    if !name.chars().any(char::is_alphabetic) {
        return RuleOutcome::error("Exercise name must contain letters");
    }
    if name.chars().next().is_some_and(|c| !c.is_alphanumeric()) {
        return RuleOutcome::error("Exercise name must start with a letter or number");
    }
    if name.chars().all(|c| !c.is_uppercase()) {
        return RuleOutcome::warning("Capitalize exercise names, e.g. \"Back Squat\"");
    }
    RuleOutcome::ok()
}

fn set_count(value: &Value) -> RuleOutcome {
    let Some(sets) = whole_number(value) else {
        return RuleOutcome::error("Sets must be a whole number");
    };
    let (min, max) = SET_RANGE;
    if sets < min {
        RuleOutcome::error(format!("Sets must be at least {min}"))
    } else if sets > max {
        RuleOutcome::error(format!("Sets must be at most {max}"))
    } else if sets > SET_WARNING_ABOVE {
        RuleOutcome::warning(format!(
            "More than {SET_WARNING_ABOVE} sets of one exercise is a lot of volume"
        ))
    } else {
        RuleOutcome::ok()
    }
}

/// `(min, max)` repetitions described by a count or a `min-max` scheme.
pub(crate) fn rep_bounds(value: &Value) -> Option<(i64, i64)> {
    if let Some(count) = whole_number(value) {
        return Some((count, count));
    }
    value.as_str().and_then(parse_rep_range)
}

fn rep_count(value: &Value) -> RuleOutcome {
    let Some((low, high)) = rep_bounds(value) else {
        return RuleOutcome::error("Reps must be a number or a range like 8-12");
    };
    let (min, max) = REP_RANGE;
    if low < min {
        RuleOutcome::error(format!("Reps must be at least {min}"))
    } else if high > max {
        RuleOutcome::error(format!("Reps must be at most {max}"))
    } else if high > REP_WARNING_ABOVE {
        RuleOutcome::warning(format!(
            "More than {REP_WARNING_ABOVE} reps per set is endurance territory"
        ))
    } else {
        RuleOutcome::ok()
    }
}

fn rest_period(value: &Value) -> RuleOutcome {
    match whole_number(value) {
        Some(seconds) if seconds < REST_WARNING_BELOW => RuleOutcome::warning(format!(
            "Rest under {REST_WARNING_BELOW} seconds leaves little time to recover"
        )),
        Some(seconds) if seconds > REST_WARNING_ABOVE => {
            RuleOutcome::warning("Rest over 5 minutes is longer than most programs call for")
        }
        _ => RuleOutcome::ok(),
    }
}
