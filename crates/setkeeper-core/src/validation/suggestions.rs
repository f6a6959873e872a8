//! Improvement suggestions.
//!
//! Providers are pure functions of `(value, context)`. They never affect
//! validity; the cache ranks and truncates what they return.

use serde::Serialize;
use serde_json::{json, Value};

use super::result::ValidationContext;
use super::rules::{rep_bounds, whole_number, Field, DURATION_RANGE};
use crate::models::Difficulty;

/// An alternative value with a confidence in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub value: Value,
    pub confidence: f64,
    pub rationale: String,
}

impl Suggestion {
    fn new(value: Value, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// Heuristic families, one per field category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionProvider {
    Title,
    Duration,
    Volume,
}

impl SuggestionProvider {
    pub const fn for_field(field: Field) -> Option<Self> {
        match field {
            Field::Title => Some(Self::Title),
            Field::Duration => Some(Self::Duration),
            Field::Sets | Field::Reps => Some(Self::Volume),
            Field::Difficulty | Field::ExerciseName | Field::RestSeconds => None,
        }
    }

    pub fn suggest(self, field: Field, value: &Value, context: &ValidationContext) -> Vec<Suggestion> {
        match self {
            Self::Title => value
                .as_str()
                .map(|title| title_suggestions(title, context))
                .unwrap_or_default(),
            Self::Duration => whole_number(value)
                .map(|minutes| duration_suggestions(minutes, context))
                .unwrap_or_default(),
            Self::Volume => volume_suggestions(field, value, context),
        }
    }
}

/// Best first, duplicates removed, at most `limit`.
pub fn rank(mut suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    suggestions.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
    let mut ranked: Vec<Suggestion> = Vec::with_capacity(limit.min(suggestions.len()));
    for suggestion in suggestions {
        if ranked.len() == limit {
            break;
        }
        if !ranked.iter().any(|kept| kept.value == suggestion.value) {
            ranked.push(suggestion);
        }
    }
    ranked
}

fn title_suggestions(title: &str, context: &ValidationContext) -> Vec<Suggestion> {
    let trimmed = title.trim();
    let words = trimmed.split_whitespace().count();
    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    let shouting = letters.len() > 3 && letters.iter().all(|c| c.is_uppercase());
    let needs_help = (trimmed.chars().count() < 10 && words < 2)
        || trimmed.chars().next().is_some_and(char::is_lowercase)
        || trimmed.contains("  ")
        || shouting;
    if !needs_help {
        return Vec::new();
    }

    let mut suggestions = Vec::new();
    let tidied = title_case(trimmed);
    if tidied != trimmed && tidied.chars().count() >= 3 {
        suggestions.push(Suggestion::new(
            json!(tidied),
            0.8,
            "Capitalize each word and drop extra spaces",
        ));
    }

    let (generated, confidence) = generate_title(context);
    suggestions.push(Suggestion::new(
        json!(generated),
        confidence,
        "Generated from the workout's difficulty and exercises",
    ));
    suggestions
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn generate_title(context: &ValidationContext) -> (String, f64) {
    let tier = context.difficulty.map_or("", tier_label);
    let (focus, confidence) = match context.exercise_names.as_slice() {
        [] => ("Strength".to_string(), 0.4),
        [only] | [only, _] if !only.is_empty() => (title_case(only), 0.6),
        _ => ("Full Body".to_string(), 0.6),
    };
    let title = [tier, focus.as_str(), "Workout"]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (title, confidence)
}

const fn tier_label(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => "Beginner",
        Difficulty::Intermediate => "Intermediate",
        Difficulty::Advanced => "Advanced",
    }
}

fn duration_suggestions(minutes: i64, context: &ValidationContext) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    let (min, _) = DURATION_RANGE;
    if minutes < min {
        suggestions.push(Suggestion::new(
            json!(min),
            0.6,
            format!("The shortest supported session is {min} minutes"),
        ));
        return suggestions;
    }

    if let Some(difficulty) = context.difficulty {
        let ceiling = difficulty.duration_ceiling();
        if minutes > ceiling {
            suggestions.push(Suggestion::new(
                json!(ceiling),
                0.7,
                format!(
                    "{} sessions rarely need more than {ceiling} minutes",
                    tier_label(difficulty)
                ),
            ));
            suggestions.push(Suggestion::new(
                json!(round_to_five(ceiling * 3 / 4)),
                0.5,
                "A shorter session leaves room to progress",
            ));
        }
    }

    if minutes % 5 != 0 {
        suggestions.push(Suggestion::new(
            json!(round_to_five(minutes).max(min)),
            0.3,
            "Round durations are easier to plan around",
        ));
    }
    suggestions
}

const fn round_to_five(value: i64) -> i64 {
    (value + 2) / 5 * 5
}

fn volume_suggestions(field: Field, value: &Value, context: &ValidationContext) -> Vec<Suggestion> {
    let Some(difficulty) = context.difficulty else {
        return Vec::new();
    };
    let (sets, reps) = match field {
        Field::Sets => (
            whole_number(value),
            context.reps.as_ref().and_then(|reps| reps.upper_bound()),
        ),
        Field::Reps => (context.sets, rep_bounds(value).map(|(_, high)| high)),
        _ => (None, None),
    };
    let (Some(sets), Some(reps)) = (sets, reps) else {
        return Vec::new();
    };
    if sets < 1 || reps < 1 {
        return Vec::new();
    }

    let ceiling = difficulty.volume_ceiling();
    let volume = sets.saturating_mul(reps);
    if volume <= ceiling {
        return Vec::new();
    }

    let tier = tier_label(difficulty);
    let mut suggestions = Vec::new();
    match field {
        Field::Sets => {
            let reduced = (ceiling / reps).max(1);
            suggestions.push(Suggestion::new(
                json!(reduced),
                0.7,
                format!(
                    "{reduced} x {reps} keeps volume within the {tier} ceiling of {ceiling} reps"
                ),
            ));
            if sets > 3 && reduced != 3 {
                suggestions.push(Suggestion::new(
                    json!(3),
                    0.4,
                    "Three working sets is a common starting point",
                ));
            }
        }
        _ => {
            let reduced = (ceiling / sets).max(1);
            suggestions.push(Suggestion::new(
                json!(reduced),
                0.7,
                format!(
                    "{sets} x {reduced} keeps volume within the {tier} ceiling of {ceiling} reps"
                ),
            ));
            if reduced > 4 {
                suggestions.push(Suggestion::new(
                    json!(format!("{}-{reduced}", reduced - 4)),
                    0.5,
                    "A rep range gives room to progress",
                ));
            }
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reps;
    use pretty_assertions::assert_eq;

    fn context(difficulty: Difficulty) -> ValidationContext {
        ValidationContext {
            difficulty: Some(difficulty),
            ..ValidationContext::default()
        }
    }

    #[test]
    fn short_lowercase_title_gets_replacements() {
        let context = ValidationContext {
            exercise_names: vec!["squat".to_string()],
            ..context(Difficulty::Beginner)
        };
        let suggestions = SuggestionProvider::Title.suggest(Field::Title, &json!("legs"), &context);
        let values: Vec<&Value> = suggestions.iter().map(|suggestion| &suggestion.value).collect();
        assert_eq!(values, [&json!("Legs"), &json!("Beginner Squat Workout")]);
    }

    #[test]
    fn good_title_gets_nothing() {
        let suggestions =
            SuggestionProvider::Title.suggest(Field::Title, &json!("Upper Body Strength"), &context(Difficulty::Advanced));
        assert!(suggestions.is_empty());
    }

    #[test]
    fn long_beginner_session_suggests_ceiling() {
        let suggestions =
            SuggestionProvider::Duration.suggest(Field::Duration, &json!(120), &context(Difficulty::Beginner));
        assert_eq!(suggestions[0].value, json!(60));
        assert_eq!(suggestions[1].value, json!(45));
        assert!(suggestions[0].rationale.contains("Beginner"));
    }

    #[test]
    fn odd_duration_is_rounded() {
        let suggestions =
            SuggestionProvider::Duration.suggest(Field::Duration, &json!(43), &context(Difficulty::Advanced));
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].value, json!(45));
    }

    #[test]
    fn excessive_volume_suggests_fewer_sets() {
        let context = ValidationContext {
            reps: Some(Reps::Count(15)),
            ..context(Difficulty::Beginner)
        };
        let suggestions = SuggestionProvider::Volume.suggest(Field::Sets, &json!(6), &context);
        assert_eq!(suggestions[0].value, json!(4));
        assert_eq!(suggestions[1].value, json!(3));
    }

    #[test]
    fn excessive_volume_suggests_fewer_reps() {
        let context = ValidationContext {
            sets: Some(5),
            ..context(Difficulty::Beginner)
        };
        let suggestions = SuggestionProvider::Volume.suggest(Field::Reps, &json!("15-20"), &context);
        assert_eq!(suggestions[0].value, json!(12));
        assert_eq!(suggestions[1].value, json!("8-12"));
    }

    #[test]
    fn volume_within_ceiling_is_quiet() {
        let context = ValidationContext {
            reps: Some(Reps::Count(10)),
            ..context(Difficulty::Beginner)
        };
        assert!(SuggestionProvider::Volume.suggest(Field::Sets, &json!(3), &context).is_empty());
    }

    #[test]
    fn rank_orders_dedupes_and_truncates() {
        let ranked = rank(
            vec![
                Suggestion::new(json!(1), 0.2, "low"),
                Suggestion::new(json!(2), 0.9, "high"),
                Suggestion::new(json!(2), 0.5, "duplicate"),
                Suggestion::new(json!(3), 0.6, "mid"),
            ],
            2,
        );
        let rationales: Vec<&str> = ranked.iter().map(|s| s.rationale.as_str()).collect();
        assert_eq!(rationales, ["high", "mid"]);
    }
}
