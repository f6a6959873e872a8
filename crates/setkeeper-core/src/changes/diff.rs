//! Field-level comparison of a draft against its snapshot.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::Workout;

/// Top-level field names that differ between draft and snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    fields: Vec<String>,
}

impl ChangeSet {
    pub fn new(mut fields: Vec<String>) -> Self {
        fields.sort();
        fields.dedup();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|candidate| candidate == field)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

/// Compare `draft` against `snapshot`, skipping `exclude` paths.
///
/// Deep mode walks nested objects and arrays and honours dotted exclusions
/// such as `metadata.updated_at` (array elements share their parent's path).
/// Shallow mode compares each top-level field as a whole, after dropping
/// excluded dotted paths beneath it.
pub fn diff_workouts(draft: &Workout, snapshot: &Workout, deep: bool, exclude: &[String]) -> ChangeSet {
    let (Some(draft_fields), Some(snapshot_fields)) = (as_object(draft), as_object(snapshot)) else {
        tracing::warn!("Workout did not serialize to an object; falling back to equality check");
        let fields = if draft == snapshot {
            Vec::new()
        } else {
            vec!["workout".to_string()]
        };
        return ChangeSet::new(fields);
    };

    let changed = union_keys(&draft_fields, &snapshot_fields)
        .into_iter()
        .filter(|key| !is_excluded(key, exclude))
        .filter(|key| {
            let left = draft_fields.get(key.as_str()).unwrap_or(&Value::Null);
            let right = snapshot_fields.get(key.as_str()).unwrap_or(&Value::Null);
            if deep {
                values_differ(key, left, right, exclude)
            } else {
                without_excluded(key, left, exclude) != without_excluded(key, right, exclude)
            }
        })
        .collect();

    ChangeSet::new(changed)
}

/// Three-way merge: keep the remote copy except for fields the local draft
/// changed relative to `base`.
pub fn merge_onto_remote(local: &Workout, base: Option<&Workout>, remote: &Workout, exclude: &[String]) -> Workout {
    let changed = base.map_or_else(
        || diff_workouts(local, remote, true, exclude),
        |base| diff_workouts(local, base, true, exclude),
    );

    let merged = as_object(remote).zip(as_object(local)).and_then(|(mut merged, local_fields)| {
        for field in changed.iter() {
            match local_fields.get(field) {
                Some(value) => {
                    merged.insert(field.to_string(), value.clone());
                }
                None => {
                    merged.remove(field);
                }
            }
        }
        serde_json::from_value::<Workout>(Value::Object(merged)).ok()
    });

    let mut merged = merged.unwrap_or_else(|| local.clone());
    merged.id = remote.id;
    merged.metadata.revision = remote.metadata.revision;
    merged
}

fn as_object(workout: &Workout) -> Option<Map<String, Value>> {
    match serde_json::to_value(workout) {
        Ok(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

fn union_keys(left: &Map<String, Value>, right: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = left.keys().chain(right.keys()).cloned().collect();
    keys.sort();
    keys.dedup();
    keys
}

fn is_excluded(path: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|excluded| excluded == path)
}

fn without_excluded(path: &str, value: &Value, exclude: &[String]) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter_map(|(key, child)| {
                    let child_path = format!("{path}.{key}");
                    (!is_excluded(&child_path, exclude))
                        .then(|| (key.clone(), without_excluded(&child_path, child, exclude)))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| without_excluded(path, item, exclude))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn values_differ(path: &str, left: &Value, right: &Value, exclude: &[String]) -> bool {
    match (left, right) {
        (Value::Object(left), Value::Object(right)) => union_keys(left, right).into_iter().any(|key| {
            let child = format!("{path}.{key}");
            !is_excluded(&child, exclude)
                && values_differ(
                    &child,
                    left.get(&key).unwrap_or(&Value::Null),
                    right.get(&key).unwrap_or(&Value::Null),
                    exclude,
                )
        }),
        (Value::Array(left), Value::Array(right)) => {
            left.len() != right.len()
                || left
                    .iter()
                    .zip(right)
                    .any(|(left, right)| values_differ(path, left, right, exclude))
        }
        _ => left != right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Exercise, WorkoutId};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn volatile() -> Vec<String> {
        ["id", "metadata.created_at", "metadata.updated_at", "metadata.revision"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn leg_day() -> Workout {
        Workout::new("Leg Day", 30, Difficulty::Beginner).with_exercise(Exercise::new("Squat", 3, 10))
    }

    #[test]
    fn identical_workouts_have_no_changes() {
        let workout = leg_day();
        assert!(diff_workouts(&workout, &workout.clone(), true, &volatile()).is_empty());
        assert!(diff_workouts(&workout, &workout.clone(), false, &volatile()).is_empty());
    }

    #[test]
    fn volatile_fields_are_ignored_in_both_modes() {
        let snapshot = leg_day();
        let mut draft = snapshot.clone();
        draft.id = Some(WorkoutId::new());
        draft.metadata.created_at = Some(Utc::now());
        draft.metadata.updated_at = Some(Utc::now());
        draft.metadata.revision = 7;

        assert!(diff_workouts(&draft, &snapshot, true, &volatile()).is_empty());
        assert!(diff_workouts(&draft, &snapshot, false, &volatile()).is_empty());
    }

    #[test]
    fn shallow_mode_reports_whole_field_for_nested_change() {
        let snapshot = leg_day();
        let mut draft = snapshot.clone();
        draft.metadata.updated_at = Some(Utc::now());
        draft.metadata.owner = Some("coach".to_string());

        assert_eq!(
            diff_workouts(&draft, &snapshot, false, &volatile()).fields(),
            ["metadata".to_string()]
        );
    }

    #[test]
    fn nested_exercise_change_reports_top_level_field() {
        let snapshot = leg_day();
        let mut draft = snapshot.clone();
        draft.exercises[0].sets = 5;
        draft.title = "Heavy Leg Day".to_string();

        let changes = diff_workouts(&draft, &snapshot, true, &volatile());
        assert_eq!(changes.fields(), ["exercises".to_string(), "title".to_string()]);
    }

    #[test]
    fn merge_keeps_remote_fields_the_user_did_not_touch() {
        let mut base = leg_day();
        base.metadata.revision = 1;
        let mut local = base.clone();
        local.title = "Leg Day (local)".to_string();
        let mut remote = base.clone();
        remote.duration = 45;
        remote.metadata.revision = 2;

        let merged = merge_onto_remote(&local, Some(&base), &remote, &volatile());
        assert_eq!(merged.title, "Leg Day (local)");
        assert_eq!(merged.duration, 45);
        assert_eq!(merged.metadata.revision, 2);
    }
}
