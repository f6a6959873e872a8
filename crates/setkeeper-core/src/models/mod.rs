//! Data models for setkeeper

mod save;
mod workout;

pub use save::{SavePriority, SaveRequest, SaveResult, SaveState, SaveStatus, Snapshot};
pub use workout::{
    parse_rep_range, Difficulty, Exercise, Reps, Workout, WorkoutId, WorkoutMetadata,
};
