//! setkeeper-core - Persistence coordination for the workout editor
//!
//! This crate contains the draft models, the save coordinator, change
//! detection, validation and notification state shared by every setkeeper
//! interface (CLI today, editor front-ends later).

pub mod changes;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod observe;
pub mod save;
pub mod session;
pub mod store;
pub mod timing;
pub mod validation;

pub use config::{ConfigError, EngineConfig};
pub use error::{Error, Result};
pub use models::{Difficulty, Exercise, SavePriority, SaveResult, SaveState, SaveStatus, Workout, WorkoutId};
pub use session::EditingSession;
