//! Save coordination for the in-progress draft.
//!
//! Provides:
//! - `SaveCoordinator` - debounced, serialized, retrying saves
//! - `SaveConfig` - user settings for save behavior
//! - `SaveGate` - hook that can veto saving invalid drafts

mod config;
mod coordinator;
mod history;
mod queue;


pub use config::{ConflictResolution, SaveConfig};
pub use coordinator::{ConflictChoice, SaveCoordinator, SaveGate};
pub use history::SaveHistory;
