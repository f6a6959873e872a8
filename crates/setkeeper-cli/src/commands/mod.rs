pub mod common;
pub mod diff;
pub mod save;
pub mod validate;
