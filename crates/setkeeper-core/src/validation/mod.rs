//! Field and draft validation with a TTL cache and advisory suggestions.

mod cache;
mod config;
mod result;
mod rules;
mod suggestions;

pub use cache::{CacheStats, ValidationCache};
pub use config::ValidationConfig;
pub use result::{DraftValidation, EnhancedValidationResult, ValidationContext};
pub use rules::{Field, Rule, RuleOutcome, Severity};
pub use suggestions::{rank, Suggestion, SuggestionProvider};
