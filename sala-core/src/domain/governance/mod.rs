// sala-core/src/domain/governance/mod.rs

pub mod configuration;
pub mod dedupe;
pub mod policy;
pub mod suggestion;

// Re-exports
pub use configuration::{GovernanceConfig, HeuristicsConfig, LlmConfig};
pub use dedupe::{DedupeSummary, dedupe};
pub use policy::{Decision, GovernancePolicy};
pub use suggestion::{CandidateSuggestion, StatusChange, Suggestion, SuggestionStatus};
