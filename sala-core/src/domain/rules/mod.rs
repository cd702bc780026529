// sala-core/src/domain/rules/mod.rs

pub mod expr;
pub mod parser;
pub mod rule;
pub mod signature;
pub mod snapshot;

pub use rule::{CompiledRule, Provenance, Rule, RuleDraft, RuleKind};
pub use signature::RuleSignature;
pub use snapshot::RuleSetSnapshot;
