// sala-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Rule '{rule_id}' could not be evaluated: {reason}")]
    #[diagnostic(
        code(sala::domain::rule_evaluation),
        help("The rule is skipped for this run. Fix its condition or expression in rules.json.")
    )]
    RuleEvaluation { rule_id: String, reason: String },

    #[error("Cannot parse '{input}' at position {position}: {reason}")]
    #[diagnostic(
        code(sala::domain::expression),
        help(
            "Supported: IS [NOT] NULL, == != < <= > >=, AND/OR/NOT, + - * /, mean(col), median(col)."
        )
    )]
    ExpressionParse {
        input: String,
        position: usize,
        reason: String,
    },

    #[error("Malformed candidate rule: {0}")]
    #[diagnostic(code(sala::domain::signature))]
    SignatureMismatch(String),

    #[error("Suggestion cannot move from '{from}' to '{to}'")]
    #[diagnostic(code(sala::domain::transition))]
    InvalidTransition { from: String, to: String },

    #[error("Rule store moved from version {expected} to {found} during the run")]
    #[diagnostic(
        code(sala::domain::conflict),
        help("Another run committed first. The commit is retried once on the fresh snapshot.")
    )]
    PersistenceConflict { expected: u64, found: u64 },

    #[error("Persistence Error: {0}")]
    #[diagnostic(code(sala::domain::persistence))]
    Persistence(String),

    #[error("Suggestion '{0}' not found in the pending batch")]
    #[diagnostic(code(sala::domain::suggestion_not_found))]
    SuggestionNotFound(String),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(sala::domain::config))]
    Config(String),
}
