// sala-core/src/domain/rules/signature.rs

use serde::Serialize;
use std::fmt;

use crate::domain::rules::rule::RuleKind;

/// Structural identity of a rule, used for dedupe. Condition and expression
/// are the canonical pretty-printed parse trees, lowercased, so spacing,
/// keyword case and operator aliases (`=` vs `==`) do not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleSignature {
    pub kind: RuleKind,
    pub condition: String,
    pub target_field: String,
    pub expression: String,
}

impl RuleSignature {
    pub fn new(kind: RuleKind, condition: &str, target_field: &str, expression: &str) -> Self {
        Self {
            kind,
            condition: condition.to_lowercase(),
            target_field: target_field.trim().to_lowercase(),
            expression: expression.to_lowercase(),
        }
    }
}

impl fmt::Display for RuleSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.kind, self.condition, self.target_field, self.expression
        )
    }
}
