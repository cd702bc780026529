// sala-core/src/domain/rules/rule.rs

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::rules::expr::{Expr, Predicate};
use crate::domain::rules::parser::{is_identifier, parse_condition, parse_expression};
use crate::domain::rules::signature::RuleSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Assign,
    Impute,
    Compute,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Impute => "impute",
            Self::Compute => "compute",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assign" => Ok(Self::Assign),
            "impute" => Ok(Self::Impute),
            "compute" => Ok(Self::Compute),
            other => Err(DomainError::SignatureMismatch(format!(
                "unknown rule kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Manual,
    AutoAccepted,
    LlmPending,
}

fn default_condition() -> String {
    "true".to_string()
}

fn default_confidence() -> f64 {
    1.0
}

/// A keyed rule as stored in the active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub kind: RuleKind,
    #[serde(default = "default_condition")]
    pub condition: String,
    pub target_field: String,
    #[serde(alias = "value", alias = "expression_or_value")]
    pub expression: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Rule {
    pub fn from_draft(
        id: impl Into<String>,
        draft: &RuleDraft,
        confidence: f64,
        provenance: Provenance,
        version: u64,
    ) -> Result<Self, DomainError> {
        let kind = draft.kind.parse::<RuleKind>()?;
        Ok(Self {
            id: id.into(),
            kind,
            condition: draft.condition.clone(),
            target_field: draft.target_field.clone(),
            expression: draft.expression.clone(),
            confidence,
            provenance,
            created_at: Utc::now(),
            version,
        })
    }

    /// Converts a legacy `{if, then}` entry, e.g. `then: "impute status = 'unknown'"`.
    pub fn from_legacy(
        id: impl Into<String>,
        condition: &str,
        action: &str,
    ) -> Result<Self, DomainError> {
        let draft = RuleDraft::from_action(condition, action)?;
        Self::from_draft(id, &draft, default_confidence(), Provenance::Manual, 0)
    }

    pub fn draft(&self) -> RuleDraft {
        RuleDraft {
            kind: self.kind.as_str().to_string(),
            condition: self.condition.clone(),
            target_field: self.target_field.clone(),
            expression: self.expression.clone(),
        }
    }

    pub fn compile(&self) -> Result<CompiledRule, DomainError> {
        self.draft()
            .compile()
            .map_err(|e| DomainError::RuleEvaluation {
                rule_id: self.id.clone(),
                reason: e.to_string(),
            })
    }

    /// `assign dq_flag = 'missing_email' where email IS NULL`
    pub fn describe(&self) -> String {
        format!(
            "{} {} = {} where {}",
            self.kind, self.target_field, self.expression, self.condition
        )
    }
}

/// An unkeyed candidate rule. Fields stay textual until compiled so that a
/// malformed candidate can still be recorded and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub kind: String,
    #[serde(default = "default_condition")]
    pub condition: String,
    pub target_field: String,
    #[serde(alias = "value", alias = "expression_or_value")]
    pub expression: String,
}

impl RuleDraft {
    pub fn new(
        kind: RuleKind,
        condition: impl Into<String>,
        target_field: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            condition: condition.into(),
            target_field: target_field.into(),
            expression: expression.into(),
        }
    }

    /// Parses a `"<kind> <field> = <expression>"` action string.
    pub fn from_action(condition: &str, action: &str) -> Result<Self, DomainError> {
        let pattern = Regex::new(r"(?i)^\s*(assign|impute|compute)\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+?)\s*$")
            .map_err(|e| DomainError::SignatureMismatch(e.to_string()))?;
        let caps = pattern.captures(action).ok_or_else(|| {
            DomainError::SignatureMismatch(format!(
                "action '{}' is not of the form '<assign|impute|compute> <field> = <expression>'",
                action
            ))
        })?;
        Ok(Self {
            kind: caps[1].to_lowercase(),
            condition: if condition.trim().is_empty() {
                default_condition()
            } else {
                condition.trim().to_string()
            },
            target_field: caps[2].to_string(),
            expression: caps[3].to_string(),
        })
    }

    pub fn compile(&self) -> Result<CompiledRule, DomainError> {
        let kind = self.kind.parse::<RuleKind>()?;
        if !is_identifier(self.target_field.trim()) {
            return Err(DomainError::SignatureMismatch(format!(
                "target field '{}' is not a valid column name",
                self.target_field
            )));
        }
        let condition = parse_condition(&self.condition)?;
        let expression = parse_expression(&self.expression)?;

        if kind == RuleKind::Impute {
            let mut fields = BTreeSet::new();
            expression.collect_fields(&mut fields);
            if !fields.is_empty() {
                return Err(DomainError::SignatureMismatch(format!(
                    "impute value must be a literal or an aggregate, found field reference(s): {}",
                    fields.into_iter().collect::<Vec<_>>().join(", ")
                )));
            }
        }

        Ok(CompiledRule {
            kind,
            condition,
            target_field: self.target_field.trim().to_string(),
            expression,
        })
    }
}

/// A rule whose condition and expression have been parsed into typed trees.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub kind: RuleKind,
    pub condition: Predicate,
    pub target_field: String,
    pub expression: Expr,
}

impl CompiledRule {
    pub fn signature(&self) -> RuleSignature {
        RuleSignature::new(
            self.kind,
            &self.condition.to_string(),
            &self.target_field,
            &self.expression.to_string(),
        )
    }

    /// Row-level fields the rule reads.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.condition.collect_fields(&mut fields);
        self.expression.collect_fields(&mut fields);
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_legacy_action_conversion() -> Result<()> {
        let rule = Rule::from_legacy("R0001", "status IS NULL", "impute status = 'unknown'")?;
        assert_eq!(rule.kind, RuleKind::Impute);
        assert_eq!(rule.target_field, "status");
        assert_eq!(rule.expression, "'unknown'");
        assert_eq!(rule.provenance, Provenance::Manual);

        let compute = Rule::from_legacy("R0002", "", "COMPUTE total = quantity * unit_price")?;
        assert_eq!(compute.kind, RuleKind::Compute);
        assert_eq!(compute.condition, "true");
        Ok(())
    }

    #[test]
    fn test_bad_action_is_signature_mismatch() {
        let err = RuleDraft::from_action("true", "delete everything").unwrap_err();
        assert!(matches!(err, DomainError::SignatureMismatch(_)));
    }

    #[test]
    fn test_impute_rejects_row_references() {
        let draft = RuleDraft::new(RuleKind::Impute, "price IS NULL", "price", "other_price");
        assert!(matches!(
            draft.compile(),
            Err(DomainError::SignatureMismatch(_))
        ));

        let ok = RuleDraft::new(RuleKind::Impute, "price IS NULL", "price", "mean(price)");
        assert!(ok.compile().is_ok());
    }

    #[test]
    fn test_rule_json_accepts_value_alias() -> Result<()> {
        let json = r#"{"id":"R0001","kind":"assign","target_field":"flag","value":"'x'"}"#;
        let rule: Rule = serde_json::from_str(json)?;
        assert_eq!(rule.expression, "'x'");
        assert_eq!(rule.condition, "true");
        assert_eq!(rule.confidence, 1.0);
        Ok(())
    }

    #[test]
    fn test_compile_error_names_rule() {
        let rule = Rule::from_draft(
            "R0009",
            &RuleDraft::new(RuleKind::Assign, "a >", "b", "1"),
            1.0,
            Provenance::Manual,
            1,
        );
        match rule.map(|r| r.compile()) {
            Ok(Err(DomainError::RuleEvaluation { rule_id, .. })) => assert_eq!(rule_id, "R0009"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
