// sala-core/src/domain/rules/snapshot.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::rules::rule::Rule;
use crate::domain::rules::signature::RuleSignature;

/// One immutable version of the full rule set. The active set is the latest one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetSnapshot {
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_version: Option<u64>,
    #[serde(default)]
    pub source_run_id: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for RuleSetSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            created_at: Utc::now(),
            parent_version: None,
            source_run_id: None,
            rules: Vec::new(),
        }
    }
}

impl RuleSetSnapshot {
    pub fn new(version: u64, rules: Vec<Rule>) -> Self {
        Self {
            version,
            rules,
            ..Self::default()
        }
    }

    /// Builds the next version: existing rules in order, then `added` appended.
    pub fn successor(&self, added: Vec<Rule>, source_run_id: Option<String>) -> Self {
        let version = self.version + 1;
        let mut rules = self.rules.clone();
        rules.extend(added.into_iter().map(|mut r| {
            r.version = version;
            r
        }));
        Self {
            version,
            created_at: Utc::now(),
            parent_version: Some(self.version),
            source_run_id,
            rules,
        }
    }

    /// Signatures of every rule that compiles. Broken rules cannot shadow candidates.
    pub fn signatures(&self) -> BTreeSet<RuleSignature> {
        self.rules
            .iter()
            .filter_map(|r| r.compile().ok())
            .map(|c| c.signature())
            .collect()
    }

    /// Next free id in the `R0001` sequence.
    pub fn next_rule_id(&self) -> String {
        next_rule_id(self.rules.iter().map(|r| r.id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub fn next_rule_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let max = ids
        .into_iter()
        .filter_map(|id| id.strip_prefix('R').and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0);
    format!("R{:04}", max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::rule::{Provenance, RuleDraft, RuleKind};
    use anyhow::Result;

    fn rule(id: &str) -> Result<Rule> {
        Ok(Rule::from_draft(
            id,
            &RuleDraft::new(RuleKind::Assign, "true", "x", "1"),
            1.0,
            Provenance::Manual,
            1,
        )?)
    }

    #[test]
    fn test_successor_links_parent_and_stamps_version() -> Result<()> {
        let base = RuleSetSnapshot::new(3, vec![rule("R0001")?]);
        let next = base.successor(vec![rule("R0002")?], Some("run_x".into()));
        assert_eq!(next.version, 4);
        assert_eq!(next.parent_version, Some(3));
        assert_eq!(next.rules.len(), 2);
        assert_eq!(next.rules[0].id, "R0001");
        assert_eq!(next.rules[1].version, 4);
        assert_eq!(base.rules.len(), 1);
        Ok(())
    }

    #[test]
    fn test_next_rule_id_skips_foreign_ids() {
        assert_eq!(next_rule_id(["R0001", "R0007", "custom"]), "R0008");
        assert_eq!(next_rule_id(Vec::<&str>::new()), "R0001");
    }
}
