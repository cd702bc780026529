// sala-core/src/domain/governance/dedupe.rs

use std::collections::BTreeSet;

use crate::domain::governance::suggestion::{Suggestion, SuggestionStatus};
use crate::domain::rules::RuleSignature;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeSummary {
    pub survivors: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Marks duplicates and malformed candidates in batch order.
///
/// A candidate is a duplicate when its signature is already active or was
/// claimed by an earlier survivor of the same batch. Candidates that do not
/// compile are rejected. Suggestions already in a terminal state are left
/// alone, so applying this twice yields the same survivors.
pub fn dedupe(batch: &mut [Suggestion], active: &BTreeSet<RuleSignature>) -> DedupeSummary {
    let mut seen: BTreeSet<RuleSignature> = BTreeSet::new();
    let mut summary = DedupeSummary::default();

    for suggestion in batch.iter_mut() {
        if suggestion.status.is_terminal() {
            continue;
        }
        let signature = match suggestion.rule.compile() {
            Ok(compiled) => compiled.signature(),
            Err(e) => {
                // Only Proposed can be rejected from here; later states already compiled once.
                if suggestion
                    .transition(SuggestionStatus::Rejected, Some(e.to_string()))
                    .is_ok()
                {
                    summary.rejected += 1;
                }
                continue;
            }
        };

        if active.contains(&signature) || seen.contains(&signature) {
            let reason = if active.contains(&signature) {
                "equivalent rule already active"
            } else {
                "equivalent suggestion earlier in this batch"
            };
            if suggestion
                .transition(SuggestionStatus::Duplicate, Some(reason.to_string()))
                .is_ok()
            {
                summary.duplicates += 1;
            }
            continue;
        }

        seen.insert(signature);
        summary.survivors += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::governance::suggestion::CandidateSuggestion;
    use crate::domain::rules::{RuleDraft, RuleKind};
    use anyhow::Result;

    fn suggestion(condition: &str, expression: &str) -> Suggestion {
        Suggestion::proposed(
            CandidateSuggestion {
                title: "t".into(),
                rule: RuleDraft::new(RuleKind::Assign, condition, "dq_flag", expression),
                reason: "r".into(),
                confidence: 0.9,
            },
            "run_test",
            "test",
        )
    }

    fn survivors(batch: &[Suggestion]) -> Vec<String> {
        batch
            .iter()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.id.clone())
            .collect()
    }

    #[test]
    fn test_active_rule_makes_candidate_duplicate() -> Result<()> {
        let active_rule = RuleDraft::new(RuleKind::Assign, "email IS NULL", "dq_flag", "'missing_email'");
        let active = BTreeSet::from([active_rule.compile()?.signature()]);

        let mut batch = vec![suggestion("email   is null", "'missing_email'")];
        let summary = dedupe(&mut batch, &active);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(batch[0].status, SuggestionStatus::Duplicate);
        Ok(())
    }

    #[test]
    fn test_first_in_batch_wins() {
        let mut batch = vec![
            suggestion("a > 1", "'x'"),
            suggestion("a>1", "'x'"),
            suggestion("a > 2", "'x'"),
        ];
        let summary = dedupe(&mut batch, &BTreeSet::new());
        assert_eq!(summary.survivors, 2);
        assert_eq!(batch[0].status, SuggestionStatus::Proposed);
        assert_eq!(batch[1].status, SuggestionStatus::Duplicate);
    }

    #[test]
    fn test_malformed_candidate_is_rejected() {
        let mut batch = vec![suggestion("a >", "'x'")];
        let summary = dedupe(&mut batch, &BTreeSet::new());
        assert_eq!(summary.rejected, 1);
        assert_eq!(batch[0].status, SuggestionStatus::Rejected);
        assert!(batch[0].status_reason.is_some());
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let mut batch = vec![
            suggestion("a > 1", "'x'"),
            suggestion("A > 1", "'X'"),
            suggestion("b IS NULL", "'y'"),
            suggestion("broken (", "'z'"),
            suggestion("b is null", "'y'"),
        ];
        let active = BTreeSet::new();
        dedupe(&mut batch, &active);
        let once = survivors(&batch);
        let statuses: Vec<_> = batch.iter().map(|s| s.status).collect();

        let summary = dedupe(&mut batch, &active);
        assert_eq!(survivors(&batch), once);
        assert_eq!(batch.iter().map(|s| s.status).collect::<Vec<_>>(), statuses);
        assert_eq!(summary.survivors, 2);
        assert_eq!(summary.duplicates, 0);
    }
}
