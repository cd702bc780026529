// sala-core/src/application/review.rs

// Manual review of the pending suggestion batch.
// Shares the RuleStore commit lock with the Mediator, so a review and a run
// never write the rule set at the same time.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::application::rule_store::{RuleAddition, RuleStore};
use crate::domain::error::DomainError;
use crate::domain::governance::{Suggestion, SuggestionStatus};
use crate::domain::ports::ArtifactStore;
use crate::domain::rules::Provenance;
use crate::error::SalaError;

#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub suggestion: Suggestion,
    /// Snapshot written by the review, `None` for duplicates and malformed rules.
    pub committed_version: Option<u64>,
}

pub struct ReviewService {
    rules: Arc<RuleStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ReviewService {
    pub fn new(rules: Arc<RuleStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { rules, artifacts }
    }

    pub fn list_pending(&self) -> Result<Vec<Suggestion>, SalaError> {
        Ok(self.artifacts.load_pending()?.into_values().collect())
    }

    /// Merges the suggestion into a new snapshot, unless the current active
    /// set already carries an equivalent rule.
    #[instrument(skip(self))]
    pub fn apply(&self, id: &str) -> Result<ReviewOutcome, SalaError> {
        let _guard = self.rules.commit_guard()?;
        let mut pending = self.artifacts.load_pending()?;
        let mut suggestion = pending
            .remove(id)
            .ok_or_else(|| DomainError::SuggestionNotFound(id.to_string()))?;

        let active = self.rules.refresh()?;

        let signature = match suggestion.rule.compile() {
            Ok(compiled) => compiled.signature(),
            Err(e) => {
                suggestion.transition(SuggestionStatus::Rejected, Some(e.to_string()))?;
                self.artifacts.replace_pending(&pending)?;
                return Ok(ReviewOutcome {
                    suggestion,
                    committed_version: None,
                });
            }
        };

        let mut committed_version = None;
        if active.signatures().contains(&signature) {
            suggestion.transition(
                SuggestionStatus::Duplicate,
                Some("already in the active rule set".into()),
            )?;
        } else {
            let addition = RuleAddition {
                draft: suggestion.rule.clone(),
                confidence: suggestion.confidence,
                provenance: Provenance::Manual,
            };
            let outcome = self.rules.commit_with_retry(
                active.version,
                &[addition],
                Some(suggestion.source_run_id.clone()),
            )?;
            match outcome.merged.first() {
                Some((_, rule_id)) => {
                    suggestion.transition(
                        SuggestionStatus::Applied,
                        Some(format!("merged as {}", rule_id)),
                    )?;
                    suggestion.applied_rule_id = Some(rule_id.clone());
                    committed_version = outcome.snapshot.map(|s| s.version);
                }
                None => suggestion.transition(
                    SuggestionStatus::Duplicate,
                    Some("equivalent rule committed concurrently".into()),
                )?,
            }
        }

        self.artifacts.replace_pending(&pending)?;
        info!(id, status = %suggestion.status, version = ?committed_version, "Suggestion reviewed");
        Ok(ReviewOutcome {
            suggestion,
            committed_version,
        })
    }

    #[instrument(skip(self))]
    pub fn reject(&self, id: &str, reason: Option<String>) -> Result<Suggestion, SalaError> {
        let _guard = self.rules.commit_guard()?;
        let mut pending = self.artifacts.load_pending()?;
        let mut suggestion = pending
            .remove(id)
            .ok_or_else(|| DomainError::SuggestionNotFound(id.to_string()))?;
        suggestion.transition(
            SuggestionStatus::Rejected,
            Some(reason.unwrap_or_else(|| "rejected by reviewer".into())),
        )?;
        self.artifacts.replace_pending(&pending)?;
        info!(id, "Suggestion rejected");
        Ok(suggestion)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::mediator::tests::MemoryArtifacts;
    use crate::application::rule_store::tests::MemoryRules;
    use crate::domain::governance::CandidateSuggestion;
    use crate::domain::rules::{RuleDraft, RuleKind};
    use anyhow::Result;
    use std::collections::BTreeMap;

    fn pending(condition: &str) -> Result<Suggestion> {
        let mut s = Suggestion::proposed(
            CandidateSuggestion {
                title: "flag".into(),
                rule: RuleDraft::new(RuleKind::Assign, condition, "dq_flag", "'x'"),
                reason: "test".into(),
                confidence: 0.7,
            },
            "run_1",
            "heuristic",
        );
        s.transition(SuggestionStatus::Accepted, None)?;
        Ok(s)
    }

    fn service(batch: Vec<Suggestion>) -> Result<(ReviewService, Arc<RuleStore>, Arc<MemoryArtifacts>)> {
        let rules = Arc::new(RuleStore::open(Arc::new(MemoryRules::default()))?);
        let artifacts = Arc::new(MemoryArtifacts::default());
        let map: BTreeMap<String, Suggestion> = batch.into_iter().map(|s| (s.id.clone(), s)).collect();
        *artifacts.pending.lock().unwrap() = map;
        Ok((ReviewService::new(rules.clone(), artifacts.clone()), rules, artifacts))
    }

    #[test]
    fn test_apply_commits_manual_rule_and_clears_pending() -> Result<()> {
        let s = pending("amount < 0")?;
        let id = s.id.clone();
        let (review, rules, artifacts) = service(vec![s])?;

        let outcome = review.apply(&id)?;
        assert_eq!(outcome.suggestion.status, SuggestionStatus::Applied);
        assert_eq!(outcome.suggestion.applied_rule_id.as_deref(), Some("R0001"));
        assert_eq!(outcome.committed_version, Some(1));

        let active = rules.active()?;
        assert_eq!(active.rules[0].provenance, Provenance::Manual);
        assert!(artifacts.pending.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_apply_duplicate_writes_nothing() -> Result<()> {
        let first = pending("amount < 0")?;
        let second = pending("AMOUNT<0")?;
        let (first_id, second_id) = (first.id.clone(), second.id.clone());
        let (review, rules, _) = service(vec![first, second])?;

        review.apply(&first_id)?;
        let outcome = review.apply(&second_id)?;
        assert_eq!(outcome.suggestion.status, SuggestionStatus::Duplicate);
        assert_eq!(outcome.committed_version, None);
        assert_eq!(rules.history()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_reject_removes_from_pending() -> Result<()> {
        let s = pending("amount < 0")?;
        let id = s.id.clone();
        let (review, rules, artifacts) = service(vec![s])?;

        let rejected = review.reject(&id, Some("not useful".into()))?;
        assert_eq!(rejected.status, SuggestionStatus::Rejected);
        assert_eq!(rejected.status_reason.as_deref(), Some("not useful"));
        assert!(artifacts.pending.lock().unwrap().is_empty());
        assert!(rules.history()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_id_is_an_error() -> Result<()> {
        let (review, _, _) = service(Vec::new())?;
        let err = review.apply("sg_missing").unwrap_err();
        assert!(matches!(err, SalaError::Domain(DomainError::SuggestionNotFound(_))));
        Ok(())
    }
}
