// sala-core/src/domain/governance/suggestion.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::rules::RuleDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Proposed,
    Duplicate,
    Rejected,
    Accepted,
    AutoAccepted,
    Applied,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Duplicate => "duplicate",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
            Self::AutoAccepted => "auto_accepted",
            Self::Applied => "applied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Duplicate | Self::Rejected | Self::Applied)
    }

    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        matches!(
            (self, next),
            (Proposed, Duplicate | Rejected | Accepted | AutoAccepted)
                | (Accepted, Applied | Rejected | Duplicate)
                | (AutoAccepted, Applied | Duplicate)
        )
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a synthesizer returns: a proposal before it gets an id and a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSuggestion {
    pub title: String,
    pub rule: RuleDraft,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: SuggestionStatus,
    pub to: SuggestionStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub rule: RuleDraft,
    pub reason: String,
    pub confidence: f64,
    pub source_run_id: String,
    /// Name of the synthesizer that proposed it.
    pub source: String,
    pub status: SuggestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_rule_id: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl Suggestion {
    pub fn proposed(candidate: CandidateSuggestion, source_run_id: &str, source: &str) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("sg_{}", &id[..8]),
            title: candidate.title,
            rule: candidate.rule,
            reason: candidate.reason,
            confidence: clamp_confidence(candidate.confidence),
            source_run_id: source_run_id.to_string(),
            source: source.to_string(),
            status: SuggestionStatus::Proposed,
            status_reason: None,
            applied_rule_id: None,
            history: Vec::new(),
        }
    }

    /// Moves to `to`, recording the change. Illegal moves leave the suggestion untouched.
    pub fn transition(
        &mut self,
        to: SuggestionStatus,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.history.push(StatusChange {
            from: self.status,
            to,
            at: Utc::now(),
            reason: reason.clone(),
        });
        if reason.is_some() {
            self.status_reason = reason;
        }
        self.status = to;
        Ok(())
    }
}

/// Confidence outside [0, 1] is clamped; NaN counts as no confidence at all.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::RuleKind;

    fn candidate(confidence: f64) -> CandidateSuggestion {
        CandidateSuggestion {
            title: "flag".into(),
            rule: RuleDraft::new(RuleKind::Assign, "x IS NULL", "dq_flag", "'missing_x'"),
            reason: "x is often missing".into(),
            confidence,
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        use SuggestionStatus::*;
        let all = [Proposed, Duplicate, Rejected, Accepted, AutoAccepted, Applied];
        for terminal in [Duplicate, Rejected, Applied] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!AutoAccepted.can_transition_to(Rejected));
        assert!(!Proposed.can_transition_to(Applied));
    }

    #[test]
    fn test_transition_records_history() -> anyhow::Result<()> {
        let mut s = Suggestion::proposed(candidate(0.9), "run_1", "heuristic");
        assert!(s.id.starts_with("sg_"));
        s.transition(SuggestionStatus::Accepted, None)?;
        s.transition(SuggestionStatus::Rejected, Some("not useful".into()))?;
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.status_reason.as_deref(), Some("not useful"));

        let err = s.transition(SuggestionStatus::Applied, None);
        assert!(matches!(err, Err(DomainError::InvalidTransition { .. })));
        assert_eq!(s.status, SuggestionStatus::Rejected);
        Ok(())
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Suggestion::proposed(candidate(1.7), "r", "h").confidence, 1.0);
        assert_eq!(Suggestion::proposed(candidate(f64::NAN), "r", "h").confidence, 0.0);
    }
}
