// sala-core/src/domain/governance/policy.rs

use crate::domain::governance::configuration::GovernanceConfig;
use crate::domain::governance::suggestion::{Suggestion, SuggestionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AutoAccept,
    Review,
}

/// Confidence gate between "merge now" and "leave for a human".
#[derive(Debug, Clone, Copy)]
pub struct GovernancePolicy {
    pub auto_accept: bool,
    pub threshold: f64,
}

impl GovernancePolicy {
    pub fn from_config(config: &GovernanceConfig) -> Self {
        Self {
            auto_accept: config.auto_accept,
            threshold: config.confidence_threshold,
        }
    }

    pub fn decide(&self, confidence: f64) -> Decision {
        if self.auto_accept && confidence >= self.threshold {
            Decision::AutoAccept
        } else {
            Decision::Review
        }
    }

    /// Moves every still-proposed suggestion to `auto_accepted` or `accepted`.
    /// Returns the indices of the auto-accepted ones, in batch order.
    pub fn govern(&self, batch: &mut [Suggestion]) -> Vec<usize> {
        let mut accepted = Vec::new();
        for (idx, suggestion) in batch.iter_mut().enumerate() {
            if suggestion.status != SuggestionStatus::Proposed {
                continue;
            }
            let (next, reason) = match self.decide(suggestion.confidence) {
                Decision::AutoAccept => (
                    SuggestionStatus::AutoAccepted,
                    format!("confidence {:.2} >= {:.2}", suggestion.confidence, self.threshold),
                ),
                Decision::Review => (SuggestionStatus::Accepted, "pending review".to_string()),
            };
            if suggestion.transition(next, Some(reason)).is_ok() && next == SuggestionStatus::AutoAccepted {
                accepted.push(idx);
            }
        }
        accepted
    }
}
