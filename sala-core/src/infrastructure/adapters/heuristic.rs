// sala-core/src/infrastructure/adapters/heuristic.rs

// Deterministic synthesizer: turns the evidence of one run into flag/alert
// rules. Always available, used whenever the remote synthesizer is disabled.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::application::executor::{IMPUTED_FLAG, MISSING_REASON};
use crate::domain::dataset::ColumnKind;
use crate::domain::governance::{CandidateSuggestion, HeuristicsConfig};
use crate::domain::numeric::format_number;
use crate::domain::rules::{Rule, RuleDraft, RuleKind, RuleSignature};
use crate::ports::synthesizer::{EvidenceBundle, SuggestionSynthesizer, SynthesisError};

pub const HEURISTIC_SOURCE: &str = "heuristic";

pub struct HeuristicSynthesizer {
    config: HeuristicsConfig,
}

fn quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl HeuristicSynthesizer {
    pub fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    fn flag(&self, title: String, condition: String, label: &str, reason: String, confidence: f64) -> CandidateSuggestion {
        CandidateSuggestion {
            title,
            rule: RuleDraft::new(RuleKind::Assign, condition, &self.config.flag_field, quoted(label)),
            reason,
            confidence,
        }
    }

    fn alert(&self, title: String, condition: String, label: &str, reason: String, confidence: f64) -> CandidateSuggestion {
        CandidateSuggestion {
            title,
            rule: RuleDraft::new(RuleKind::Assign, condition, &self.config.alert_field, quoted(label)),
            reason,
            confidence,
        }
    }

    /// Candidate list for one run, in a stable order.
    pub fn propose(&self, evidence: &EvidenceBundle, existing: &[Rule]) -> Vec<CandidateSuggestion> {
        if evidence.row_count == 0 {
            return Vec::new();
        }

        // Rule outputs are expected to be sparse; never flag them as missing.
        let mut outputs: BTreeSet<&str> = existing.iter().map(|r| r.target_field.as_str()).collect();
        outputs.extend([
            self.config.flag_field.as_str(),
            self.config.alert_field.as_str(),
            IMPUTED_FLAG,
            MISSING_REASON,
        ]);

        let mut out = Vec::new();

        // A) missing ratio
        for col in &evidence.profile.columns {
            if outputs.contains(col.name.as_str()) {
                continue;
            }
            let ratio = col.null_count as f64 / evidence.row_count as f64;
            if col.null_count > 0 && ratio >= self.config.missing_ratio_threshold {
                out.push(self.flag(
                    format!("High missing ratio on {}", col.name),
                    format!("{} IS NULL", col.name),
                    &format!("missing_{}", col.name),
                    format!("{:.0}% of {} is missing.", ratio * 100.0, col.name),
                    0.90,
                ));
            }
        }

        // B) negative values where only non-negative make sense
        for name in &self.config.non_negative_columns {
            if let Some(col) = evidence.profile.column(name)
                && col.negative_count > 0
            {
                out.push(self.flag(
                    format!("Negative {}", name),
                    format!("{} < 0", name),
                    &format!("negative_{}", name),
                    format!("{} rows have {} < 0.", col.negative_count, name),
                    0.89,
                ));
            }
        }

        // C) IQR outliers
        for report in evidence.outliers.iter().filter(|o| o.degenerate.is_none()) {
            if let (Some(upper), true) = (report.upper_bound, report.above_count > 0) {
                out.push(self.flag(
                    format!("Extreme {} (high)", report.column),
                    format!("{} > {}", report.column, format_number(upper)),
                    &format!("{}_outlier_high", report.column),
                    format!(
                        "{} rows above the IQR fence {}.",
                        report.above_count,
                        format_number(upper)
                    ),
                    0.90,
                ));
            }
            if let (Some(lower), true) = (report.lower_bound, report.below_count > 0) {
                out.push(self.flag(
                    format!("Extreme {} (low)", report.column),
                    format!("{} < {}", report.column, format_number(lower)),
                    &format!("{}_outlier_low", report.column),
                    format!(
                        "{} rows below the IQR fence {}.",
                        report.below_count,
                        format_number(lower)
                    ),
                    0.90,
                ));
            }
        }

        // D) dates after the run date (ISO text compares lexicographically)
        let today = evidence.run_date.format("%Y-%m-%d").to_string();
        for name in &self.config.date_columns {
            let future = evidence
                .dataset
                .column_values(name)
                .filter_map(|v| v.category_key())
                .filter(|text| text.get(..10).is_some_and(|day| day > today.as_str()))
                .count();
            if future > 0 {
                out.push(self.flag(
                    format!("Future dates in {}", name),
                    format!("{} > {}", name, quoted(&today)),
                    "future_date_anomaly",
                    format!("{} records have {} after {}.", future, name, today),
                    0.88,
                ));
            }
        }

        // E) values outside the allowed set, one rule per value
        for (name, allowed) in &self.config.allowed_values {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for key in evidence.dataset.column_values(name).filter_map(|v| v.category_key()) {
                if !allowed.contains(&key) {
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
            let mut unexpected: Vec<(String, usize)> = counts
                .into_iter()
                .filter(|(_, count)| *count >= self.config.min_unexpected_count)
                .collect();
            unexpected.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            for (value, count) in unexpected.into_iter().take(self.config.max_unexpected_values) {
                out.push(self.alert(
                    format!("Unexpected {}: {}", name, value),
                    format!("{} == {}", name, quoted(&value)),
                    &format!("unexpected_{}", name),
                    format!("{} rows contain {}={}.", count, name, value),
                    0.86,
                ));
            }
        }

        // F) mean drift beyond tolerance
        for report in evidence
            .drift
            .iter()
            .filter(|d| d.exceeded_tolerance && d.kind == ColumnKind::Numeric)
        {
            let shift = report.mean_delta.unwrap_or_default();
            out.push(self.alert(
                format!("Mean shift on {}", report.column),
                "true".to_string(),
                &format!("mean_{}_shift", report.column),
                format!(
                    "Mean of {} moved by {:.1}% against the baseline.",
                    report.column,
                    shift * 100.0
                ),
                0.87,
            ));
        }

        let present: BTreeSet<RuleSignature> = existing
            .iter()
            .filter_map(|r| r.compile().ok())
            .map(|c| c.signature())
            .collect();
        out.retain(|c| {
            c.rule
                .compile()
                .map(|compiled| !present.contains(&compiled.signature()))
                .unwrap_or(true)
        });
        debug!(candidates = out.len(), "Heuristic candidates");
        out
    }
}

#[async_trait]
impl SuggestionSynthesizer for HeuristicSynthesizer {
    async fn synthesize(
        &self,
        evidence: &EvidenceBundle,
        existing_rules: &[Rule],
    ) -> Result<Vec<CandidateSuggestion>, SynthesisError> {
        Ok(self.propose(evidence, existing_rules))
    }

    fn name(&self) -> &str {
        HEURISTIC_SOURCE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::compliance::{AnomalyDetector, DatasetProfile, DriftReport};
    use crate::domain::dataset::{Dataset, Value};
    use crate::domain::rules::Provenance;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn orders() -> Dataset {
        let mut records = Vec::new();
        for i in 0..20 {
            records.push(vec![
                Value::from(if i < 8 { None } else { Some("a@b.c") }),
                Value::from(if i == 19 { 900.0 } else if i == 3 { -5.0 } else { 100.0 + i as f64 }),
                Value::from(if i < 12 { "EUR" } else { "BTC" }),
                Value::from(if i == 0 { "2027-01-01" } else { "2026-10-01" }),
            ]);
        }
        Dataset::from_records(&["email", "total_amount", "currency", "order_date"], records)
    }

    fn evidence(dataset: Dataset, drift: Vec<DriftReport>) -> EvidenceBundle {
        let outliers = AnomalyDetector::default().detect(&dataset, &["total_amount".to_string()]);
        EvidenceBundle {
            run_id: "run_1".into(),
            run_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            row_count: dataset.len(),
            audits: Vec::new(),
            outliers,
            drift,
            profile: DatasetProfile::of(&dataset),
            dataset: Arc::new(dataset),
        }
    }

    fn synthesizer() -> HeuristicSynthesizer {
        let mut config = HeuristicsConfig::default();
        config.non_negative_columns = vec!["total_amount".into()];
        config.date_columns = vec!["order_date".into()];
        config.allowed_values.insert("currency".into(), vec!["EUR".into(), "USD".into()]);
        config.min_unexpected_count = 5;
        HeuristicSynthesizer::new(config)
    }

    fn conditions(candidates: &[CandidateSuggestion]) -> Vec<String> {
        candidates.iter().map(|c| c.rule.condition.clone()).collect()
    }

    #[test]
    fn test_each_heuristic_fires() {
        let candidates = synthesizer().propose(&evidence(orders(), Vec::new()), &[]);
        let conds = conditions(&candidates);

        assert!(conds.contains(&"email IS NULL".to_string()));
        assert!(conds.contains(&"total_amount < 0".to_string()));
        assert!(conds.iter().any(|c| c.starts_with("total_amount > ")));
        assert!(conds.contains(&"order_date > '2026-10-19'".to_string()));
        assert!(conds.contains(&"currency == 'BTC'".to_string()));

        let missing = candidates.iter().find(|c| c.rule.condition == "email IS NULL").unwrap();
        assert_eq!(missing.rule.expression, "'missing_email'");
        assert_eq!(missing.rule.target_field, "dq_flag");
        assert_eq!(missing.confidence, 0.90);
        // every candidate is a well-formed rule
        assert!(candidates.iter().all(|c| c.rule.compile().is_ok()));
    }

    #[test]
    fn test_existing_rules_are_not_proposed_again() {
        let existing = Rule::from_draft(
            "R0001",
            &RuleDraft::new(RuleKind::Assign, "email is null", "DQ_FLAG", "'missing_email'"),
            1.0,
            Provenance::Manual,
            1,
        )
        .unwrap();
        let candidates = synthesizer().propose(&evidence(orders(), Vec::new()), &[existing]);
        assert!(!conditions(&candidates).contains(&"email IS NULL".to_string()));
    }

    #[test]
    fn test_drift_alert() {
        let drift = vec![DriftReport {
            column: "total_amount".into(),
            kind: ColumnKind::Numeric,
            baseline_mean: Some(100.0),
            current_mean: Some(160.0),
            mean_delta: Some(0.6),
            distribution_delta: None,
            exceeded_tolerance: true,
            note: None,
        }];
        let candidates = synthesizer().propose(&evidence(orders(), drift), &[]);
        let alert = candidates
            .iter()
            .find(|c| c.rule.expression == "'mean_total_amount_shift'")
            .unwrap();
        assert_eq!(alert.rule.target_field, "dq_alert");
        assert_eq!(alert.confidence, 0.87);
    }

    #[test]
    fn test_empty_dataset_proposes_nothing() {
        let empty = Dataset::new(vec!["email".into()]);
        assert!(synthesizer().propose(&evidence(empty, Vec::new()), &[]).is_empty());
    }
}
