// sala-core/src/application/executor.rs

use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

use crate::domain::dataset::{Dataset, Value};
use crate::domain::error::DomainError;
use crate::domain::report::{ColumnSummary, TransformAudit};
use crate::domain::rules::expr::{Aggregates, Expr, Scope};
use crate::domain::rules::{Rule, RuleKind};

pub const IMPUTED_FLAG: &str = "imputed_flag";
pub const MISSING_REASON: &str = "missing_reason";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub curated: Dataset,
    pub audits: Vec<TransformAudit>,
}

/// Applies the active rule set to a dataset, in rule order, in a single pass.
#[derive(Debug, Clone, Default)]
pub struct RuleExecutor {
    lineage_columns: bool,
}

impl RuleExecutor {
    pub fn new(lineage_columns: bool) -> Self {
        Self { lineage_columns }
    }

    /// Never fails: a rule that cannot be compiled or refers to an unavailable
    /// field is skipped and its audit entry carries the error.
    #[instrument(skip_all, fields(rows = dataset.len(), rules = rules.len()))]
    pub fn apply(&self, dataset: &Dataset, rules: &[Rule]) -> ExecutionOutcome {
        let mut curated = dataset.clone();
        let mut audits = Vec::new();

        for rule in rules {
            match self.apply_rule(&mut curated, rule) {
                Ok(Some(audit)) => {
                    debug!(rule_id = %rule.id, rows = audit.rows_affected, "rule fired");
                    audits.push(audit);
                }
                Ok(None) => debug!(rule_id = %rule.id, "rule changed nothing"),
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "rule skipped");
                    let summary = summarize(&curated, &rule.target_field);
                    audits.push(TransformAudit {
                        rule_id: rule.id.clone(),
                        kind: rule.kind,
                        target_field: rule.target_field.clone(),
                        rows_matched: 0,
                        rows_affected: 0,
                        before: summary,
                        after: summary,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        ExecutionOutcome { curated, audits }
    }

    fn apply_rule(
        &self,
        data: &mut Dataset,
        rule: &Rule,
    ) -> Result<Option<TransformAudit>, DomainError> {
        let compiled = rule.compile()?;

        // Only fields materialized so far (source columns + earlier rule targets) are visible.
        let mut aggregate_refs = Vec::new();
        compiled.condition.collect_aggregates(&mut aggregate_refs);
        compiled.expression.collect_aggregates(&mut aggregate_refs);
        let mut needed: BTreeSet<String> = compiled.referenced_fields();
        needed.extend(aggregate_refs.iter().map(|(_, field)| field.clone()));
        if let Some(missing) = needed.iter().find(|f| !data.has_column(f)) {
            return Err(DomainError::RuleEvaluation {
                rule_id: rule.id.clone(),
                reason: format!("field '{}' is not available at this point", missing),
            });
        }

        let aggregates: Aggregates = aggregate_refs
            .into_iter()
            .map(|(func, field)| {
                let value = func.compute(data, &field);
                (Expr::Aggregate { func, field }.to_string(), value)
            })
            .collect();

        let target = compiled.target_field.as_str();
        let before = summarize(data, target);
        let reason = format!("{} {} = {}", compiled.kind, target, compiled.expression);
        let mut rows_matched = 0;
        let mut rows_affected = 0;

        for row in data.rows_mut().iter_mut() {
            let new_value = {
                let scope = Scope {
                    row: &*row,
                    aggregates: &aggregates,
                };
                if !compiled.condition.eval(&scope) {
                    continue;
                }
                if compiled.kind == RuleKind::Impute
                    && !row.get(target).is_none_or(Value::is_null)
                {
                    continue;
                }
                rows_matched += 1;
                compiled.expression.eval(&scope)
            };

            let current = row.get(target).cloned().unwrap_or_default();
            if current == new_value {
                continue;
            }
            row.insert(target.to_string(), new_value);
            if self.lineage_columns {
                row.insert(IMPUTED_FLAG.to_string(), Value::Bool(true));
                row.insert(MISSING_REASON.to_string(), Value::text(reason.clone()));
            }
            rows_affected += 1;
        }

        // The target exists for later rules even when every row evaluated to null.
        data.ensure_column(target);
        if rows_affected == 0 {
            return Ok(None);
        }
        if self.lineage_columns {
            data.ensure_column(IMPUTED_FLAG);
            data.ensure_column(MISSING_REASON);
        }

        Ok(Some(TransformAudit {
            rule_id: rule.id.clone(),
            kind: compiled.kind,
            target_field: target.to_string(),
            rows_matched,
            rows_affected,
            before,
            after: summarize(data, target),
            error: None,
        }))
    }
}

fn summarize(data: &Dataset, column: &str) -> ColumnSummary {
    let nulls = data.null_count(column);
    ColumnSummary {
        nulls,
        non_nulls: data.len() - nulls,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::rules::{Provenance, RuleDraft};
    use anyhow::Result;

    fn rule(id: &str, kind: RuleKind, condition: &str, target: &str, expr: &str) -> Result<Rule> {
        Ok(Rule::from_draft(
            id,
            &RuleDraft::new(kind, condition, target, expr),
            1.0,
            Provenance::Manual,
            1,
        )?)
    }

    fn orders() -> Dataset {
        let statuses = [
            Some("paid"),
            None,
            Some("paid"),
            None,
            Some("refunded"),
            Some("paid"),
            None,
            Some("paid"),
            Some("paid"),
            Some("paid"),
        ];
        Dataset::from_records(
            &["order_id", "status", "quantity", "unit_price"],
            statuses.iter().enumerate().map(|(i, s)| {
                vec![
                    Value::from(i as i64),
                    Value::from(*s),
                    Value::from(if i == 3 { None } else { Some((i % 3 + 1) as f64) }),
                    Value::from(2.5),
                ]
            }),
        )
    }

    #[test]
    fn test_impute_missing_status() -> Result<()> {
        let rules = vec![rule("R0001", RuleKind::Impute, "status IS NULL", "status", "'unknown'")?];
        let outcome = RuleExecutor::default().apply(&orders(), &rules);

        assert_eq!(outcome.audits.len(), 1);
        let audit = &outcome.audits[0];
        assert_eq!(audit.rows_affected, 3);
        assert_eq!(audit.before.nulls, 3);
        assert_eq!(audit.after.nulls, 0);
        assert_eq!(outcome.curated.null_count("status"), 0);
        Ok(())
    }

    #[test]
    fn test_impute_never_overwrites() -> Result<()> {
        let rules = vec![rule("R0001", RuleKind::Impute, "true", "status", "'unknown'")?];
        let input = orders();
        let outcome = RuleExecutor::default().apply(&input, &rules);
        for (before, after) in input.rows().iter().zip(outcome.curated.rows()) {
            if !before.get("status").is_none_or(Value::is_null) {
                assert_eq!(before.get("status"), after.get("status"));
            }
        }
        Ok(())
    }

    #[test]
    fn test_compute_sees_earlier_targets_and_propagates_nulls() -> Result<()> {
        let rules = vec![
            rule("R0001", RuleKind::Compute, "true", "total", "quantity * unit_price")?,
            rule("R0002", RuleKind::Compute, "true", "total_with_tax", "total * 1.2")?,
        ];
        let outcome = RuleExecutor::default().apply(&orders(), &rules);
        assert_eq!(outcome.audits.len(), 2);
        assert!(outcome.curated.value(3, "total").is_null());
        assert!(outcome.curated.value(3, "total_with_tax").is_null());
        assert_eq!(outcome.curated.value(0, "total"), &Value::Number(2.5));
        assert_eq!(outcome.audits[1].rows_affected, 9);
        Ok(())
    }

    #[test]
    fn test_forward_reference_is_an_error_not_a_crash() -> Result<()> {
        let rules = vec![
            rule("R0001", RuleKind::Compute, "true", "a", "later * 2")?,
            rule("R0002", RuleKind::Compute, "true", "later", "quantity")?,
        ];
        let outcome = RuleExecutor::default().apply(&orders(), &rules);
        assert_eq!(outcome.audits[0].rule_id, "R0001");
        assert!(outcome.audits[0].error.is_some());
        assert_eq!(outcome.audits[0].rows_affected, 0);
        assert!(!outcome.curated.has_column("a"));
        assert!(outcome.audits[1].error.is_none());
        Ok(())
    }

    #[test]
    fn test_all_null_compute_still_feeds_later_rules() -> Result<()> {
        let data = Dataset::from_records(&["quantity"], vec![vec![Value::Null], vec![Value::Null]]);
        let rules = vec![
            rule("R0001", RuleKind::Compute, "true", "total", "quantity * 2")?,
            rule("R0002", RuleKind::Compute, "true", "tax", "total * 0.2")?,
        ];
        let outcome = RuleExecutor::default().apply(&data, &rules);

        assert!(outcome.audits.is_empty());
        assert_eq!(outcome.curated.columns(), ["quantity", "total", "tax"]);
        assert!(outcome.curated.value(1, "tax").is_null());
        Ok(())
    }

    #[test]
    fn test_empty_dataset_keeps_rule_targets() -> Result<()> {
        let data = Dataset::from_records(&["quantity"], Vec::<Vec<Value>>::new());
        let rules = vec![
            rule("R0001", RuleKind::Compute, "true", "total", "quantity * 2")?,
            rule("R0002", RuleKind::Assign, "total > 10", "dq_flag", "'big'")?,
        ];
        let outcome = RuleExecutor::new(true).apply(&data, &rules);

        assert!(outcome.audits.iter().all(|a| a.error.is_none()));
        assert!(outcome.curated.has_column("total"));
        assert!(outcome.curated.has_column("dq_flag"));
        assert!(!outcome.curated.has_column(IMPUTED_FLAG));
        Ok(())
    }

    #[test]
    fn test_malformed_rule_is_skipped() -> Result<()> {
        let rules = vec![
            rule("R0001", RuleKind::Assign, "status ==", "flag", "'x'")?,
            rule("R0002", RuleKind::Assign, "status == 'refunded'", "flag", "'r'")?,
        ];
        let outcome = RuleExecutor::default().apply(&orders(), &rules);
        assert_eq!(outcome.audits.len(), 2);
        assert!(outcome.audits[0].error.is_some());
        assert_eq!(outcome.audits[1].rows_affected, 1);
        Ok(())
    }

    #[test]
    fn test_assign_with_mean_aggregate() -> Result<()> {
        let rules = vec![rule("R0001", RuleKind::Impute, "quantity IS NULL", "quantity", "mean(quantity)")?];
        let outcome = RuleExecutor::default().apply(&orders(), &rules);
        assert_eq!(outcome.audits[0].rows_affected, 1);
        assert!(outcome.curated.value(3, "quantity").as_number().is_some());
        Ok(())
    }

    #[test]
    fn test_apply_is_deterministic() -> Result<()> {
        let rules = vec![
            rule("R0001", RuleKind::Impute, "status IS NULL", "status", "'unknown'")?,
            rule("R0002", RuleKind::Compute, "true", "total", "quantity * unit_price")?,
            rule("R0003", RuleKind::Assign, "total > 5", "dq_flag", "'big'")?,
        ];
        let executor = RuleExecutor::default();
        let first = executor.apply(&orders(), &rules);
        let second = executor.apply(&orders(), &rules);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_lineage_columns() -> Result<()> {
        let rules = vec![rule("R0001", RuleKind::Impute, "status IS NULL", "status", "'unknown'")?];
        let outcome = RuleExecutor::new(true).apply(&orders(), &rules);
        assert!(outcome.curated.has_column(IMPUTED_FLAG));
        assert_eq!(outcome.curated.value(1, IMPUTED_FLAG), &Value::Bool(true));
        assert!(outcome.curated.value(0, IMPUTED_FLAG).is_null());
        assert_eq!(
            outcome.curated.value(1, MISSING_REASON),
            &Value::text("impute status = 'unknown'")
        );
        Ok(())
    }
}
