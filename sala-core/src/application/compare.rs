// sala-core/src/application/compare.rs

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::report::RunReport;

/// Headline numbers of one run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub run_id: String,
    pub row_count: usize,
    pub rule_set_version: u64,
    /// rows affected, per rule kind
    pub affected_by_kind: BTreeMap<String, usize>,
    pub rules_with_errors: usize,
    pub outlier_total: usize,
    /// column -> relative mean shift (or PSI for categorical columns)
    pub drift: BTreeMap<String, Option<f64>>,
    pub drift_exceeded: usize,
    pub suggestion_statuses: BTreeMap<String, usize>,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub kind: String,
    pub target_field: String,
    pub run_a: usize,
    pub run_b: usize,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportComparison {
    pub a: ReportSummary,
    pub b: ReportSummary,
    pub rows: Vec<ComparisonRow>,
}

pub fn summarize(report: &RunReport) -> ReportSummary {
    let mut affected_by_kind = BTreeMap::new();
    for audit in &report.audits {
        *affected_by_kind
            .entry(audit.kind.to_string())
            .or_insert(0) += audit.rows_affected;
    }
    ReportSummary {
        run_id: report.run_id.clone(),
        row_count: report.row_count,
        rule_set_version: report.rule_set_version,
        affected_by_kind,
        rules_with_errors: report.audits.iter().filter(|a| a.error.is_some()).count(),
        outlier_total: report.outliers.iter().map(|o| o.outlier_count).sum(),
        drift: report
            .drift
            .iter()
            .map(|d| (d.column.clone(), d.mean_delta.or(d.distribution_delta)))
            .collect(),
        drift_exceeded: report.drift.iter().filter(|d| d.exceeded_tolerance).count(),
        suggestion_statuses: report.status_counts(),
        warnings: report.warnings.len(),
    }
}

fn affected_by_target(report: &RunReport) -> BTreeMap<(String, String), usize> {
    let mut totals = BTreeMap::new();
    for audit in &report.audits {
        *totals
            .entry((audit.kind.to_string(), audit.target_field.clone()))
            .or_insert(0) += audit.rows_affected;
    }
    totals
}

/// One row per `(kind, target_field)` touched in either run, sorted by kind then field.
pub fn compare_reports(a: &RunReport, b: &RunReport) -> ReportComparison {
    let totals_a = affected_by_target(a);
    let totals_b = affected_by_target(b);
    let keys: BTreeSet<&(String, String)> = totals_a.keys().chain(totals_b.keys()).collect();

    let rows = keys
        .into_iter()
        .map(|key| {
            let run_a = totals_a.get(key).copied().unwrap_or(0);
            let run_b = totals_b.get(key).copied().unwrap_or(0);
            ComparisonRow {
                kind: key.0.clone(),
                target_field: key.1.clone(),
                run_a,
                run_b,
                delta: run_b as i64 - run_a as i64,
            }
        })
        .collect();

    ReportComparison {
        a: summarize(a),
        b: summarize(b),
        rows,
    }
}
