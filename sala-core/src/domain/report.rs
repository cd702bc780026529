// sala-core/src/domain/report.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::compliance::{DriftReport, OutlierReport};
use crate::domain::governance::Suggestion;
use crate::domain::rules::RuleKind;

/// Null / non-null counts of the target column around one rule firing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub nulls: usize,
    pub non_nulls: usize,
}

/// What one rule did during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAudit {
    pub rule_id: String,
    pub kind: RuleKind,
    pub target_field: String,
    /// Rows where the condition held.
    pub rows_matched: usize,
    /// Rows whose value actually changed.
    pub rows_affected: usize,
    pub before: ColumnSummary,
    pub after: ColumnSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub code: String,
    pub message: String,
}

impl RunWarning {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Immutable record of one run. Written once under `run_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub dataset: String,
    pub source: String,
    pub row_count: usize,
    /// Active rule-set version the run executed.
    pub rule_set_version: u64,
    /// New snapshot written by this run, if any suggestion was auto-accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_rule_set_version: Option<u64>,
    pub baseline_present: bool,
    #[serde(default)]
    pub audits: Vec<TransformAudit>,
    #[serde(default)]
    pub outliers: Vec<OutlierReport>,
    #[serde(default)]
    pub drift: Vec<DriftReport>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.suggestions {
            *counts.entry(s.status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// One line of the synthesis trace log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightEntry {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub synthesizer: String,
    pub row_count: usize,
    pub candidates: usize,
    pub statuses: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// `run_20261019T101500Z_1a2b3c4d`: sortable by time, unique across concurrent runs.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", now.format("%Y%m%dT%H%M%SZ"), &suffix[..8])
}
