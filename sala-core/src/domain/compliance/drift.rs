// sala-core/src/domain/compliance/drift.rs

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::compliance::config::{MonitoredColumns, MonitoringConfig};
use crate::domain::dataset::{ColumnKind, Dataset};
use crate::domain::numeric::{self, finite, finite_opt};

const EPSILON: f64 = 1e-9;

/// Rolling reference statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBaseline {
    pub kind: ColumnKind,
    pub mean: Option<f64>,
    /// category -> relative frequency (categorical columns only)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub distribution: BTreeMap<String, f64>,
    pub sample_count: u64,
    pub window_size: usize,
}

/// Baseline for one dataset identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub runs: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnBaseline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub column: String,
    pub kind: ColumnKind,
    pub baseline_mean: Option<f64>,
    pub current_mean: Option<f64>,
    pub mean_delta: Option<f64>,
    /// Population stability index against the baseline distribution.
    pub distribution_delta: Option<f64>,
    pub exceeded_tolerance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DriftReport {
    fn skipped(column: &str, kind: ColumnKind, note: &str) -> Self {
        Self {
            column: column.to_string(),
            kind,
            baseline_mean: None,
            current_mean: None,
            mean_delta: None,
            distribution_delta: None,
            exceeded_tolerance: false,
            note: Some(note.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriftMonitor {
    pub mean_tolerance: f64,
    pub psi_tolerance: f64,
    pub psi_floor: f64,
    /// Columns with fewer current values than this report no drift.
    pub min_samples: usize,
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self::from_config(&MonitoringConfig::default())
    }
}

impl DriftMonitor {
    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self {
            mean_tolerance: config.mean_tolerance,
            psi_tolerance: config.psi_tolerance,
            psi_floor: config.psi_floor,
            min_samples: config.min_samples,
        }
    }

    /// Current-run statistics for the monitored columns.
    pub fn observe(
        dataset: &Dataset,
        columns: &MonitoredColumns,
        window_size: usize,
    ) -> BTreeMap<String, ColumnBaseline> {
        let numeric = columns.measures.par_iter().map(|c| {
            let values = dataset.numeric_values(c);
            (
                c.clone(),
                ColumnBaseline {
                    kind: ColumnKind::Numeric,
                    mean: numeric::mean(&values),
                    distribution: BTreeMap::new(),
                    sample_count: values.len() as u64,
                    window_size,
                },
            )
        });
        let categorical = columns.categorical.par_iter().map(|c| {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for key in dataset.column_values(c).filter_map(|v| v.category_key()) {
                *counts.entry(key).or_insert(0) += 1;
            }
            let total: u64 = counts.values().sum();
            let distribution = counts
                .into_iter()
                .map(|(k, n)| (k, n as f64 / total as f64))
                .collect();
            (
                c.clone(),
                ColumnBaseline {
                    kind: ColumnKind::Categorical,
                    mean: None,
                    distribution,
                    sample_count: total,
                    window_size,
                },
            )
        });
        numeric.chain(categorical).collect::<Vec<_>>().into_iter().collect()
    }

    /// Drift of the current dataset against the pre-run baseline.
    /// No baseline (first run for this dataset) means no drift is computable.
    /// Columns below `min_samples` are reported as skipped, never as drifting.
    pub fn measure(
        &self,
        dataset: &Dataset,
        columns: &MonitoredColumns,
        baseline: Option<&Baseline>,
    ) -> Vec<DriftReport> {
        let Some(baseline) = baseline else {
            return Vec::new();
        };
        let current = Self::observe(dataset, columns, 1);
        let too_few = |c: &str| {
            current
                .get(c)
                .is_none_or(|s| (s.sample_count as usize) < self.min_samples.max(1))
        };

        let numeric = columns.measures.iter().map(|c| {
            let Some(base) = baseline.columns.get(c) else {
                return DriftReport::skipped(c, ColumnKind::Numeric, "no baseline for column");
            };
            if too_few(c.as_str()) {
                return DriftReport::skipped(c, ColumnKind::Numeric, "too few samples");
            }
            let cur_mean = current.get(c).and_then(|s| s.mean);
            match (base.mean, cur_mean) {
                (Some(b), Some(m)) => {
                    let delta = finite((m - b).abs() / b.abs().max(EPSILON));
                    DriftReport {
                        column: c.clone(),
                        kind: ColumnKind::Numeric,
                        baseline_mean: finite(b),
                        current_mean: finite(m),
                        mean_delta: delta,
                        distribution_delta: None,
                        exceeded_tolerance: delta.is_some_and(|d| d > self.mean_tolerance),
                        note: None,
                    }
                }
                _ => DriftReport::skipped(c, ColumnKind::Numeric, "no numeric values to compare"),
            }
        });

        let categorical = columns.categorical.iter().map(|c| {
            let Some(base) = baseline.columns.get(c) else {
                return DriftReport::skipped(c, ColumnKind::Categorical, "no baseline for column");
            };
            if too_few(c.as_str()) {
                return DriftReport::skipped(c, ColumnKind::Categorical, "too few samples");
            }
            let cur = current.get(c).map(|s| &s.distribution);
            match cur {
                Some(cur) if !cur.is_empty() && !base.distribution.is_empty() => {
                    let psi = finite(self.psi(cur, &base.distribution));
                    DriftReport {
                        column: c.clone(),
                        kind: ColumnKind::Categorical,
                        baseline_mean: None,
                        current_mean: None,
                        mean_delta: None,
                        distribution_delta: psi,
                        exceeded_tolerance: psi.is_some_and(|d| d > self.psi_tolerance),
                        note: None,
                    }
                }
                _ => DriftReport::skipped(c, ColumnKind::Categorical, "empty distribution"),
            }
        });

        numeric.chain(categorical).collect()
    }

    /// `Σ (p − q) · ln(p / q)` over the union of categories, absent categories floored.
    pub fn psi(&self, current: &BTreeMap<String, f64>, baseline: &BTreeMap<String, f64>) -> f64 {
        let keys: BTreeSet<&String> = current.keys().chain(baseline.keys()).collect();
        keys.into_iter()
            .map(|k| {
                let p = current.get(k).copied().unwrap_or(0.0).max(self.psi_floor);
                let q = baseline.get(k).copied().unwrap_or(0.0).max(self.psi_floor);
                (p - q) * (p / q).ln()
            })
            .sum()
    }

    /// Blends the current run into the prior baseline with weight `1 / window_size`.
    /// The first baseline for a dataset is the current statistics verbatim.
    pub fn update(
        prior: Option<&Baseline>,
        dataset: &Dataset,
        columns: &MonitoredColumns,
        window_size: usize,
    ) -> Baseline {
        let window_size = window_size.max(1);
        let current = Self::observe(dataset, columns, window_size);
        let Some(prior) = prior else {
            return Baseline {
                runs: 1,
                updated_at: Utc::now(),
                columns: current,
            };
        };

        let alpha = 1.0 / window_size as f64;
        let mut merged = prior.columns.clone();
        for (name, cur) in current {
            let blended = match prior.columns.get(&name) {
                Some(old) => blend(old, &cur, alpha, window_size),
                None => cur,
            };
            merged.insert(name, blended);
        }

        Baseline {
            runs: prior.runs + 1,
            updated_at: Utc::now(),
            columns: merged,
        }
    }
}

fn blend(old: &ColumnBaseline, cur: &ColumnBaseline, alpha: f64, window_size: usize) -> ColumnBaseline {
    let mean = match (old.mean, cur.mean) {
        (Some(o), Some(c)) => finite((1.0 - alpha) * o + alpha * c),
        (o, c) => finite_opt(c.or(o)),
    };

    let distribution = if cur.distribution.is_empty() {
        old.distribution.clone()
    } else {
        let keys: BTreeSet<&String> = old.distribution.keys().chain(cur.distribution.keys()).collect();
        keys.into_iter()
            .filter_map(|k| {
                let o = old.distribution.get(k).copied().unwrap_or(0.0);
                let c = cur.distribution.get(k).copied().unwrap_or(0.0);
                finite((1.0 - alpha) * o + alpha * c).map(|f| (k.clone(), f))
            })
            .collect()
    };

    ColumnBaseline {
        kind: cur.kind,
        mean,
        distribution,
        sample_count: old.sample_count + cur.sample_count,
        window_size,
    }
}
