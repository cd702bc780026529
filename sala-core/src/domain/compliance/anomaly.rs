// sala-core/src/domain/compliance/anomaly.rs

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::compliance::config::MonitoringConfig;
use crate::domain::dataset::Dataset;
use crate::domain::numeric::{finite, quantile};

/// Why a column got no outlier analysis. Degenerate input is reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    TooFewSamples,
    ZeroVariance,
    MissingColumn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub column: String,
    pub method: String,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub outlier_count: usize,
    pub below_count: usize,
    pub above_count: usize,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degenerate: Option<DegenerateReason>,
}

impl OutlierReport {
    fn degenerate(column: &str, total_count: usize, reason: DegenerateReason) -> Self {
        Self {
            column: column.to_string(),
            method: "IQR".to_string(),
            q1: None,
            q3: None,
            lower_bound: None,
            upper_bound: None,
            outlier_count: 0,
            below_count: 0,
            above_count: 0,
            total_count,
            degenerate: Some(reason),
        }
    }
}

/// Tukey fences over each numeric measure.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    pub multiplier: f64,
    pub min_samples: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            multiplier: 1.5,
            min_samples: 4,
        }
    }
}

impl AnomalyDetector {
    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self {
            multiplier: config.iqr_multiplier,
            min_samples: config.min_samples,
        }
    }

    /// One report per measure, in the order given. Columns are independent,
    /// so they are computed in parallel; the ordered collect keeps results stable.
    pub fn detect(&self, dataset: &Dataset, measures: &[String]) -> Vec<OutlierReport> {
        measures
            .par_iter()
            .map(|column| self.detect_column(dataset, column))
            .collect()
    }

    pub fn detect_column(&self, dataset: &Dataset, column: &str) -> OutlierReport {
        if !dataset.has_column(column) {
            return OutlierReport::degenerate(column, 0, DegenerateReason::MissingColumn);
        }

        let mut values = dataset.numeric_values(column);
        let total = values.len();
        if total < self.min_samples {
            return OutlierReport::degenerate(column, total, DegenerateReason::TooFewSamples);
        }

        values.sort_by(f64::total_cmp);
        let (min, max) = (values[0], values[total - 1]);
        if min == max {
            return OutlierReport::degenerate(column, total, DegenerateReason::ZeroVariance);
        }

        let (Some(q1), Some(q3)) = (quantile(&values, 0.25), quantile(&values, 0.75)) else {
            return OutlierReport::degenerate(column, total, DegenerateReason::TooFewSamples);
        };
        let iqr = q3 - q1;
        let lower = q1 - self.multiplier * iqr;
        let upper = q3 + self.multiplier * iqr;

        let below_count = values.iter().filter(|v| **v < lower).count();
        let above_count = values.iter().filter(|v| **v > upper).count();

        OutlierReport {
            column: column.to_string(),
            method: "IQR".to_string(),
            q1: finite(q1),
            q3: finite(q3),
            lower_bound: finite(lower),
            upper_bound: finite(upper),
            outlier_count: below_count + above_count,
            below_count,
            above_count,
            total_count: total,
            degenerate: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;

    fn dataset(column: &str, values: &[f64]) -> Dataset {
        Dataset::from_records(&[column], values.iter().map(|v| vec![Value::from(*v)]))
    }

    #[test]
    fn test_single_spike_is_the_only_outlier() {
        let ds = dataset("quantity", &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 50.0]);
        let report = AnomalyDetector::default().detect_column(&ds, "quantity");
        assert_eq!(report.outlier_count, 1);
        assert_eq!(report.above_count, 1);
        assert_eq!(report.total_count, 10);
        assert_eq!(report.upper_bound, Some(1.0));
        assert!(report.degenerate.is_none());
    }

    #[test]
    fn test_too_few_samples_is_flagged() {
        let ds = dataset("x", &[1.0, 100.0, 3.0]);
        let report = AnomalyDetector::default().detect_column(&ds, "x");
        assert_eq!(report.outlier_count, 0);
        assert_eq!(report.degenerate, Some(DegenerateReason::TooFewSamples));
    }

    #[test]
    fn test_zero_variance_is_flagged() {
        let ds = dataset("x", &[7.0; 12]);
        let report = AnomalyDetector::default().detect_column(&ds, "x");
        assert_eq!(report.outlier_count, 0);
        assert_eq!(report.total_count, 12);
        assert_eq!(report.degenerate, Some(DegenerateReason::ZeroVariance));
    }

    #[test]
    fn test_missing_column_does_not_crash() {
        let ds = dataset("x", &[1.0]);
        let reports = AnomalyDetector::default().detect(&ds, &["nope".to_string()]);
        assert_eq!(reports[0].degenerate, Some(DegenerateReason::MissingColumn));
    }

    #[test]
    fn test_outlier_count_never_exceeds_total() {
        let samples: [&[f64]; 4] = [
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            &[-1000.0, 0.0, 0.0, 0.0, 0.0, 1000.0],
            &[1.0, 1.0, 2.0, 2.0],
            &[0.1, 0.2, 0.3, 1e9, -1e9, 0.15, 0.25],
        ];
        for values in samples {
            let ds = dataset("v", values);
            let report = AnomalyDetector::default().detect_column(&ds, "v");
            assert!(report.outlier_count <= report.total_count);
        }
    }

    #[test]
    fn test_column_order_independence() {
        let ds = Dataset::from_records(
            &["a", "b"],
            (0..20).map(|i| vec![Value::from(i as f64), Value::from((i * i) as f64)]),
        );
        let detector = AnomalyDetector::default();
        let forward = detector.detect(&ds, &["a".to_string(), "b".to_string()]);
        let backward = detector.detect(&ds, &["b".to_string(), "a".to_string()]);
        assert_eq!(forward[0], backward[1]);
        assert_eq!(forward[1], backward[0]);
    }
}
