// sala-core/src/domain/compliance/config.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::dataset::{ColumnKind, Dataset};

/// Statistical monitoring knobs (`monitoring:` section of sala.yaml).
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct MonitoringConfig {
    /// Numeric columns measured for outliers and mean drift. Empty = every numeric column.
    #[serde(default)]
    pub measures: Vec<String>,

    /// Columns measured for distribution drift. Empty = auto-detect.
    #[serde(default)]
    pub categorical: Vec<String>,

    #[serde(default = "default_iqr_multiplier")]
    #[validate(range(min = 0.0, message = "iqr_multiplier must be positive"))]
    pub iqr_multiplier: f64,

    #[serde(default = "default_min_samples")]
    #[validate(range(min = 2, message = "at least 2 samples are needed for quartiles"))]
    pub min_samples: usize,

    #[serde(default = "default_tolerance")]
    #[validate(range(min = 0.0))]
    pub mean_tolerance: f64,

    #[serde(default = "default_tolerance")]
    #[validate(range(min = 0.0))]
    pub psi_tolerance: f64,

    #[serde(default = "default_psi_floor")]
    #[validate(range(min = 1e-12, max = 0.5))]
    pub psi_floor: f64,

    #[serde(default = "default_max_categories")]
    #[validate(range(min = 1))]
    pub max_categories: usize,
}

fn default_iqr_multiplier() -> f64 {
    1.5
}
fn default_min_samples() -> usize {
    4
}
fn default_tolerance() -> f64 {
    0.2
}
fn default_psi_floor() -> f64 {
    1e-4
}
fn default_max_categories() -> usize {
    50
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            measures: Vec::new(),
            categorical: Vec::new(),
            iqr_multiplier: default_iqr_multiplier(),
            min_samples: default_min_samples(),
            mean_tolerance: default_tolerance(),
            psi_tolerance: default_tolerance(),
            psi_floor: default_psi_floor(),
            max_categories: default_max_categories(),
        }
    }
}

/// The concrete columns a run monitors, resolved against the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoredColumns {
    pub measures: Vec<String>,
    pub categorical: Vec<String>,
}

impl MonitoringConfig {
    pub fn resolve(&self, dataset: &Dataset) -> MonitoredColumns {
        let measures = if self.measures.is_empty() {
            dataset
                .columns()
                .iter()
                .filter(|c| dataset.column_kind(c) == ColumnKind::Numeric)
                .cloned()
                .collect()
        } else {
            self.measures.clone()
        };

        let categorical = if self.categorical.is_empty() {
            dataset
                .columns()
                .iter()
                .filter(|c| !measures.contains(c) && self.looks_categorical(dataset, c))
                .cloned()
                .collect()
        } else {
            self.categorical.clone()
        };

        MonitoredColumns {
            measures,
            categorical,
        }
    }

    // Text column whose values repeat: few distinct values, each seen at least twice on average.
    fn looks_categorical(&self, dataset: &Dataset, column: &str) -> bool {
        if dataset.column_kind(column) != ColumnKind::Categorical {
            return false;
        }
        let mut distinct = std::collections::BTreeSet::new();
        let mut present = 0usize;
        for key in dataset.column_values(column).filter_map(|v| v.category_key()) {
            present += 1;
            distinct.insert(key);
        }
        !distinct.is_empty() && distinct.len() <= self.max_categories && distinct.len() * 2 <= present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;

    #[test]
    fn test_auto_resolution() {
        let ds = Dataset::from_records(
            &["amount", "currency", "email"],
            vec![
                vec![Value::from(1.0), Value::from("USD"), Value::from("a@x")],
                vec![Value::from(2.0), Value::from("USD"), Value::from("b@x")],
                vec![Value::from(3.0), Value::from("EUR"), Value::from("c@x")],
                vec![Value::from(4.0), Value::from("EUR"), Value::from("d@x")],
            ],
        );
        let cols = MonitoringConfig::default().resolve(&ds);
        assert_eq!(cols.measures, vec!["amount".to_string()]);
        assert_eq!(cols.categorical, vec!["currency".to_string()]);
    }

    #[test]
    fn test_explicit_columns_win() {
        let ds = Dataset::new(vec!["a".into()]);
        let config = MonitoringConfig {
            measures: vec!["missing".into()],
            ..MonitoringConfig::default()
        };
        assert_eq!(config.resolve(&ds).measures, vec!["missing".to_string()]);
    }

    #[test]
    fn test_validation_rejects_bad_floor() {
        let config = MonitoringConfig {
            psi_floor: 0.0,
            ..MonitoringConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
