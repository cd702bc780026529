// sala-core/src/domain/compliance/profile.rs

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::dataset::{ColumnKind, Dataset, Value};
use crate::domain::numeric;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    /// Non-null cells.
    pub count: usize,
    pub null_count: usize,
    pub null_pct: f64,
    pub distinct: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub negative_count: usize,
    /// Only filled for categorical columns.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn of(dataset: &Dataset) -> Self {
        let columns = dataset
            .columns()
            .par_iter()
            .map(|c| ColumnProfile::of(dataset, c))
            .collect();
        Self {
            row_count: dataset.len(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl ColumnProfile {
    pub fn of(dataset: &Dataset, column: &str) -> Self {
        let kind = dataset.column_kind(column);
        let mut null_count = 0;
        let mut distinct = BTreeSet::new();
        let mut category_counts = BTreeMap::new();
        for value in dataset.column_values(column) {
            let Some(key) = value.category_key() else {
                null_count += 1;
                continue;
            };
            if kind == ColumnKind::Categorical {
                *category_counts.entry(key.clone()).or_insert(0) += 1;
            }
            distinct.insert(key);
        }

        let numbers: Vec<f64> = dataset
            .column_values(column)
            .filter_map(|v| match v {
                Value::Number(n) => Some(*n),
                _ => None,
            })
            .collect();
        let total = dataset.len();

        Self {
            name: column.to_string(),
            kind,
            count: total - null_count,
            null_count,
            null_pct: if total == 0 {
                0.0
            } else {
                null_count as f64 / total as f64
            },
            distinct: distinct.len(),
            mean: numeric::mean(&numbers),
            min: numbers.iter().copied().reduce(f64::min),
            max: numbers.iter().copied().reduce(f64::max),
            negative_count: numbers.iter().filter(|n| **n < 0.0).count(),
            category_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_counts() -> anyhow::Result<()> {
        let ds = Dataset::from_records(
            &["amount", "currency"],
            vec![
                vec![Value::from(-2.0), Value::from("USD")],
                vec![Value::from(4.0), Value::Null],
                vec![Value::Null, Value::from("USD")],
            ],
        );
        let profile = DatasetProfile::of(&ds);
        assert_eq!(profile.row_count, 3);
        assert_eq!(profile.columns[0].name, "amount");

        let amount = profile
            .column("amount")
            .ok_or_else(|| anyhow::anyhow!("amount not profiled"))?;
        assert_eq!(amount.negative_count, 1);
        assert_eq!(amount.mean, Some(1.0));
        assert_eq!(amount.null_count, 1);

        let currency = profile
            .column("currency")
            .ok_or_else(|| anyhow::anyhow!("currency not profiled"))?;
        assert_eq!(currency.category_counts.get("USD"), Some(&2));
        assert_eq!(currency.distinct, 1);
        assert!((currency.null_pct - 1.0 / 3.0).abs() < 1e-12);
        Ok(())
    }
}
