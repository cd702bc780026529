// sala-core/src/domain/dataset.rs

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::numeric::{finite, format_number};

/// A single cell. Numbers are always finite: non-finite input collapses to `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

static NULL: Value = Value::Null;

impl Value {
    pub fn number(value: f64) -> Self {
        finite(value).map_or(Value::Null, Value::Number)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. Text that parses as a finite number counts as numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().and_then(finite),
            Value::Bool(_) | Value::Null => None,
        }
    }

    /// Key used when counting categories. `None` for nulls.
    pub fn category_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match finite(*n) {
                Some(n) => serializer.serialize_f64(n),
                None => serializer.serialize_none(),
            },
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bool(bool),
            Number(f64),
            Text(String),
        }

        Ok(match Option::<Repr>::deserialize(deserializer)? {
            None => Value::Null,
            Some(Repr::Bool(b)) => Value::Bool(b),
            Some(Repr::Number(n)) => Value::number(n),
            Some(Repr::Text(s)) => Value::Text(s),
        })
    }
}

pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Empty,
}

/// Tabular data in column order. Cells absent from a row read as `Null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a dataset from positional records. Short records are padded with nulls.
    pub fn from_records<C, R>(columns: &[C], records: R) -> Self
    where
        C: AsRef<str>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = records
            .into_iter()
            .map(|record| {
                let mut values = record.into_iter();
                columns
                    .iter()
                    .map(|c| (c.clone(), values.next().unwrap_or_default()))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Appends the column if missing. Returns true when it was added.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.has_column(name) {
            return false;
        }
        self.columns.push(name.to_string());
        true
    }

    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |r| r.get(column).unwrap_or(&NULL))
    }

    pub fn null_count(&self, column: &str) -> usize {
        self.column_values(column).filter(|v| v.is_null()).count()
    }

    pub fn numeric_values(&self, column: &str) -> Vec<f64> {
        self.column_values(column)
            .filter_map(Value::as_number)
            .collect()
    }

    pub fn column_kind(&self, column: &str) -> ColumnKind {
        let mut seen = false;
        for value in self.column_values(column) {
            match value {
                Value::Null => continue,
                Value::Number(_) => seen = true,
                _ => return ColumnKind::Categorical,
            }
        }
        if seen {
            ColumnKind::Numeric
        } else {
            ColumnKind::Empty
        }
    }
}
