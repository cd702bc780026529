// sala-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use duckdb::{Config, Connection, params_from_iter};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

// Imports Hexagonaux
use crate::domain::dataset::{Dataset, Row, Value};
use crate::error::SalaError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::connector::{ColumnSchema, Connector};

const EXPORT_TABLE: &str = "sala_export";

pub struct DuckDBConnector {
    conn: Arc<Mutex<Connection>>,
    /// Text columns coerced to numbers on fetch.
    numeric_columns: BTreeSet<String>,
}

impl DuckDBConnector {
    pub fn new(db_path: &str) -> Result<Self, InfrastructureError> {
        let config = Config::default();

        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            numeric_columns: BTreeSet::new(),
        })
    }

    pub fn with_numeric_columns(mut self, columns: &[String]) -> Self {
        self.numeric_columns = columns.iter().cloned().collect();
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SalaError> {
        self.conn.lock().map_err(|_| {
            SalaError::Infrastructure(InfrastructureError::Io(std::io::Error::other(
                "DuckDB Mutex Poisoned",
            )))
        })
    }
}

fn db_err(e: duckdb::Error) -> SalaError {
    SalaError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(e)))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn is_numeric_type(data_type: &str) -> bool {
    let upper = data_type.to_uppercase();
    [
        "TINYINT", "SMALLINT", "INTEGER", "BIGINT", "HUGEINT", "UTINYINT", "USMALLINT",
        "UINTEGER", "UBIGINT", "UHUGEINT", "FLOAT", "REAL", "DOUBLE", "DECIMAL", "NUMERIC",
    ]
    .iter()
    .any(|t| upper.starts_with(t))
}

/// Parses `1 234,50` / `1234.5` style text. Unparsable input becomes `Null`.
pub fn coerce_number(raw: &str) -> Value {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = if compact.contains(',') && !compact.contains('.') {
        compact.replace(',', ".")
    } else {
        compact.replace(',', "")
    };
    normalized
        .parse::<f64>()
        .ok()
        .map_or(Value::Null, Value::number)
}

fn typed_value(raw: Option<String>, schema: &ColumnSchema, coerce: bool) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    if coerce || is_numeric_type(&schema.data_type) {
        coerce_number(&raw)
    } else if schema.data_type.eq_ignore_ascii_case("BOOLEAN") {
        Value::Bool(raw.eq_ignore_ascii_case("true"))
    } else {
        Value::Text(raw)
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Connector for DuckDBConnector {
    async fn execute(&self, query: &str) -> Result<(), SalaError> {
        let conn = self.lock()?;
        conn.execute_batch(query).map_err(db_err)
    }

    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<ColumnSchema>, SalaError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote_literal(table_name)))
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ColumnSchema {
                    name: row.get("name")?,
                    data_type: row.get("type")?,
                    is_nullable: !row.get::<_, bool>("notnull")?,
                })
            })
            .map_err(db_err)?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.map_err(db_err)?);
        }

        Ok(columns)
    }

    async fn register_source(&self, name: &str, path: &str) -> Result<(), SalaError> {
        let query = format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_csv_auto({}, header = true)",
            quote_ident(name),
            quote_literal(path)
        );
        self.execute(&query).await
    }

    #[instrument(skip(self))]
    async fn fetch_dataset(&self, table_name: &str) -> Result<Dataset, SalaError> {
        let schema = self.fetch_columns(table_name).await?;
        if schema.is_empty() {
            return Err(SalaError::UnreadableDataset(format!(
                "{} has no columns",
                table_name
            )));
        }

        let select = schema
            .iter()
            .map(|c| format!("CAST({} AS VARCHAR)", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("SELECT {} FROM {}", select, quote_ident(table_name));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query).map_err(db_err)?;
        let width = schema.len();
        let raw_rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(db_err)?;

        let mut dataset = Dataset::new(schema.iter().map(|c| c.name.clone()).collect());
        for raw in raw_rows {
            let raw = raw.map_err(db_err)?;
            let row: Row = schema
                .iter()
                .zip(raw)
                .map(|(col, cell)| {
                    let coerce = self.numeric_columns.contains(&col.name);
                    (col.name.clone(), typed_value(cell, col, coerce))
                })
                .collect();
            dataset.push_row(row);
        }
        debug!(rows = dataset.len(), "Fetched dataset");
        Ok(dataset)
    }

    #[instrument(skip(self, dataset), fields(rows = dataset.len()))]
    async fn export_csv(&self, dataset: &Dataset, path: &str) -> Result<(), SalaError> {
        let columns = dataset.columns();
        let ddl = columns
            .iter()
            .map(|c| format!("{} VARCHAR", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");

        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "CREATE OR REPLACE TEMP TABLE {} ({})",
            EXPORT_TABLE, ddl
        ))
        .map_err(db_err)?;

        {
            let mut insert = conn
                .prepare(&format!("INSERT INTO {} VALUES ({})", EXPORT_TABLE, placeholders))
                .map_err(db_err)?;
            for row in dataset.rows() {
                let cells = columns
                    .iter()
                    .map(|c| row.get(c).and_then(cell_text));
                insert.execute(params_from_iter(cells)).map_err(db_err)?;
            }
        }

        conn.execute_batch(&format!(
            "COPY {} TO {} (HEADER, DELIMITER ','); DROP TABLE {};",
            EXPORT_TABLE,
            quote_literal(path),
            EXPORT_TABLE
        ))
        .map_err(db_err)
    }

    fn engine_name(&self) -> &str {
        "duckdb"
    }
}
