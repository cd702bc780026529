// sala-core/src/ports/connector.rs

// What the core needs from a tabular engine, without knowing which one.
// The run only ever sees a `Dataset`; SQL stays behind this trait.

use crate::domain::dataset::Dataset;
use crate::error::SalaError;
use async_trait::async_trait;

// Struct simple pour décrire une colonne (indépendant de la DB)
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(&self, query: &str) -> Result<(), SalaError>;

    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<ColumnSchema>, SalaError>;

    // Abstraction de l'enregistrement de source (ex: read_csv_auto)
    async fn register_source(&self, name: &str, path: &str) -> Result<(), SalaError>;

    /// Reads a registered source into memory, typed by its column schema.
    async fn fetch_dataset(&self, table_name: &str) -> Result<Dataset, SalaError>;

    /// Writes `dataset` to `path` as CSV with a header row.
    async fn export_csv(&self, dataset: &Dataset, path: &str) -> Result<(), SalaError>;

    fn engine_name(&self) -> &str;
}
