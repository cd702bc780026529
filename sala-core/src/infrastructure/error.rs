// sala-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(sala::infra::database::duckdb),
        help("An error occurred inside the SQL engine.")
    )]
    DuckDB(#[from] duckdb::Error),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(sala::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    #[error("File already exists: {0}")]
    #[diagnostic(
        code(sala::infra::already_exists),
        help("History files and run reports are write-once.")
    )]
    AlreadyExists(String),

    // --- STATE FILES (JSON) ---
    #[error("JSON Error: {0}")]
    #[diagnostic(
        code(sala::infra::json),
        help("A state file under the state or meta path is corrupted.")
    )]
    Json(#[from] serde_json::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(sala::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(sala::infra::config))]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(sala::infra::validation),
        help("A threshold or window in sala.yaml is out of range.")
    )]
    Validation(#[from] validator::ValidationErrors),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(sala::infra::config_missing), help("Run `sala init` to create one."))]
    ConfigNotFound(String),

    // --- TEMPLATING ---
    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(sala::infra::template),
        help("Check the Jinja syntax of the prompt template.")
    )]
    TemplateError(#[from] minijinja::Error),
}

// Manual implementation for shortcuts (e.g. `?` operator on duckdb calls)
impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}

impl From<InfrastructureError> for crate::domain::error::DomainError {
    fn from(err: InfrastructureError) -> Self {
        crate::domain::error::DomainError::Persistence(err.to_string())
    }
}
