// sala-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SalaError {
    // --- ERREURS DU DOMAINE (Règles, Gouvernance, Conflits) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, DuckDB, YAML) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- ERREURS APPLICATIVES ---
    #[error("Internal Error: {0}")]
    #[diagnostic(code(sala::internal))]
    InternalError(String),

    #[error("Unsafe path traversal detected: {0}")]
    #[diagnostic(code(sala::unsafe_path))]
    UnsafePath(String),

    #[error("Run {run_id} aborted before commit: {reason}")]
    #[diagnostic(
        code(sala::run_incomplete),
        help("Nothing from this run was persisted. Re-run once concurrent runs have finished.")
    )]
    RunIncomplete { run_id: String, reason: String },

    #[error("Dataset cannot be read: {0}")]
    #[diagnostic(
        code(sala::unreadable_dataset),
        help("Check that the file exists and is a CSV with a header row.")
    )]
    UnreadableDataset(String),
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for SalaError {
    fn from(err: std::io::Error) -> Self {
        SalaError::Infrastructure(InfrastructureError::Io(err))
    }
}
