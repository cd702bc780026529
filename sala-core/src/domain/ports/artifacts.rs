// sala-core/src/domain/ports/artifacts.rs

use std::collections::BTreeMap;

use crate::domain::error::DomainError;
use crate::domain::governance::Suggestion;
use crate::domain::report::{InsightEntry, RunReport};

/// Run outputs. Reports are write-once, insights append-only, and the
/// pending suggestion batch is the only overwritable document.
pub trait ArtifactStore: Send + Sync {
    fn write_report(&self, report: &RunReport) -> Result<(), DomainError>;

    /// Accepts a run id with or without the `.json` extension.
    fn load_report(&self, name: &str) -> Result<RunReport, DomainError>;

    /// Report names, oldest first.
    fn list_reports(&self) -> Result<Vec<String>, DomainError>;

    fn append_insight(&self, entry: &InsightEntry) -> Result<(), DomainError>;

    fn load_pending(&self) -> Result<BTreeMap<String, Suggestion>, DomainError>;

    fn replace_pending(&self, batch: &BTreeMap<String, Suggestion>) -> Result<(), DomainError>;
}
