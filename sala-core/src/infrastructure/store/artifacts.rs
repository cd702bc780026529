// sala-core/src/infrastructure/store/artifacts.rs

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::DomainError;
use crate::domain::governance::Suggestion;
use crate::domain::ports::ArtifactStore;
use crate::domain::report::{InsightEntry, RunReport};
use crate::infrastructure::fs::{append_line, atomic_write, write_once};

pub const REPORTS_DIR: &str = "run_reports";
pub const INSIGHTS_FILE: &str = "insights.jsonl";
pub const PENDING_FILE: &str = "suggestions.json";

/// Reports under `<state>/run_reports/`, insight log and pending batch under `<meta>/`.
pub struct FileArtifactStore {
    reports_dir: PathBuf,
    meta_dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(state_dir: impl Into<PathBuf>, meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: state_dir.into().join(REPORTS_DIR),
            meta_dir: meta_dir.into(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DomainError> {
    let content = fs::read_to_string(path)
        .map_err(|e| DomainError::Persistence(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| DomainError::Persistence(format!("{}: {}", path.display(), e)))
}

/// Report names are bare file stems: no separators, no parent references.
fn report_stem(name: &str) -> Result<&str, DomainError> {
    let stem = name.strip_suffix(".json").unwrap_or(name);
    if stem.is_empty() || stem.contains(['/', '\\']) || stem.contains("..") {
        return Err(DomainError::Persistence(format!("invalid report name '{}'", name)));
    }
    Ok(stem)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string_pretty(value).map_err(|e| DomainError::Persistence(e.to_string()))
}

impl ArtifactStore for FileArtifactStore {
    fn write_report(&self, report: &RunReport) -> Result<(), DomainError> {
        let path = self.reports_dir.join(format!("{}.json", report.run_id));
        write_once(&path, to_json(report)?)?;
        Ok(())
    }

    fn load_report(&self, name: &str) -> Result<RunReport, DomainError> {
        let stem = report_stem(name)?;
        let path = self.reports_dir.join(format!("{}.json", stem));
        if !path.exists() {
            return Err(DomainError::Persistence(format!(
                "report '{}' not found in {}",
                stem,
                self.reports_dir.display()
            )));
        }
        read_json(&path)
    }

    fn list_reports(&self) -> Result<Vec<String>, DomainError> {
        if !self.reports_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.reports_dir)
            .map_err(|e| DomainError::Persistence(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        // run ids start with a UTC timestamp
        names.sort();
        Ok(names)
    }

    fn append_insight(&self, entry: &InsightEntry) -> Result<(), DomainError> {
        let line = serde_json::to_string(entry).map_err(|e| DomainError::Persistence(e.to_string()))?;
        append_line(self.meta_dir.join(INSIGHTS_FILE), &line)?;
        Ok(())
    }

    fn load_pending(&self) -> Result<BTreeMap<String, Suggestion>, DomainError> {
        let path = self.meta_dir.join(PENDING_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&path)
    }

    fn replace_pending(&self, batch: &BTreeMap<String, Suggestion>) -> Result<(), DomainError> {
        atomic_write(self.meta_dir.join(PENDING_FILE), to_json(batch)?)?;
        Ok(())
    }
}
