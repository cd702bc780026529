// sala-core/src/infrastructure/store/rules.rs

use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::error::DomainError;
use crate::domain::ports::{CommitLock, RuleRepository};
use crate::domain::rules::snapshot::next_rule_id;
use crate::domain::rules::{Rule, RuleSetSnapshot};
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::{StateLock, atomic_write, write_once};

pub const RULES_FILE: &str = "rules.json";
pub const HISTORY_DIR: &str = "rules_history";

/// `{"if": "...", "then": "impute status = 'unknown'"}`
#[derive(Debug, Deserialize)]
struct LegacyRule {
    #[serde(rename = "if", default)]
    condition: String,
    #[serde(rename = "then")]
    action: String,
}

/// `<state>/rules.json` holds the active snapshot, `<state>/rules_history/` one
/// write-once file per committed version. Commits lock `<state>/.sala.lock`,
/// which also covers the baselines stored beside them.
pub struct FileRuleRepository {
    state_dir: PathBuf,
}

impl FileRuleRepository {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn active_path(&self) -> PathBuf {
        self.state_dir.join(RULES_FILE)
    }

    fn history_path(&self, version: u64) -> PathBuf {
        self.state_dir
            .join(HISTORY_DIR)
            .join(format!("rules_v{:06}.json", version))
    }
}

fn persistence(path: &Path, err: impl std::fmt::Display) -> DomainError {
    DomainError::Persistence(format!("{}: {}", path.display(), err))
}

/// Accepts the snapshot document, `{"logic": [...]}`, or a bare array of
/// structured or legacy rules. Legacy entries get the next free `Rnnnn` id,
/// after every structured id in the document. Rule ids must be unique.
pub fn parse_rules_document(content: &str) -> Result<RuleSetSnapshot, InfrastructureError> {
    let doc: Json = serde_json::from_str(content)?;
    if doc.get("version").is_some() || doc.get("rules").is_some() {
        let snapshot: RuleSetSnapshot = serde_json::from_value(doc)?;
        ensure_unique_ids(&snapshot.rules)?;
        return Ok(snapshot);
    }
    let entries = match doc {
        Json::Object(mut map) => match map.remove("logic") {
            Some(Json::Array(entries)) => entries,
            _ => {
                return Err(InfrastructureError::ConfigError(
                    "rules document has neither 'rules' nor 'logic'".into(),
                ));
            }
        },
        Json::Array(entries) => entries,
        _ => {
            return Err(InfrastructureError::ConfigError(
                "rules document must be an object or an array".into(),
            ));
        }
    };

    let parsed = entries
        .into_iter()
        .map(|entry| {
            if entry.get("then").is_some() {
                Ok(Entry::Legacy(serde_json::from_value(entry)?))
            } else {
                Ok(Entry::Structured(serde_json::from_value(entry)?))
            }
        })
        .collect::<Result<Vec<_>, InfrastructureError>>()?;

    let mut taken: Vec<String> = parsed
        .iter()
        .filter_map(|entry| match entry {
            Entry::Structured(rule) => Some(rule.id.clone()),
            Entry::Legacy(_) => None,
        })
        .collect();

    let mut rules = Vec::with_capacity(parsed.len());
    for entry in parsed {
        match entry {
            Entry::Structured(rule) => rules.push(rule),
            Entry::Legacy(legacy) => {
                let id = next_rule_id(taken.iter().map(String::as_str));
                match Rule::from_legacy(&id, &legacy.condition, &legacy.action) {
                    Ok(rule) => {
                        taken.push(id);
                        rules.push(rule);
                    }
                    Err(e) => warn!(id = %id, error = %e, "Legacy rule ignored"),
                }
            }
        }
    }
    ensure_unique_ids(&rules)?;
    Ok(RuleSetSnapshot::new(0, rules))
}

enum Entry {
    Structured(Rule),
    Legacy(LegacyRule),
}

fn ensure_unique_ids(rules: &[Rule]) -> Result<(), InfrastructureError> {
    let mut seen = HashSet::new();
    match rules.iter().find(|rule| !seen.insert(rule.id.as_str())) {
        Some(rule) => Err(InfrastructureError::ConfigError(format!(
            "duplicate rule id '{}'",
            rule.id
        ))),
        None => Ok(()),
    }
}

impl RuleRepository for FileRuleRepository {
    fn lock(&self) -> Result<Option<Box<dyn CommitLock>>, DomainError> {
        let lock = StateLock::acquire(&self.state_dir).map_err(|e| persistence(&self.state_dir, e))?;
        Ok(Some(Box::new(lock)))
    }

    fn load_active(&self) -> Result<RuleSetSnapshot, DomainError> {
        let path = self.active_path();
        if !path.exists() {
            return Ok(RuleSetSnapshot::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| persistence(&path, e))?;
        let snapshot = parse_rules_document(&content).map_err(|e| persistence(&path, e))?;
        debug!(version = snapshot.version, rules = snapshot.len(), "Active rules loaded");
        Ok(snapshot)
    }

    fn head_version(&self) -> Result<u64, DomainError> {
        Ok(self.load_active()?.version)
    }

    fn commit(&self, snapshot: &RuleSetSnapshot) -> Result<(), DomainError> {
        let expected = snapshot.parent_version.unwrap_or(0);
        let found = self.head_version()?;
        if found != expected {
            return Err(DomainError::PersistenceConflict { expected, found });
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        // History first: a second writer for the same version loses here.
        let history = self.history_path(snapshot.version);
        match write_once(&history, &content) {
            Ok(()) => {}
            Err(InfrastructureError::AlreadyExists(_)) => {
                return Err(DomainError::PersistenceConflict {
                    expected,
                    found: snapshot.version,
                });
            }
            Err(e) => return Err(persistence(&history, e)),
        }

        let active = self.active_path();
        atomic_write(&active, &content).map_err(|e| persistence(&active, e))
    }

    fn history(&self) -> Result<Vec<RuleSetSnapshot>, DomainError> {
        let dir = self.state_dir.join(HISTORY_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| persistence(&dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        paths
            .iter()
            .map(|path| {
                let content = fs::read_to_string(path).map_err(|e| persistence(path, e))?;
                serde_json::from_str(&content).map_err(|e| persistence(path, e))
            })
            .collect()
    }
}
