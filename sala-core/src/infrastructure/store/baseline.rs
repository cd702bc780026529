// sala-core/src/infrastructure/store/baseline.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::compliance::Baseline;
use crate::domain::error::DomainError;
use crate::domain::ports::BaselineRepository;
use crate::infrastructure::fs::atomic_write;

pub const BASELINES_FILE: &str = "baselines.json";

/// `<state>/baselines.json`: dataset identity -> baseline.
/// `save` rewrites the whole file; writers hold the state lock taken by
/// `FileRuleRepository::lock` on the same directory.
pub struct FileBaselineRepository {
    path: PathBuf,
}

impl FileBaselineRepository {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join(BASELINES_FILE),
        }
    }

    fn load_all(&self) -> Result<BTreeMap<String, Baseline>, DomainError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| DomainError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| DomainError::Persistence(format!("{}: {}", self.path.display(), e)))
    }
}

impl BaselineRepository for FileBaselineRepository {
    fn load(&self, dataset: &str) -> Result<Option<Baseline>, DomainError> {
        Ok(self.load_all()?.remove(dataset))
    }

    fn save(&self, dataset: &str, baseline: &Baseline) -> Result<(), DomainError> {
        let mut all = self.load_all()?;
        all.insert(dataset.to_string(), baseline.clone());
        let content = serde_json::to_string_pretty(&all)
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        atomic_write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::{DriftMonitor, MonitoredColumns};
    use crate::domain::dataset::{Dataset, Value};
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_baselines_are_keyed_by_dataset() -> Result<()> {
        let dir = tempdir()?;
        let repo = FileBaselineRepository::new(dir.path());
        assert!(repo.load("orders")?.is_none());

        let data = Dataset::from_records(&["amount"], vec![vec![Value::from(10.0)], vec![Value::from(20.0)]]);
        let columns = MonitoredColumns {
            measures: vec!["amount".into()],
            categorical: vec![],
        };
        let baseline = DriftMonitor::update(None, &data, &columns, 50);
        repo.save("orders", &baseline)?;
        repo.save("refunds", &baseline)?;

        assert_eq!(repo.load("orders")?, Some(baseline));
        assert!(repo.load("customers")?.is_none());
        Ok(())
    }
}
