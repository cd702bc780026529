// src/domain/project/configuration.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::compliance::MonitoringConfig;
use crate::domain::governance::{GovernanceConfig, HeuristicsConfig, LlmConfig};

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,

    /// Identity under which baselines are stored.
    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(rename = "state-path", default = "default_state_path")]
    pub state_path: String,

    #[serde(rename = "meta-path", default = "default_meta_path")]
    pub meta_path: String,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    #[serde(rename = "clean-targets", default = "default_clean_targets")]
    pub clean_targets: Vec<String>,

    #[serde(default)]
    #[validate(nested)]
    pub governance: GovernanceConfig,

    #[serde(default)]
    #[validate(nested)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    #[validate(nested)]
    pub heuristics: HeuristicsConfig,

    #[serde(default)]
    #[validate(nested)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct IngestConfig {
    /// Text columns coerced to numbers on load (decimal comma accepted).
    #[serde(default)]
    pub numeric_columns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExecutorConfig {
    /// Adds `imputed_flag` / `missing_reason` to rows a rule changed.
    #[serde(default)]
    pub lineage_columns: bool,
}

impl ProjectConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: default_version(),
            dataset: default_dataset(),
            state_path: default_state_path(),
            meta_path: default_meta_path(),
            target_path: default_target_path(),
            clean_targets: default_clean_targets(),
            governance: GovernanceConfig::default(),
            monitoring: MonitoringConfig::default(),
            heuristics: HeuristicsConfig::default(),
            llm: LlmConfig::default(),
            ingest: IngestConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}
fn default_dataset() -> String {
    "default".to_string()
}
fn default_state_path() -> String {
    "dq".to_string()
}
fn default_meta_path() -> String {
    "meta".to_string()
}
fn default_clean_targets() -> Vec<String> {
    vec!["target".to_string()]
}
fn default_target_path() -> String {
    "target".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_minimal_yaml_gets_defaults() -> Result<()> {
        let config: ProjectConfig = serde_yaml::from_str("name: shop\n")?;
        assert_eq!(config.state_path, "dq");
        assert_eq!(config.meta_path, "meta");
        assert_eq!(config.dataset, "default");
        assert_eq!(config.monitoring.min_samples, 4);
        assert_eq!(config.heuristics.flag_field, "dq_flag");
        assert!(config.validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_nested_validation_reaches_sections() -> Result<()> {
        let yaml = "name: shop\ngovernance:\n  confidence_threshold: 3.0\n";
        let config: ProjectConfig = serde_yaml::from_str(yaml)?;
        assert!(config.validate().is_err());
        Ok(())
    }
}
