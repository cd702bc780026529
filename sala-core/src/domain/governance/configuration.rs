// sala-core/src/domain/governance/configuration.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Inputs to suggestion governance (`governance:` section).
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub enable_llm: bool,

    #[serde(default)]
    pub auto_accept: bool,

    #[serde(default = "default_confidence_threshold")]
    #[validate(range(min = 0.0, max = 1.0, message = "confidence_threshold must be within [0, 1]"))]
    pub confidence_threshold: f64,

    #[serde(default = "default_history_window")]
    #[validate(range(min = 1, message = "baseline_history_window must be at least 1"))]
    pub baseline_history_window: usize,

    #[serde(default = "default_synthesis_timeout")]
    #[validate(range(min = 1))]
    pub synthesis_timeout_secs: u64,
}

fn default_confidence_threshold() -> f64 {
    0.85
}
fn default_history_window() -> usize {
    50
}
fn default_synthesis_timeout() -> u64 {
    30
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            enable_llm: false,
            auto_accept: false,
            confidence_threshold: default_confidence_threshold(),
            baseline_history_window: default_history_window(),
            synthesis_timeout_secs: default_synthesis_timeout(),
        }
    }
}

/// Thresholds of the deterministic synthesizer (`heuristics:` section).
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct HeuristicsConfig {
    #[serde(default = "default_missing_ratio")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub missing_ratio_threshold: f64,

    #[serde(default)]
    pub non_negative_columns: Vec<String>,

    /// column -> accepted values; anything else is "unexpected"
    #[serde(default)]
    pub allowed_values: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_min_unexpected")]
    pub min_unexpected_count: usize,

    #[serde(default = "default_max_unexpected")]
    pub max_unexpected_values: usize,

    #[serde(default)]
    pub date_columns: Vec<String>,

    #[serde(default = "default_flag_field")]
    pub flag_field: String,

    #[serde(default = "default_alert_field")]
    pub alert_field: String,
}

fn default_missing_ratio() -> f64 {
    0.30
}
fn default_min_unexpected() -> usize {
    10
}
fn default_max_unexpected() -> usize {
    3
}
fn default_flag_field() -> String {
    "dq_flag".to_string()
}
fn default_alert_field() -> String {
    "dq_alert".to_string()
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            missing_ratio_threshold: default_missing_ratio(),
            non_negative_columns: Vec::new(),
            allowed_values: BTreeMap::new(),
            min_unexpected_count: default_min_unexpected(),
            max_unexpected_values: default_max_unexpected(),
            date_columns: Vec::new(),
            flag_field: default_flag_field(),
            alert_field: default_alert_field(),
        }
    }
}

/// Remote synthesizer settings (`llm:` section). The key itself is read from
/// the environment variable named by `api_key_env`.
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    #[validate(length(min = 1, message = "llm.endpoint cannot be empty"))]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    1200
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_defaults_from_empty_yaml() -> Result<()> {
        let config: GovernanceConfig = serde_yaml::from_str("{}")?;
        assert!(!config.enable_llm);
        assert!(!config.auto_accept);
        assert_eq!(config.confidence_threshold, 0.85);
        assert_eq!(config.baseline_history_window, 50);
        Ok(())
    }

    #[test]
    fn test_threshold_out_of_range_is_invalid() {
        let config = GovernanceConfig {
            confidence_threshold: 1.5,
            ..GovernanceConfig::default()
        };
        assert!(config.validate().is_err());

        let window = GovernanceConfig {
            baseline_history_window: 0,
            ..GovernanceConfig::default()
        };
        assert!(window.validate().is_err());
    }
}
