// sala-core/src/infrastructure/config/project.rs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::project::configuration::ProjectConfig;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::write_once;

pub const CONFIG_CANDIDATES: [&str; 2] = ["sala_project_conf.yaml", "sala.yaml"];

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    load_project_config_with(project_dir, |key| std::env::var(key).ok())
}

/// Same as `load_project_config`, with the environment supplied by `lookup`.
pub fn load_project_config_with<F>(
    project_dir: &Path,
    lookup: F,
) -> Result<ProjectConfig, InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project config");

    // 2. Chargement YAML
    let content = fs::read_to_string(&config_path)?;
    let mut config: ProjectConfig = serde_yaml::from_str(&content)?;

    // 3. Override via Variables d'Environnement (Pattern 'Layering')
    apply_env_overrides(&mut config, lookup)?;

    // 4. Validation après overrides: un seuil hors bornes venant de l'env est aussi rejeté
    config.validate()?;
    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CONFIG_CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CONFIG_CANDIDATES
    )))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, InfrastructureError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(InfrastructureError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, InfrastructureError> {
    raw.trim().parse::<T>().map_err(|_| {
        InfrastructureError::ConfigError(format!("{} has an invalid value '{}'", key, raw))
    })
}

fn apply_env_overrides<F>(config: &mut ProjectConfig, lookup: F) -> Result<(), InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ENABLE_LLM") {
        config.governance.enable_llm = parse_flag("ENABLE_LLM", &val)?;
        info!(enable_llm = config.governance.enable_llm, "Overriding via ENV");
    }
    if let Some(val) = lookup("AUTO_ACCEPT_LLM_RULES") {
        config.governance.auto_accept = parse_flag("AUTO_ACCEPT_LLM_RULES", &val)?;
        info!(auto_accept = config.governance.auto_accept, "Overriding via ENV");
    }
    if let Some(val) = lookup("CONFIDENCE_THRESHOLD") {
        config.governance.confidence_threshold = parse_env("CONFIDENCE_THRESHOLD", &val)?;
        info!(threshold = config.governance.confidence_threshold, "Overriding via ENV");
    }
    if let Some(val) = lookup("BASELINE_HISTORY_WINDOW") {
        config.governance.baseline_history_window = parse_env("BASELINE_HISTORY_WINDOW", &val)?;
        info!(window = config.governance.baseline_history_window, "Overriding via ENV");
    }
    if let Some(val) = lookup("SALA_STATE_PATH") {
        info!(old = ?config.state_path, new = ?val, "Overriding state path via ENV");
        config.state_path = val;
    }
    Ok(())
}

/// Writes a default `sala.yaml` and creates the state, meta and target directories.
pub fn init_project(project_dir: &Path, name: &str) -> Result<PathBuf, InfrastructureError> {
    if let Ok(existing) = find_main_config(project_dir) {
        return Err(InfrastructureError::AlreadyExists(existing.display().to_string()));
    }
    let config = ProjectConfig::named(name);
    let path = project_dir.join("sala.yaml");
    write_once(&path, serde_yaml::to_string(&config)?)?;

    for dir in [&config.state_path, &config.meta_path, &config.target_path] {
        fs::create_dir_all(project_dir.join(dir))?;
    }
    info!(path = ?path, "Project initialized");
    Ok(path)
}
