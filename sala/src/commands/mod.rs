// sala/src/commands/mod.rs

pub mod clean;
pub mod init;
pub mod inspect;
pub mod reports;
pub mod review;
pub mod rules;
pub mod run;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sala_core::application::RuleStore;
use sala_core::domain::project::ProjectConfig;
use sala_core::infrastructure::config::load_project_config;
use sala_core::infrastructure::store::{
    FileArtifactStore, FileBaselineRepository, FileRuleRepository,
};

/// A loaded project with its file-backed stores wired in.
pub struct Workspace {
    pub dir: PathBuf,
    pub config: ProjectConfig,
    pub rules: Arc<RuleStore>,
    pub baselines: Arc<FileBaselineRepository>,
    pub artifacts: Arc<FileArtifactStore>,
}

impl Workspace {
    pub fn open(project_dir: &Path) -> anyhow::Result<Self> {
        let config = load_project_config(project_dir).with_context(|| {
            format!(
                "Failed to load project configuration from {:?}",
                project_dir
            )
        })?;
        Self::with_config(project_dir, config)
    }

    pub fn with_config(project_dir: &Path, config: ProjectConfig) -> anyhow::Result<Self> {
        let state_dir = project_dir.join(&config.state_path);
        let meta_dir = project_dir.join(&config.meta_path);

        let repository = Arc::new(FileRuleRepository::new(&state_dir));
        let rules = RuleStore::open(repository)
            .with_context(|| format!("Failed to load rules from {:?}", state_dir))?;

        Ok(Self {
            dir: project_dir.to_path_buf(),
            rules: Arc::new(rules),
            baselines: Arc::new(FileBaselineRepository::new(&state_dir)),
            artifacts: Arc::new(FileArtifactStore::new(&state_dir, &meta_dir)),
            config,
        })
    }
}

/// `0.873` -> `87%`
pub fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
