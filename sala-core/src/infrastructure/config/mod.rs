// sala-core/src/infrastructure/config/mod.rs

pub mod project;

pub use crate::domain::project::ProjectConfig;
pub use project::{init_project, load_project_config, load_project_config_with};
