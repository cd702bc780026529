// sala-core/src/domain/project/mod.rs

pub mod configuration;
pub use configuration::{ExecutorConfig, IngestConfig, ProjectConfig};
