// sala-core/src/application/pipeline.rs

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::application::mediator::Mediator;
use crate::domain::compliance::DatasetProfile;
use crate::domain::dataset::Dataset;
use crate::domain::project::ProjectConfig;
use crate::domain::report::RunReport;
use crate::error::SalaError;
use crate::ports::connector::Connector;

const SOURCE_VIEW: &str = "sala_source";
pub const CURATED_FILE: &str = "curated.csv";

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub report: RunReport,
    pub curated_path: PathBuf,
    pub elapsed_secs: f64,
}

/// Resolves `file` against the project root unless it is absolute.
pub fn resolve_source(project_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        project_dir.join(file)
    }
}

/// Registers the CSV with the connector and reads it into memory.
/// Any failure here is an unreadable dataset: nothing has been written yet.
pub async fn load_dataset(connector: &dyn Connector, path: &Path) -> Result<Dataset, SalaError> {
    if !path.is_file() {
        return Err(SalaError::UnreadableDataset(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let unreadable = |e: SalaError| {
        SalaError::UnreadableDataset(format!("{}: {}", path.display(), e))
    };
    connector
        .register_source(SOURCE_VIEW, &path.to_string_lossy())
        .await
        .map_err(unreadable)?;
    let dataset = connector
        .fetch_dataset(SOURCE_VIEW)
        .await
        .map_err(unreadable)?;
    info!(rows = dataset.len(), columns = dataset.columns().len(), engine = connector.engine_name(), "Dataset loaded");
    Ok(dataset)
}

/// Load, run the mediator, export the curated dataset to `<target>/curated.csv`.
pub async fn run_pipeline(
    mediator: &Mediator,
    connector: &dyn Connector,
    project_dir: &Path,
    config: &ProjectConfig,
    file: &Path,
) -> Result<RunResult, SalaError> {
    let start_time = Instant::now();
    let source = resolve_source(project_dir, file);
    let dataset = load_dataset(connector, &source).await?;

    let outcome = mediator.run(dataset, &source.to_string_lossy()).await?;

    let target_dir = project_dir.join(&config.target_path);
    fs::create_dir_all(&target_dir)?;
    let curated_path = target_dir.join(CURATED_FILE);
    connector
        .export_csv(&outcome.curated, &curated_path.to_string_lossy())
        .await?;

    let elapsed_secs = start_time.elapsed().as_secs_f64();
    info!(run_id = %outcome.report.run_id, path = ?curated_path, elapsed_secs, "Curated dataset exported");

    Ok(RunResult {
        report: outcome.report,
        curated_path,
        elapsed_secs,
    })
}

/// Profile of a CSV, without running rules or touching any state.
pub async fn inspect_dataset(
    connector: &dyn Connector,
    project_dir: &Path,
    file: &Path,
) -> Result<DatasetProfile, SalaError> {
    let dataset = load_dataset(connector, &resolve_source(project_dir, file)).await?;
    Ok(DatasetProfile::of(&dataset))
}
