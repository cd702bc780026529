// sala/src/commands/run.rs
//
// USE CASE: Run the rules on a dataset and learn from it.

use anyhow::Context;
use std::path::PathBuf;

use sala_core::application::{Mediator, run_pipeline};
use sala_core::infrastructure::adapters::{DuckDBConnector, build_synthesizer};

use super::{Workspace, percent};

pub async fn execute(
    project_dir: PathBuf,
    file: PathBuf,
    dataset: Option<String>,
) -> anyhow::Result<()> {
    // A. Load the Config (Infra)
    println!("⚙️  Loading configuration...");
    let mut workspace = Workspace::open(&project_dir)?;
    if let Some(dataset) = dataset {
        workspace.config.dataset = dataset;
    }
    let config = &workspace.config;
    println!("   Project: {} (v{})", config.name, config.version);
    println!("   Dataset: {}", config.dataset);

    // B. Adapters
    let connector = DuckDBConnector::new(":memory:")
        .context("Failed to initialize DuckDB")?
        .with_numeric_columns(&config.ingest.numeric_columns);
    let synthesizer = build_synthesizer(config, |key| std::env::var(key).ok());
    println!("   Synthesizer: {}", synthesizer.name());

    let mediator = Mediator::new(
        config,
        workspace.rules.clone(),
        workspace.baselines.clone(),
        workspace.artifacts.clone(),
        synthesizer,
    );

    // C. Run the Pipeline (Application Layer)
    let result = run_pipeline(&mediator, &connector, &workspace.dir, config, &file)
        .await
        .with_context(|| format!("Run on {:?} failed", file))?;
    let report = &result.report;

    println!("\n📦 Run {} ({} rows, rules v{})", report.run_id, report.row_count, report.rule_set_version);

    for audit in &report.audits {
        match &audit.error {
            Some(error) => println!("   ⚠️  {} {} failed: {}", audit.rule_id, audit.kind, error),
            None if audit.rows_affected > 0 => println!(
                "   ✏️  {} {} {}: {} rows",
                audit.rule_id, audit.kind, audit.target_field, audit.rows_affected
            ),
            None => {}
        }
    }

    let outliers: usize = report.outliers.iter().map(|o| o.outlier_count).sum();
    if outliers > 0 {
        println!("   📈 {} IQR outliers", outliers);
    }
    for drift in report.drift.iter().filter(|d| d.exceeded_tolerance) {
        println!("   🌊 Drift on {}", drift.column);
    }
    if !report.baseline_present {
        println!("   🆕 First run for this dataset, baseline created");
    }

    for suggestion in &report.suggestions {
        println!(
            "   💡 [{}] {} ({}) {}",
            suggestion.status,
            suggestion.title,
            percent(suggestion.confidence),
            suggestion.id
        );
    }
    for warning in &report.warnings {
        eprintln!("   ⚠️  {}: {}", warning.code, warning.message);
    }

    if let Some(version) = report.committed_rule_set_version {
        println!("   🔒 Rule set v{} committed", version);
    }

    println!("   Curated: {}", result.curated_path.display());
    println!("\n✨ SUCCESS! Run finished in {:.2}s", result.elapsed_secs);
    Ok(())
}
