// sala/src/commands/inspect.rs
//
// USE CASE: Profile a CSV (schema, nulls, distinct values, means).
// Works outside a project; sala.yaml is only read for `ingest.numeric_columns`.

use anyhow::Context;
use comfy_table::Table;
use std::path::PathBuf;
use tracing::debug;

use sala_core::application::inspect_dataset;
use sala_core::infrastructure::adapters::DuckDBConnector;
use sala_core::infrastructure::config::load_project_config;

use super::percent;

pub async fn execute(project_dir: PathBuf, file: PathBuf) -> anyhow::Result<()> {
    let numeric_columns = match load_project_config(&project_dir) {
        Ok(config) => config.ingest.numeric_columns,
        Err(e) => {
            debug!(error = %e, "No usable project config, inspecting with defaults");
            Vec::new()
        }
    };

    let connector = DuckDBConnector::new(":memory:")
        .context("Failed to initialize DuckDB")?
        .with_numeric_columns(&numeric_columns);
    let profile = inspect_dataset(&connector, &project_dir, &file)
        .await
        .with_context(|| format!("Cannot inspect {:?}", file))?;

    println!("\n🔍 {} ({} rows)", file.display(), profile.row_count);

    let mut table = Table::new();
    table.set_header(vec!["Column", "Kind", "Non-null", "Nulls", "Null %", "Distinct", "Mean", "Min", "Max", "< 0"]);
    let number = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
    for col in &profile.columns {
        table.add_row(vec![
            col.name.clone(),
            format!("{:?}", col.kind).to_lowercase(),
            col.count.to_string(),
            col.null_count.to_string(),
            percent(col.null_pct),
            col.distinct.to_string(),
            number(col.mean),
            number(col.min),
            number(col.max),
            col.negative_count.to_string(),
        ]);
    }
    println!("{table}");

    for col in profile.columns.iter().filter(|c| !c.category_counts.is_empty()) {
        let mut top: Vec<(&String, &usize)> = col.category_counts.iter().collect();
        top.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let shown = top
            .iter()
            .take(5)
            .map(|(value, count)| format!("{}={}", value, count))
            .collect::<Vec<_>>()
            .join(", ");
        println!("   {}: {}", col.name, shown);
    }
    Ok(())
}
