// sala/src/commands/reports.rs
//
// USE CASE: Browse and compare run reports.

use comfy_table::Table;
use std::collections::BTreeSet;
use std::path::PathBuf;

use sala_core::application::compare_reports;
use sala_core::domain::ports::ArtifactStore;

use super::Workspace;

fn drift_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

pub fn list(project_dir: PathBuf) -> anyhow::Result<()> {
    let workspace = Workspace::open(&project_dir)?;
    let names = workspace.artifacts.list_reports()?;
    if names.is_empty() {
        println!("📭 No run reports yet.");
        return Ok(());
    }
    for name in names {
        println!("   {}", name);
    }
    Ok(())
}

pub fn show(project_dir: PathBuf, name: &str) -> anyhow::Result<()> {
    let workspace = Workspace::open(&project_dir)?;
    let report = workspace.artifacts.load_report(name)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn compare(project_dir: PathBuf, a: &str, b: &str) -> anyhow::Result<()> {
    let workspace = Workspace::open(&project_dir)?;
    let report_a = workspace.artifacts.load_report(a)?;
    let report_b = workspace.artifacts.load_report(b)?;
    let comparison = compare_reports(&report_a, &report_b);

    let (sa, sb) = (&comparison.a, &comparison.b);
    let mut overview = Table::new();
    overview.set_header(vec!["", sa.run_id.as_str(), sb.run_id.as_str()]);
    overview.add_row(vec!["rows".to_string(), sa.row_count.to_string(), sb.row_count.to_string()]);
    overview.add_row(vec![
        "rule set".to_string(),
        format!("v{}", sa.rule_set_version),
        format!("v{}", sb.rule_set_version),
    ]);
    overview.add_row(vec![
        "rules with errors".to_string(),
        sa.rules_with_errors.to_string(),
        sb.rules_with_errors.to_string(),
    ]);
    overview.add_row(vec![
        "outliers".to_string(),
        sa.outlier_total.to_string(),
        sb.outlier_total.to_string(),
    ]);
    overview.add_row(vec![
        "drift alerts".to_string(),
        sa.drift_exceeded.to_string(),
        sb.drift_exceeded.to_string(),
    ]);
    overview.add_row(vec!["warnings".to_string(), sa.warnings.to_string(), sb.warnings.to_string()]);
    println!("{overview}");

    if comparison.rows.is_empty() {
        println!("   No rule activity in either run.");
    } else {
        let mut activity = Table::new();
        activity.set_header(vec!["Kind", "Target", "Rows A", "Rows B", "Delta"]);
        for row in &comparison.rows {
            activity.add_row(vec![
                row.kind.clone(),
                row.target_field.clone(),
                row.run_a.to_string(),
                row.run_b.to_string(),
                format!("{:+}", row.delta),
            ]);
        }
        println!("{activity}");
    }

    let columns: BTreeSet<&String> = sa.drift.keys().chain(sb.drift.keys()).collect();
    if !columns.is_empty() {
        let mut drift = Table::new();
        drift.set_header(vec!["Column", "Drift A", "Drift B"]);
        for column in columns {
            drift.add_row(vec![
                column.clone(),
                drift_cell(sa.drift.get(column).copied().flatten()),
                drift_cell(sb.drift.get(column).copied().flatten()),
            ]);
        }
        println!("{drift}");
    }
    Ok(())
}
