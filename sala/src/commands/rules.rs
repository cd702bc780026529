// sala/src/commands/rules.rs
//
// USE CASE: Read the versioned rule store.

use comfy_table::Table;
use std::path::PathBuf;

use super::{Workspace, percent};

pub fn show(project_dir: PathBuf) -> anyhow::Result<()> {
    let workspace = Workspace::open(&project_dir)?;
    let active = workspace.rules.active()?;

    println!("\n📜 Rule set v{} ({} rules)", active.version, active.len());
    if active.is_empty() {
        println!("   No rules yet. Run `sala run --file <csv>` to start learning.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Kind", "Target", "Expression", "Condition", "Conf.", "Origin", "Since"]);
    for rule in &active.rules {
        table.add_row(vec![
            rule.id.clone(),
            rule.kind.to_string(),
            rule.target_field.clone(),
            rule.expression.clone(),
            rule.condition.clone(),
            percent(rule.confidence),
            format!("{:?}", rule.provenance),
            format!("v{}", rule.version),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn history(project_dir: PathBuf) -> anyhow::Result<()> {
    let workspace = Workspace::open(&project_dir)?;
    let history = workspace.rules.history()?;

    if history.is_empty() {
        println!("📭 No committed rule set yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Version", "Created", "Parent", "Rules", "From run"]);
    for snapshot in &history {
        table.add_row(vec![
            format!("v{}", snapshot.version),
            snapshot.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            snapshot
                .parent_version
                .map_or_else(|| "-".to_string(), |v| format!("v{}", v)),
            snapshot.len().to_string(),
            snapshot.source_run_id.clone().unwrap_or_else(|| "manual".to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}
