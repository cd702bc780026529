// sala/src/commands/review.rs
//
// USE CASE: Human review of pending suggestions.

use anyhow::Context;
use comfy_table::Table;
use std::path::{Path, PathBuf};

use sala_core::application::ReviewService;

use super::{Workspace, percent};

fn service(project_dir: &Path) -> anyhow::Result<ReviewService> {
    let workspace = Workspace::open(project_dir)?;
    Ok(ReviewService::new(workspace.rules, workspace.artifacts))
}

pub fn list(project_dir: PathBuf) -> anyhow::Result<()> {
    let pending = service(&project_dir)?.list_pending()?;
    if pending.is_empty() {
        println!("📭 Nothing to review.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Status", "Rule", "Conf.", "Source", "Reason"]);
    for suggestion in &pending {
        let rule = &suggestion.rule;
        table.add_row(vec![
            suggestion.id.clone(),
            suggestion.status.to_string(),
            format!(
                "{} {} = {} where {}",
                rule.kind, rule.target_field, rule.expression, rule.condition
            ),
            percent(suggestion.confidence),
            suggestion.source.clone(),
            suggestion.reason.clone(),
        ]);
    }
    println!("{table}");
    println!("👉 sala review apply <id> | sala review reject <id>");
    Ok(())
}

pub fn apply(project_dir: PathBuf, id: &str) -> anyhow::Result<()> {
    let outcome = service(&project_dir)?
        .apply(id)
        .with_context(|| format!("Cannot apply suggestion {}", id))?;
    let suggestion = &outcome.suggestion;

    match (outcome.committed_version, &suggestion.applied_rule_id) {
        (Some(version), Some(rule_id)) => {
            println!("✅ {} applied as {} (rule set v{})", suggestion.id, rule_id, version);
        }
        _ => {
            println!(
                "↩️  {} not applied: {} ({})",
                suggestion.id,
                suggestion.status,
                suggestion.status_reason.as_deref().unwrap_or("no reason")
            );
        }
    }
    Ok(())
}

pub fn reject(project_dir: PathBuf, id: &str, reason: Option<String>) -> anyhow::Result<()> {
    let suggestion = service(&project_dir)?
        .reject(id, reason)
        .with_context(|| format!("Cannot reject suggestion {}", id))?;
    println!("🗑️  {} rejected", suggestion.id);
    Ok(())
}
