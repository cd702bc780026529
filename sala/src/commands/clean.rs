// sala/src/commands/clean.rs
//
// USE CASE: Clean build artifacts.

use anyhow::Context;
use std::path::PathBuf;

use sala_core::application::clean_project;

pub fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let removed = clean_project(&project_dir)
        .with_context(|| format!("Clean failed in {:?}", project_dir))?;
    if removed.is_empty() {
        println!("🧹 Nothing to clean.");
    }
    for path in removed {
        println!("🧹 Removed {}", path);
    }
    Ok(())
}
