// sala/src/commands/init.rs
//
// USE CASE: Scaffold a new project.

use anyhow::Context;
use std::fs;
use std::path::PathBuf;

use sala_core::infrastructure::config::init_project;

pub fn execute(project_dir: PathBuf, name: Option<String>) -> anyhow::Result<()> {
    fs::create_dir_all(&project_dir)
        .with_context(|| format!("Cannot create {:?}", project_dir))?;

    let name = name.unwrap_or_else(|| {
        fs::canonicalize(&project_dir)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| "sala_project".to_string())
    });

    let path = init_project(&project_dir, &name)
        .with_context(|| format!("Failed to initialize a project in {:?}", project_dir))?;

    println!("🌱 Project '{}' initialized", name);
    println!("   Config: {}", path.display());
    println!("👉 Next: sala run --file <data.csv>");
    Ok(())
}
