// sala-core/src/application/clean.rs

use crate::error::SalaError;
use crate::infrastructure::config::project::load_project_config;
use std::fs;
use std::path::{Component, Path};

/// Removes the configured build outputs. Rule state and run reports are never targets.
pub fn clean_project(project_dir: &Path) -> Result<Vec<String>, SalaError> {
    tracing::info!("🧹 Initializing Sala cleanup sequence...");

    let config = load_project_config(project_dir)?;

    let targets = if config.clean_targets.is_empty() {
        vec![config.target_path.clone()]
    } else {
        config.clean_targets
    };

    let mut removed = Vec::new();
    for target_rel_path in targets {
        let rel = Path::new(&target_rel_path);

        // Zero-Trust Path Traversal Guard
        let escapes = rel.is_absolute()
            || rel.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || rel == Path::new(&config.state_path) || rel == Path::new(&config.meta_path) {
            return Err(SalaError::UnsafePath(target_rel_path));
        }

        let full_path = project_dir.join(rel);
        if full_path.exists() {
            if full_path.is_dir() {
                fs::remove_dir_all(&full_path)?;
            } else {
                fs::remove_file(&full_path)?;
            }
            tracing::info!(path = %target_rel_path, "Artifact removed");
            removed.push(target_rel_path);
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_clean_removes_target_keeps_state() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("sala.yaml"), "name: shop\n")?;
        fs::create_dir_all(dir.path().join("target"))?;
        fs::write(dir.path().join("target/curated.csv"), "a\n1\n")?;
        fs::create_dir_all(dir.path().join("dq"))?;
        fs::write(dir.path().join("dq/rules.json"), "[]")?;

        let removed = clean_project(dir.path())?;
        assert_eq!(removed, vec!["target".to_string()]);
        assert!(!dir.path().join("target").exists());
        assert!(dir.path().join("dq/rules.json").exists());
        Ok(())
    }

    #[test]
    fn test_clean_refuses_traversal() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("sala.yaml"),
            "name: shop\nclean-targets: ['../outside']\n",
        )?;
        assert!(matches!(clean_project(dir.path()), Err(SalaError::UnsafePath(_))));
        Ok(())
    }

    #[test]
    fn test_clean_refuses_state_dir() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("sala.yaml"), "name: shop\nclean-targets: ['dq']\n")?;
        assert!(matches!(clean_project(dir.path()), Err(SalaError::UnsafePath(_))));
        Ok(())
    }
}
