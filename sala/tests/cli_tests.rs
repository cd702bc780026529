use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const ENV_OVERRIDES: [&str; 6] = [
    "ENABLE_LLM",
    "AUTO_ACCEPT_LLM_RULES",
    "CONFIDENCE_THRESHOLD",
    "BASELINE_HISTORY_WINDOW",
    "SALA_STATE_PATH",
    "RUST_LOG",
];

/// A throwaway copy of the `demos/orders` project.
struct SalaTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl SalaTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let demo = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .context("Workspace root not found")?
            .join("demos/orders");

        let dest = tmp.path().join("orders");
        Self::copy_dir(&demo, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.skip_exist = true;
        options.content_only = true;

        fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn sala(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sala"));
        cmd.current_dir(&self.root);
        for key in ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        cmd
    }

    fn run(&self) -> Command {
        let mut cmd = self.sala();
        cmd.args(["run", "--file", "data/orders_sample.csv"]);
        cmd
    }

    fn pending_ids(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(self.root.join("meta/suggestions.json"))?;
        let pending: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)?;
        Ok(pending.keys().cloned().collect())
    }

    fn report_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(self.root.join("dq/run_reports"))?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                e.file_name()
                    .to_string_lossy()
                    .strip_suffix(".json")
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

#[test]
fn test_init_scaffolds_once() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let project = tmp.path().join("fresh");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sala"));
    cmd.args(["init", "--name", "fresh"])
        .arg("--project-dir")
        .arg(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("Project 'fresh' initialized"));

    assert!(project.join("sala.yaml").is_file());
    assert!(project.join("dq").is_dir());
    assert!(project.join("meta").is_dir());

    let mut again = Command::new(assert_cmd::cargo::cargo_bin!("sala"));
    again
        .arg("init")
        .arg("--project-dir")
        .arg(&project)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_run_curates_and_queues_suggestions_for_review() -> Result<()> {
    let env = SalaTestEnv::new()?;

    env.run()
        .assert()
        .success()
        .stdout(predicate::str::contains("📦 Run run_"))
        .stdout(predicate::str::contains("20 rows, rules v0"))
        .stdout(predicate::str::contains("SUCCESS"));

    let curated = fs::read_to_string(env.root.join("target/curated.csv"))?;
    assert!(curated.lines().next().is_some_and(|h| h.contains("imputed_flag")));
    assert!(curated.contains("unknown"));

    // Nothing is committed without auto-accept: the legacy rules stay at v0
    assert_eq!(env.report_names()?.len(), 1);
    assert!(!env.pending_ids()?.is_empty());
    env.sala()
        .args(["rules", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rule set v0 (3 rules)"));
    env.sala()
        .args(["review", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dq_flag"));
    Ok(())
}

#[test]
fn test_review_apply_commits_a_new_version() -> Result<()> {
    let env = SalaTestEnv::new()?;
    env.run().assert().success();

    let ids = env.pending_ids()?;
    let first = ids.first().context("no pending suggestion")?;

    env.sala()
        .args(["review", "apply", first.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("applied as R0004 (rule set v1)"));

    assert!(!env.pending_ids()?.contains(first));
    assert!(env.root.join("dq/rules_history/rules_v000001.json").is_file());
    env.sala()
        .args(["rules", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v1"));

    // Already consumed
    env.sala().args(["review", "apply", first.as_str()]).assert().failure();
    Ok(())
}

#[test]
fn test_review_reject_removes_from_pending() -> Result<()> {
    let env = SalaTestEnv::new()?;
    env.run().assert().success();

    let ids = env.pending_ids()?;
    let last = ids.last().context("no pending suggestion")?;
    env.sala()
        .args(["review", "reject", last.as_str(), "--reason", "not actionable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rejected"));

    assert_eq!(env.pending_ids()?.len(), ids.len() - 1);
    env.sala()
        .args(["rules", "show"])
        .assert()
        .stdout(predicate::str::contains("Rule set v0"));
    Ok(())
}

#[test]
fn test_auto_accept_commits_learned_rules_for_the_next_run() -> Result<()> {
    let env = SalaTestEnv::new()?;

    env.run()
        .env("AUTO_ACCEPT_LLM_RULES", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rule set v1 committed"));
    let first = fs::read_to_string(env.root.join("target/curated.csv"))?;
    assert!(!first.contains("missing_customer_email"));

    env.sala()
        .args(["rules", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missing_customer_email"))
        .stdout(predicate::str::contains("AutoAccepted"));

    // The learned flags only take effect from the second run on
    env.run()
        .env("AUTO_ACCEPT_LLM_RULES", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("rules v1"));
    let curated = fs::read_to_string(env.root.join("target/curated.csv"))?;
    assert!(curated.contains("missing_customer_email"));
    Ok(())
}

#[test]
fn test_reports_list_show_and_compare() -> Result<()> {
    let env = SalaTestEnv::new()?;
    env.run().assert().success();
    env.run().assert().success();

    let names = env.report_names()?;
    assert_eq!(names.len(), 2);

    env.sala()
        .args(["reports", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(names[0].as_str()))
        .stdout(predicate::str::contains(names[1].as_str()));

    env.sala()
        .args(["reports", "show", names[0].as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"row_count\": 20"));

    env.sala()
        .args(["reports", "compare", names[0].as_str(), names[1].as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("impute"))
        .stdout(predicate::str::contains("status"));

    env.sala()
        .args(["reports", "show", "run_does_not_exist"])
        .assert()
        .failure();
    env.sala()
        .args(["reports", "show", "../rules"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid report name"));
    Ok(())
}

#[test]
fn test_inspect_profiles_without_writing_state() -> Result<()> {
    let env = SalaTestEnv::new()?;

    env.sala()
        .args(["inspect", "--file", "data/orders_sample.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(20 rows)"))
        .stdout(predicate::str::contains("customer_email"))
        .stdout(predicate::str::contains("40%"));

    assert!(!env.root.join("dq/run_reports").exists());
    assert!(!env.root.join("target").exists());
    Ok(())
}

#[test]
fn test_missing_dataset_fails_before_any_write() -> Result<()> {
    let env = SalaTestEnv::new()?;

    env.sala()
        .args(["run", "--file", "data/nope.csv"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nope.csv"));

    assert!(!env.root.join("dq/run_reports").exists());
    assert!(!env.root.join("dq/baselines.json").exists());
    Ok(())
}

#[test]
fn test_clean_removes_target_only() -> Result<()> {
    let env = SalaTestEnv::new()?;
    env.run().assert().success();
    assert!(env.root.join("target/curated.csv").exists());

    env.sala()
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed target"));

    assert!(!env.root.join("target").exists());
    assert!(env.root.join("dq/rules.json").exists());
    assert_eq!(env.report_names()?.len(), 1);
    Ok(())
}
