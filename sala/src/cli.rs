// sala/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sala")]
#[command(about = "Operational data-quality enforcement with adaptive rule learning", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🌱 Creates sala.yaml and the state/meta/target folders
    Init {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// 🚀 Runs the rules on a CSV, measures it and learns new rules
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// CSV file, relative to the project directory unless absolute
        #[arg(long, short)]
        file: PathBuf,

        /// Baseline identity (overrides `dataset` in sala.yaml)
        #[arg(long)]
        dataset: Option<String>,
    },

    /// 📜 Shows the active rule set or its version history
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// 🧑‍⚖️ Reviews suggestions waiting for a human decision
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// 📊 Lists, shows and compares run reports
    Reports {
        #[command(subcommand)]
        action: ReportsAction,
    },

    /// 🔍 Profiles a CSV without running any rule
    Inspect {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        file: PathBuf,
    },

    /// 🧹 Cleans build artifacts (target/ folder)
    Clean {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// Active snapshot
    Show {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Every committed version
    History {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ReviewAction {
    List {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Merges a pending suggestion into a new rule set version
    Apply {
        id: String,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    Reject {
        id: String,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
        /// Recorded in the suggestion history
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportsAction {
    List {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    Show {
        /// Run id (with or without `.json`)
        name: String,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
    /// Per-rule activity delta between two runs
    Compare {
        a: String,
        b: String,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use clap::Parser;

    #[test]
    fn test_cli_parse_run_defaults() -> Result<()> {
        let args = Cli::parse_from(["sala", "run", "--file", "data/orders.csv"]);
        match args.command {
            Commands::Run {
                project_dir,
                file,
                dataset,
            } => {
                assert_eq!(project_dir.to_string_lossy(), ".");
                assert_eq!(file.to_string_lossy(), "data/orders.csv");
                assert_eq!(dataset, None);
                Ok(())
            }
            _ => bail!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_requires_file() {
        assert!(Cli::try_parse_from(["sala", "run"]).is_err());
    }

    #[test]
    fn test_cli_parse_run_dataset() -> Result<()> {
        let args = Cli::parse_from([
            "sala",
            "run",
            "-f",
            "orders.csv",
            "--dataset",
            "orders_eu",
            "--project-dir",
            "/tmp",
        ]);
        match args.command {
            Commands::Run {
                project_dir,
                dataset,
                ..
            } => {
                assert_eq!(project_dir.to_string_lossy(), "/tmp");
                assert_eq!(dataset, Some("orders_eu".to_string()));
                Ok(())
            }
            _ => bail!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_review_reject() -> Result<()> {
        let args = Cli::parse_from(["sala", "review", "reject", "S-1", "--reason", "too broad"]);
        match args.command {
            Commands::Review {
                action: ReviewAction::Reject { id, reason, .. },
            } => {
                assert_eq!(id, "S-1");
                assert_eq!(reason.as_deref(), Some("too broad"));
                Ok(())
            }
            _ => bail!("Expected Review Reject command"),
        }
    }

    #[test]
    fn test_cli_parse_reports_compare() -> Result<()> {
        let args = Cli::parse_from(["sala", "reports", "compare", "run_a", "run_b"]);
        match args.command {
            Commands::Reports {
                action: ReportsAction::Compare { a, b, project_dir },
            } => {
                assert_eq!((a.as_str(), b.as_str()), ("run_a", "run_b"));
                assert_eq!(project_dir.to_string_lossy(), ".");
                Ok(())
            }
            _ => bail!("Expected Reports Compare command"),
        }
    }
}
