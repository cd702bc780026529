// sala/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReportsAction, ReviewAction, RulesAction};

#[tokio::main]
async fn main() {
    // .env du répertoire courant (OPENAI_API_KEY, ENABLE_LLM, ...)
    dotenvy::dotenv().ok();

    // RUST_LOG=debug sala run ... pour voir les détails
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { project_dir, name } => commands::init::execute(project_dir, name),
        Commands::Run {
            project_dir,
            file,
            dataset,
        } => commands::run::execute(project_dir, file, dataset).await,
        Commands::Rules { action } => match action {
            RulesAction::Show { project_dir } => commands::rules::show(project_dir),
            RulesAction::History { project_dir } => commands::rules::history(project_dir),
        },
        Commands::Review { action } => match action {
            ReviewAction::List { project_dir } => commands::review::list(project_dir),
            ReviewAction::Apply { id, project_dir } => commands::review::apply(project_dir, &id),
            ReviewAction::Reject {
                id,
                project_dir,
                reason,
            } => commands::review::reject(project_dir, &id, reason),
        },
        Commands::Reports { action } => match action {
            ReportsAction::List { project_dir } => commands::reports::list(project_dir),
            ReportsAction::Show { name, project_dir } => commands::reports::show(project_dir, &name),
            ReportsAction::Compare { a, b, project_dir } => {
                commands::reports::compare(project_dir, &a, &b)
            }
        },
        Commands::Inspect { project_dir, file } => commands::inspect::execute(project_dir, file).await,
        Commands::Clean { project_dir } => commands::clean::execute(project_dir),
    };

    if let Err(e) = result {
        eprintln!("\n❌ {:#}", e);
        std::process::exit(1);
    }
}
