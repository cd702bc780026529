// sala-core/src/application/mod.rs

pub mod clean;
pub mod compare;
pub mod executor;
pub mod mediator;
pub mod pipeline;
pub mod ports;
pub mod review;
pub mod rule_store;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Le CLI fait `use sala_core::application::{run_pipeline, Mediator, ReviewService};`

pub use clean::clean_project;
pub use compare::{ReportComparison, compare_reports};
pub use executor::RuleExecutor;
pub use mediator::{Mediator, RunOutcome};
pub use pipeline::{RunResult, inspect_dataset, run_pipeline};
pub use review::{ReviewOutcome, ReviewService};
pub use rule_store::RuleStore;
