// sala-core/src/infrastructure/adapters/mod.rs

pub mod duckdb;
pub mod heuristic;
pub mod llm;

use std::sync::Arc;
use tracing::info;

use crate::domain::project::ProjectConfig;
use crate::infrastructure::compiler::JinjaRenderer;
use crate::ports::synthesizer::SuggestionSynthesizer;

pub use self::duckdb::DuckDBConnector;
pub use heuristic::HeuristicSynthesizer;
pub use llm::LlmSynthesizer;

/// The remote synthesizer when `governance.enable_llm` is set, the heuristic one otherwise.
/// `lookup` resolves the API key variable named by `llm.api_key_env`.
pub fn build_synthesizer<F>(config: &ProjectConfig, lookup: F) -> Arc<dyn SuggestionSynthesizer>
where
    F: Fn(&str) -> Option<String>,
{
    if config.governance.enable_llm {
        info!(model = %config.llm.model, "Using LLM synthesizer");
        Arc::new(LlmSynthesizer::new(
            config.llm.clone(),
            lookup(&config.llm.api_key_env),
            Arc::new(JinjaRenderer::new()),
            &config.heuristics.flag_field,
            &config.heuristics.alert_field,
        ))
    } else {
        info!("Using heuristic synthesizer");
        Arc::new(HeuristicSynthesizer::new(config.heuristics.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_only_when_enabled() {
        let mut config = ProjectConfig::named("shop");
        assert_eq!(build_synthesizer(&config, |_| None).name(), "heuristic");
        config.governance.enable_llm = true;
        assert_eq!(build_synthesizer(&config, |_| None).name(), "llm");
    }
}
