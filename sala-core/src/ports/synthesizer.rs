// sala-core/src/ports/synthesizer.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use miette::Diagnostic;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::compliance::{DatasetProfile, DriftReport, OutlierReport};
use crate::domain::dataset::Dataset;
use crate::domain::governance::CandidateSuggestion;
use crate::domain::report::TransformAudit;
use crate::domain::rules::Rule;

/// Everything a synthesizer may look at for one run.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceBundle {
    pub run_id: String,
    pub run_date: NaiveDate,
    pub row_count: usize,
    pub audits: Vec<TransformAudit>,
    pub outliers: Vec<OutlierReport>,
    pub drift: Vec<DriftReport>,
    pub profile: DatasetProfile,
    /// Curated rows, for synthesizers that scan values. Never sent over the wire.
    #[serde(skip)]
    pub dataset: Arc<Dataset>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum SynthesisError {
    #[error("HTTP request failed: {0}")]
    #[diagnostic(code(sala::synthesis::http))]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {body}")]
    #[diagnostic(code(sala::synthesis::api))]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    #[diagnostic(code(sala::synthesis::parse))]
    Parse(String),

    #[error("synthesizer not configured: {0}")]
    #[diagnostic(
        code(sala::synthesis::not_configured),
        help("Set the API key variable named by llm.api_key_env, or disable governance.enable_llm.")
    )]
    NotConfigured(String),

    #[error("synthesizer did not answer within {0}s")]
    #[diagnostic(code(sala::synthesis::timeout))]
    Timeout(u64),
}

/// Source of candidate rules. Pure request/response: implementations never
/// touch the caller's rule set or baseline.
#[async_trait]
pub trait SuggestionSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        evidence: &EvidenceBundle,
        existing_rules: &[Rule],
    ) -> Result<Vec<CandidateSuggestion>, SynthesisError>;

    fn name(&self) -> &str;
}
