// sala-core/src/infrastructure/adapters/llm.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::application::ports::TemplateEngine;
use crate::domain::governance::{CandidateSuggestion, LlmConfig};
use crate::domain::rules::{Rule, RuleDraft};
use crate::ports::synthesizer::{EvidenceBundle, SuggestionSynthesizer, SynthesisError};

pub const LLM_SOURCE: &str = "llm";

const SYSTEM_PROMPT: &str = "You are a data quality engineer. You only answer with a JSON array.";

const PROMPT_TEMPLATE: &str = r#"Run {{ run_id }} on {{ run_date }} processed {{ row_count }} rows.

Column profile:
{{ profile }}

Rules already active (do not repeat them):
{% for rule in rules %}- {{ rule }}
{% else %}- none
{% endfor %}
Rule firings this run:
{{ audits }}

IQR outliers:
{{ outliers }}

Drift against the rolling baseline:
{{ drift }}

Propose new data quality rules. Answer with a JSON array where each element is
{"title": str, "if": condition, "then": "<assign|impute|compute> <field> = <expression>", "reason": str, "confidence": 0..1}.
Conditions support IS NULL, IS NOT NULL, == != < <= > >=, AND, OR, NOT, parentheses.
Expressions support literals, field names, + - * /, mean(field), median(field).
Use '{{ flag_field }}' or '{{ alert_field }}' as target for flags and alerts.
Compare dates as ISO strings, e.g. order_date > '{{ run_date }}'."#;

/// One element of the model's answer.
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    title: String,
    #[serde(rename = "if", default)]
    condition: String,
    #[serde(rename = "then", default)]
    action: Option<String>,
    #[serde(default)]
    rule: Option<RuleDraft>,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: f64,
}

impl RawSuggestion {
    fn into_candidate(self) -> CandidateSuggestion {
        let rule = match (self.rule, self.action) {
            (Some(rule), _) => rule,
            (None, Some(action)) => RuleDraft::from_action(&self.condition, &action)
                // Kept malformed so that governance records the rejection.
                .unwrap_or_else(|_| RuleDraft {
                    kind: action,
                    condition: self.condition.clone(),
                    target_field: String::new(),
                    expression: String::new(),
                }),
            (None, None) => RuleDraft {
                kind: String::new(),
                condition: self.condition.clone(),
                target_field: String::new(),
                expression: String::new(),
            },
        };
        CandidateSuggestion {
            title: self.title,
            rule,
            reason: self.reason,
            confidence: self.confidence,
        }
    }
}

/// Remote synthesizer over an OpenAI-compatible chat completion endpoint.
pub struct LlmSynthesizer {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
    renderer: Arc<dyn TemplateEngine>,
    flag_field: String,
    alert_field: String,
}

impl LlmSynthesizer {
    pub fn new(
        config: LlmConfig,
        api_key: Option<String>,
        renderer: Arc<dyn TemplateEngine>,
        flag_field: &str,
        alert_field: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            renderer,
            flag_field: flag_field.to_string(),
            alert_field: alert_field.to_string(),
        }
    }

    fn prompt(&self, evidence: &EvidenceBundle, rules: &[Rule]) -> Result<String, SynthesisError> {
        let context = json!({
            "run_id": evidence.run_id,
            "run_date": evidence.run_date.format("%Y-%m-%d").to_string(),
            "row_count": evidence.row_count,
            "profile": pretty(&evidence.profile),
            "audits": pretty(&evidence.audits),
            "outliers": pretty(&evidence.outliers),
            "drift": pretty(&evidence.drift),
            "rules": rules.iter().map(Rule::describe).collect::<Vec<_>>(),
            "flag_field": self.flag_field,
            "alert_field": self.alert_field,
        });
        self.renderer
            .render(PROMPT_TEMPLATE, &context)
            .map_err(|e| SynthesisError::Parse(format!("prompt rendering failed: {}", e)))
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, SynthesisError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        debug!("LLM request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api { status, body });
        }

        let resp: Json = response.json().await?;
        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SynthesisError::Parse("missing choices[0].message.content".into()))
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// First JSON array in `content`; models like to wrap it in prose or fences.
pub fn parse_candidates(content: &str) -> Result<Vec<CandidateSuggestion>, SynthesisError> {
    let start = content
        .find('[')
        .ok_or_else(|| SynthesisError::Parse("no JSON array in the reply".into()))?;
    let first = serde_json::Deserializer::from_str(&content[start..])
        .into_iter::<Vec<Json>>()
        .next()
        .ok_or_else(|| SynthesisError::Parse("empty reply".into()))?
        .map_err(|e| SynthesisError::Parse(e.to_string()))?;

    let mut candidates = Vec::new();
    for element in first {
        match serde_json::from_value::<RawSuggestion>(element) {
            Ok(raw) => candidates.push(raw.into_candidate()),
            Err(e) => warn!(error = %e, "Unusable suggestion element skipped"),
        }
    }
    Ok(candidates)
}

#[async_trait]
impl SuggestionSynthesizer for LlmSynthesizer {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn synthesize(
        &self,
        evidence: &EvidenceBundle,
        existing_rules: &[Rule],
    ) -> Result<Vec<CandidateSuggestion>, SynthesisError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SynthesisError::NotConfigured(format!("{} is not set", self.config.api_key_env))
        })?;
        let prompt = self.prompt(evidence, existing_rules)?;
        let content = self.complete(api_key, &prompt).await?;
        let candidates = parse_candidates(&content)?;
        debug!(candidates = candidates.len(), "LLM candidates parsed");
        Ok(candidates)
    }

    fn name(&self) -> &str {
        LLM_SOURCE
    }
}
