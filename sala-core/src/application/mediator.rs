// sala-core/src/application/mediator.rs

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::application::executor::RuleExecutor;
use crate::application::rule_store::{RuleAddition, RuleStore};
use crate::domain::compliance::{
    AnomalyDetector, Baseline, DatasetProfile, DriftMonitor, MonitoringConfig,
};
use crate::domain::dataset::Dataset;
use crate::domain::error::DomainError;
use crate::domain::governance::{
    CandidateSuggestion, GovernanceConfig, GovernancePolicy, Suggestion, SuggestionStatus, dedupe,
};
use crate::domain::ports::{ArtifactStore, BaselineRepository};
use crate::domain::project::ProjectConfig;
use crate::domain::report::{InsightEntry, RunReport, RunWarning, new_run_id};
use crate::domain::rules::{Provenance, Rule};
use crate::error::SalaError;
use crate::ports::synthesizer::{EvidenceBundle, SuggestionSynthesizer, SynthesisError};

pub struct RunOutcome {
    pub report: RunReport,
    pub curated: Dataset,
}

/// Sole writer of the rule store, the baselines and the run artifacts.
pub struct Mediator {
    dataset_id: String,
    governance: GovernanceConfig,
    monitoring: MonitoringConfig,
    executor: RuleExecutor,
    detector: AnomalyDetector,
    monitor: DriftMonitor,
    policy: GovernancePolicy,
    rules: Arc<RuleStore>,
    baselines: Arc<dyn BaselineRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    synthesizer: Arc<dyn SuggestionSynthesizer>,
}

impl Mediator {
    pub fn new(
        config: &ProjectConfig,
        rules: Arc<RuleStore>,
        baselines: Arc<dyn BaselineRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        synthesizer: Arc<dyn SuggestionSynthesizer>,
    ) -> Self {
        Self {
            dataset_id: config.dataset.clone(),
            governance: config.governance.clone(),
            monitoring: config.monitoring.clone(),
            executor: RuleExecutor::new(config.executor.lineage_columns),
            detector: AnomalyDetector::from_config(&config.monitoring),
            monitor: DriftMonitor::from_config(&config.monitoring),
            policy: GovernancePolicy::from_config(&config.governance),
            rules,
            baselines,
            artifacts,
            synthesizer,
        }
    }

    /// One full run: execute, measure, synthesize, govern, commit, report.
    #[instrument(skip(self, dataset), fields(rows = dataset.len(), dataset = %self.dataset_id))]
    pub async fn run(&self, dataset: Dataset, source: &str) -> Result<RunOutcome, SalaError> {
        if dataset.columns().is_empty() {
            return Err(SalaError::UnreadableDataset(format!("{} has no columns", source)));
        }
        let started = Utc::now();
        let run_id = new_run_id(started);
        let mut warnings = Vec::new();

        // 1. Read-only snapshots for the whole run
        let active = self.rules.active()?;
        let prior_baseline = self.baselines.load(&self.dataset_id)?;
        info!(run_id = %run_id, rule_set = active.version, baseline = prior_baseline.is_some(), "Run started");

        // 2. Rules
        let execution = self.executor.apply(&dataset, &active.rules);
        let curated = Arc::new(execution.curated);
        for audit in execution.audits.iter().filter(|a| a.error.is_some()) {
            warnings.push(RunWarning::new(
                "rule_skipped",
                format!("{}: {}", audit.rule_id, audit.error.as_deref().unwrap_or_default()),
            ));
        }

        // 3-4. Statistics against the pre-run baseline
        let columns = self.monitoring.resolve(&curated);
        let outliers = self.detector.detect(&curated, &columns.measures);
        let drift = self.monitor.measure(&curated, &columns, prior_baseline.as_ref());
        debug!(outliers = outliers.len(), drift = drift.len(), "Statistics computed");

        // 5. Synthesis (the only suspension point)
        let evidence = EvidenceBundle {
            run_id: run_id.clone(),
            run_date: started.date_naive(),
            row_count: curated.len(),
            audits: execution.audits.clone(),
            outliers: outliers.clone(),
            drift: drift.clone(),
            profile: DatasetProfile::of(&curated),
            dataset: Arc::clone(&curated),
        };
        let candidates = match self.synthesize(&evidence, &active.rules).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, synthesizer = self.synthesizer.name(), "Synthesis unavailable, continuing without suggestions");
                warnings.push(RunWarning::new("synthesis_unavailable", e.to_string()));
                Vec::new()
            }
        };
        drop(evidence);
        let curated = Arc::unwrap_or_clone(curated);
        let candidate_count = candidates.len();

        // 6-7. Dedupe + governance
        let mut suggestions: Vec<Suggestion> = candidates
            .into_iter()
            .map(|c| Suggestion::proposed(c, &run_id, self.synthesizer.name()))
            .collect();
        let summary = dedupe(&mut suggestions, &active.signatures());
        let auto_accepted = self.policy.govern(&mut suggestions);
        info!(
            candidates = candidate_count,
            survivors = summary.survivors,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            auto_accepted = auto_accepted.len(),
            "Suggestions governed"
        );

        // 8. Commit (critical section): rules, then baseline, then artifacts
        let _guard = self.rules.commit_guard()?;
        // Blend against the latest committed baseline, not the one read at run start.
        let latest = self.baselines.load(&self.dataset_id)?;
        let next_baseline = DriftMonitor::update(
            latest.as_ref(),
            &curated,
            &columns,
            self.governance.baseline_history_window,
        );
        let committed_version =
            self.commit_rules(&run_id, active.version, &mut suggestions, &auto_accepted)?;

        let report = RunReport {
            run_id: run_id.clone(),
            timestamp: started,
            dataset: self.dataset_id.clone(),
            source: source.to_string(),
            row_count: curated.len(),
            rule_set_version: active.version,
            committed_rule_set_version: committed_version,
            baseline_present: prior_baseline.is_some(),
            audits: execution.audits,
            outliers,
            drift,
            suggestions,
            warnings,
        };

        self.persist(&report, &next_baseline, candidate_count)?;
        info!(run_id = %run_id, "Run report written");

        Ok(RunOutcome { report, curated })
    }

    async fn synthesize(
        &self,
        evidence: &EvidenceBundle,
        rules: &[Rule],
    ) -> Result<Vec<CandidateSuggestion>, SynthesisError> {
        let secs = self.governance.synthesis_timeout_secs;
        tokio::time::timeout(
            Duration::from_secs(secs),
            self.synthesizer.synthesize(evidence, rules),
        )
        .await
        .map_err(|_| SynthesisError::Timeout(secs))?
    }

    /// Writes the rule snapshot when something was auto-accepted. A conflict
    /// surviving one retry aborts the run before anything is written.
    fn commit_rules(
        &self,
        run_id: &str,
        base_version: u64,
        suggestions: &mut [Suggestion],
        auto_accepted: &[usize],
    ) -> Result<Option<u64>, SalaError> {
        if auto_accepted.is_empty() {
            return Ok(None);
        }
        let additions: Vec<RuleAddition> = auto_accepted
            .iter()
            .map(|&idx| RuleAddition {
                draft: suggestions[idx].rule.clone(),
                confidence: suggestions[idx].confidence,
                provenance: Provenance::AutoAccepted,
            })
            .collect();

        let outcome = match self.rules.commit_with_retry(
            base_version,
            &additions,
            Some(run_id.to_string()),
        ) {
            Ok(outcome) => outcome,
            Err(DomainError::PersistenceConflict { expected, found }) => {
                return Err(SalaError::RunIncomplete {
                    run_id: run_id.to_string(),
                    reason: format!(
                        "rule set still moving after retry (expected v{}, found v{})",
                        expected, found
                    ),
                });
            }
            Err(e) => return Err(e.into()),
        };

        for (idx, rule_id) in &outcome.merged {
            let suggestion = &mut suggestions[auto_accepted[*idx]];
            suggestion.transition(SuggestionStatus::Applied, Some(format!("merged as {}", rule_id)))?;
            suggestion.applied_rule_id = Some(rule_id.clone());
        }
        for idx in &outcome.skipped {
            suggestions[auto_accepted[*idx]].transition(
                SuggestionStatus::Duplicate,
                Some("equivalent rule committed concurrently".into()),
            )?;
        }
        Ok(outcome.snapshot.map(|s| s.version))
    }

    /// Baseline, then report, insight and pending batch. Once any state is on
    /// disk a failure leaves the run incomplete rather than plainly failed.
    fn persist(&self, report: &RunReport, baseline: &Baseline, candidates: usize) -> Result<(), SalaError> {
        let incomplete = |reason: String| SalaError::RunIncomplete {
            run_id: report.run_id.clone(),
            reason,
        };

        if let Err(e) = self.baselines.save(&self.dataset_id, baseline) {
            return match report.committed_rule_set_version {
                Some(version) => Err(incomplete(format!(
                    "rule set v{} committed but baseline not saved: {}",
                    version, e
                ))),
                None => Err(e.into()),
            };
        }
        self.publish(report, candidates).map_err(|e| {
            warn!(run_id = %report.run_id, error = %e, "Run artifacts not written");
            incomplete(format!("state committed but run artifacts not written: {}", e))
        })
    }

    fn publish(&self, report: &RunReport, candidates: usize) -> Result<(), SalaError> {
        self.artifacts.write_report(report)?;

        let warning = report
            .warnings
            .iter()
            .find(|w| w.code == "synthesis_unavailable")
            .map(|w| w.message.clone());
        self.artifacts.append_insight(&InsightEntry {
            run_id: report.run_id.clone(),
            timestamp: report.timestamp,
            synthesizer: self.synthesizer.name().to_string(),
            row_count: report.row_count,
            candidates,
            statuses: report.status_counts(),
            warning,
        })?;

        let pending: BTreeMap<String, Suggestion> = report
            .suggestions
            .iter()
            .filter(|s| s.status == SuggestionStatus::Accepted)
            .map(|s| (s.id.clone(), s.clone()))
            .collect();
        if !pending.is_empty() {
            self.artifacts.replace_pending(&pending)?;
        }
        Ok(())
    }
}
