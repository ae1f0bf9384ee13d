//! The estimation pipeline.
//!
//! Per issue: select a strategy, gather candidates, combine, score,
//! validate, and fall back when nothing valid remains. Every issue yields
//! exactly one [`CostEstimate`]; nothing on the per-issue path returns an
//! error to the caller.
//!
//! Per batch: issues run as independent tasks on a bounded worker pool.
//! Relationship analysis and totals run only once every task has finished.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cost_reference::ReferenceCostTable;
use futures::future::join_all;
use genai_provider::{
    FailureKind, GenerativeEstimateProvider, PropertyContext, ProviderOutcome, QuotaState,
    RawEstimate,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{summarize, CostSummary};
use crate::combiner::{Combination, CombinedEstimate, HybridCombiner};
use crate::confidence::{normalize_confidence, ConfidenceScorer, ScoringInput};
use crate::config::EngineConfig;
use crate::domain::{
    CandidateSource, ConfigError, CostEstimate, EstimateCandidate, EstimationMethod, Issue,
    IssueGroup, Result,
};
use crate::fallback::FallbackEstimator;
use crate::formula::FormulaBook;
use crate::relationship::{BatchSnapshot, RelationshipAnalyzer};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::strategy::{Strategy, StrategySelector};
use crate::validator::{DraftEstimate, Validation, Validator};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything produced by one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Name of the generative provider used.
    pub provider: String,
    /// One estimate per input issue, in input order.
    pub estimates: Vec<CostEstimate>,
    pub groups: Vec<IssueGroup>,
    pub summary: CostSummary,
    pub stats: StatsSnapshot,
}

impl BatchReport {
    pub fn estimate(&self, issue_id: &str) -> Option<&CostEstimate> {
        self.estimates.iter().find(|e| e.issue_id == issue_id)
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// State shared by every task of one run.
#[derive(Debug, Default)]
struct RunState {
    /// Set once the quota is known to be spent; later issues skip the provider.
    quota_stopped: AtomicBool,
    stats: EngineStats,
}

impl RunState {
    fn stop_provider_calls(&self) {
        if !self.quota_stopped.swap(true, Ordering::SeqCst) {
            warn!("generative quota exhausted; remaining issues use deterministic sources");
        }
    }

    fn provider_stopped(&self) -> bool {
        self.quota_stopped.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct EngineInner {
    config: EngineConfig,
    table: Arc<dyn ReferenceCostTable>,
    formulas: FormulaBook,
    provider: Arc<dyn GenerativeEstimateProvider>,
    quota: Arc<QuotaState>,
    selector: StrategySelector,
    combiner: HybridCombiner,
    scorer: ConfidenceScorer,
    validator: Validator,
    fallback: FallbackEstimator,
    analyzer: RelationshipAnalyzer,
}

/// Cheap to clone; clones share the same table, provider and quota.
#[derive(Clone)]
pub struct EstimationEngine {
    inner: Arc<EngineInner>,
}

impl EstimationEngine {
    /// Build an engine. Fails when `config` is invalid or when `quota` was
    /// created with a limit other than `config.daily_quota`.
    pub fn new(
        config: EngineConfig,
        table: Arc<dyn ReferenceCostTable>,
        provider: Arc<dyn GenerativeEstimateProvider>,
        quota: Arc<QuotaState>,
    ) -> Result<Self> {
        config.validate()?;
        if quota.daily_limit() != config.daily_quota {
            return Err(ConfigError::Invalid {
                field: "daily_quota".to_string(),
                reason: format!(
                    "shared quota allows {} requests per day, config says {}",
                    quota.daily_limit(),
                    config.daily_quota
                ),
            }
            .into());
        }
        let formulas = FormulaBook::default();
        let inner = EngineInner {
            selector: StrategySelector::new(
                config.strategy.clone(),
                Arc::clone(&table),
                formulas.clone(),
            ),
            combiner: HybridCombiner::new(config.blend.clone(), config.lookup_confidence_ceiling),
            scorer: ConfidenceScorer::new(config.confidence.clone(), config.max_cost_ratio),
            validator: Validator::from_config(&config),
            fallback: FallbackEstimator::from_config(&config),
            analyzer: RelationshipAnalyzer::new(config.bundling.clone()),
            config,
            table,
            formulas,
            provider,
            quota,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn quota(&self) -> &Arc<QuotaState> {
        &self.inner.quota
    }

    /// Estimate a single issue. Never fails.
    #[instrument(skip(self, issue, property), fields(issue_id = %issue.id))]
    pub async fn estimate_issue(&self, issue: &Issue, property: &PropertyContext) -> CostEstimate {
        let run = RunState::default();
        self.inner.estimate(issue, property, &run).await
    }

    /// Estimate every issue, then group and total them.
    ///
    /// A task that panics or is cancelled is replaced by a fallback
    /// estimate, so `estimates.len() == issues.len()` always holds.
    #[instrument(skip_all, fields(issues = issues.len()))]
    pub async fn estimate_batch(&self, issues: Vec<Issue>, property: PropertyContext) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        if self.inner.quota.roll_over(started_at.date_naive()) {
            info!(day = %started_at.date_naive(), "daily generative quota reset");
        }

        let run = Arc::new(RunState::default());
        let property = Arc::new(property);
        let sem = Arc::new(Semaphore::new(self.inner.config.max_concurrency));

        let mut tasks = Vec::with_capacity(issues.len());
        for issue in &issues {
            let inner = Arc::clone(&self.inner);
            let run = Arc::clone(&run);
            let property = Arc::clone(&property);
            let sem = Arc::clone(&sem);
            let issue = issue.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                inner.estimate(&issue, &property, &run).await
            }));
        }

        // Barrier: nothing below runs until every task has finished.
        let joined = join_all(tasks).await;

        let mut estimates = Vec::with_capacity(issues.len());
        for (issue, result) in issues.iter().zip(joined) {
            match result {
                Ok(estimate) => estimates.push(estimate),
                Err(e) => {
                    let reason = if e.is_panic() {
                        "estimation task panicked"
                    } else {
                        "estimation task cancelled"
                    };
                    warn!(issue_id = %issue.id, error = %e, "{reason}");
                    run.stats.record_task_failure();
                    run.stats.record_estimate(EstimationMethod::Fallback, 0);
                    estimates.push(self.inner.fallback.estimate(issue, reason));
                }
            }
        }

        let groups = self
            .inner
            .analyzer
            .analyze(&BatchSnapshot::new(&issues, &estimates));
        let group_of: HashMap<&str, &str> = groups
            .iter()
            .flat_map(|g| g.members.iter().map(move |m| (m.as_str(), g.group_id.as_str())))
            .collect();
        for estimate in &mut estimates {
            estimate.group_id = group_of.get(estimate.issue_id.as_str()).map(|g| g.to_string());
        }

        let summary = summarize(&estimates, &groups);
        run.stats.flush();
        info!(
            run_id = %run_id,
            issues = estimates.len(),
            groups = groups.len(),
            total_low = summary.total_low,
            total_high = summary.total_high,
            "batch complete"
        );

        BatchReport {
            run_id,
            started_at,
            completed_at: Utc::now(),
            provider: self.inner.provider.name().to_string(),
            estimates,
            groups,
            summary,
            stats: run.stats.snapshot(),
        }
    }
}

impl EngineInner {
    async fn estimate(&self, issue: &Issue, property: &PropertyContext, run: &RunState) -> CostEstimate {
        let decision = self.selector.select(issue);
        info!(
            issue_id = %issue.id,
            strategy = %decision.strategy,
            reason = %decision.reason,
            "strategy selected"
        );

        let deterministic = match decision.strategy {
            Strategy::Lookup | Strategy::Hybrid => self
                .table
                .lookup(issue.category(), &issue.lookup_attributes())
                .map(|range| EstimateCandidate::range(CandidateSource::Lookup, range.low, range.high)),
            Strategy::Formula => self.formulas.estimate(issue),
            Strategy::Generative => None,
        };

        let mut notes = Vec::new();
        let generative = if decision.strategy.uses_provider() {
            match self.generative_candidate(issue, property, run).await {
                Ok(candidate) => Some(candidate),
                Err(note) => {
                    notes.push(note);
                    None
                }
            }
        } else {
            None
        };

        let mut combined = match self.combiner.combine(deterministic, generative, issue.category()) {
            Combination::Combined(combined) => combined,
            Combination::NoCandidate => {
                let reason = notes
                    .pop()
                    .unwrap_or_else(|| "no estimate source available".to_string());
                run.stats.record_estimate(EstimationMethod::Fallback, 0);
                return self.fallback.estimate(issue, &reason);
            }
        };

        if let Some(adjusted) = self.config.market.adjust(issue, combined.low, combined.high) {
            combined.low = adjusted.low;
            combined.high = adjusted.high;
            combined.assumptions.push(adjusted.note);
        }

        self.finalize(issue, combined, notes, run)
    }

    /// Score and validate a combined estimate.
    fn finalize(
        &self,
        issue: &Issue,
        combined: CombinedEstimate,
        notes: Vec<String>,
        run: &RunState,
    ) -> CostEstimate {
        let breakdown = self.scorer.score(&ScoringInput {
            issue,
            low: combined.low,
            high: combined.high,
            method: combined.method,
            reasoning: &combined.reasoning,
            assumption_count: combined.assumptions.len(),
            risk_factor_count: combined.risk_factors.len(),
            stated_confidence: combined.stated_confidence,
            agreement: combined.agreement,
        });
        let confidence = match combined.confidence_ceiling {
            Some(ceiling) => breakdown.overall.min(ceiling),
            None => breakdown.overall,
        };

        match self
            .validator
            .validate(DraftEstimate::new(combined.low, combined.high, confidence))
        {
            Validation::Valid {
                draft,
                corrections,
                warnings,
                needs_review,
            } => {
                let mut all_warnings = notes;
                all_warnings.extend(warnings);
                let needs_review = needs_review
                    || all_warnings.len() > self.config.max_warnings_before_review;
                run.stats.record_estimate(combined.method, corrections.len());
                debug!(
                    issue_id = %issue.id,
                    method = %combined.method,
                    low = draft.low,
                    high = draft.high,
                    confidence = draft.confidence,
                    "estimate finalized"
                );

                CostEstimate {
                    issue_id: issue.id.clone(),
                    item: issue.item(),
                    estimated_low: draft.low,
                    estimated_high: draft.high,
                    confidence: draft.confidence,
                    method: combined.method,
                    reasoning: combined.reasoning,
                    assumptions: combined.assumptions,
                    risk_factors: combined.risk_factors,
                    group_id: None,
                    confidence_breakdown: Some(breakdown),
                    corrections: corrections.iter().map(|c| c.to_string()).collect(),
                    warnings: all_warnings,
                    needs_review,
                }
            }
            Validation::Invalid { rule, reason } => {
                run.stats.record_estimate(EstimationMethod::Fallback, 0);
                self.fallback
                    .estimate(issue, &format!("validation failed ({}): {reason}", rule.as_str()))
            }
        }
    }

    /// Ask the provider, honoring the run stop flag, the daily quota and
    /// the per-call timeout. `Err` carries a note explaining why no
    /// candidate was produced.
    async fn generative_candidate(
        &self,
        issue: &Issue,
        property: &PropertyContext,
        run: &RunState,
    ) -> std::result::Result<EstimateCandidate, String> {
        if run.provider_stopped() {
            run.stats.record_skipped();
            return Err("generative estimate skipped: quota exhausted for this run".to_string());
        }
        if let Err(e) = self.quota.try_acquire() {
            run.stats.record_skipped();
            run.stats.record_quota_exhausted();
            run.stop_provider_calls();
            return Err(format!("generative estimate skipped: {e}"));
        }

        let request = issue.to_request(property);
        let outcome = match tokio::time::timeout(
            self.config.provider_timeout(),
            self.provider.estimate(&request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ProviderOutcome::failure(FailureKind::Timeout),
        };
        // Providers may build estimates directly, so every success is re-checked.
        let outcome = match outcome {
            ProviderOutcome::Success(raw) => raw.into_outcome(),
            other => other,
        };
        run.stats.record_outcome(&outcome);

        match outcome {
            ProviderOutcome::Success(raw) => Ok(candidate_from_raw(&issue.id, raw)),
            ProviderOutcome::Incomplete { missing } => {
                warn!(
                    issue_id = %issue.id,
                    provider = self.provider.name(),
                    missing = %missing.join("; "),
                    "generative response incomplete; discarded"
                );
                Err(format!("generative response incomplete: {}", missing.join("; ")))
            }
            ProviderOutcome::Failure { kind } => {
                warn!(
                    issue_id = %issue.id,
                    provider = self.provider.name(),
                    kind = %kind,
                    "generative provider failed"
                );
                if kind == FailureKind::QuotaExhausted {
                    run.stop_provider_calls();
                }
                Err(format!("generative provider failure: {kind}"))
            }
        }
    }
}

/// The provider's confidence is normalized here, on entry.
fn candidate_from_raw(issue_id: &str, raw: RawEstimate) -> EstimateCandidate {
    let stated_confidence = normalize_confidence(raw.reported_confidence);
    if stated_confidence.is_none() {
        warn!(issue_id, value = raw.reported_confidence, "unusable generative confidence discarded");
    }
    EstimateCandidate {
        low: raw.estimated_low,
        high: raw.estimated_high,
        reasoning: Some(raw.reasoning),
        assumptions: raw.assumptions,
        risk_factors: raw.risk_factors,
        stated_confidence,
        source: CandidateSource::Generative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cost_reference::CostCatalog;
    use genai_provider::fakes::{ScriptedProvider, StaticProvider, UnavailableProvider};

    use crate::domain::Complexity;

    fn engine(provider: Arc<dyn GenerativeEstimateProvider>) -> EstimationEngine {
        EstimationEngine::new(
            EngineConfig::default(),
            Arc::new(CostCatalog::builtin()),
            provider,
            Arc::new(QuotaState::new(100)),
        )
        .unwrap()
    }

    #[test]
    fn test_candidate_from_raw_normalizes_percent() {
        let raw = genai_provider::fakes::valid_estimate(100.0, 300.0, 85.0);
        let candidate = candidate_from_raw("i", raw);
        assert_eq!(candidate.stated_confidence, Some(0.85));
        assert_eq!(candidate.source, CandidateSource::Generative);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.max_concurrency = 0;
        assert!(EstimationEngine::new(
            config,
            Arc::new(CostCatalog::builtin()),
            Arc::new(UnavailableProvider::new()),
            Arc::new(QuotaState::new(1)),
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_lookup_path_does_not_call_provider() {
        let provider = Arc::new(UnavailableProvider::new());
        let engine = engine(provider.clone());
        let issue = Issue::new("a", "plumbing", 0.95, "Faucet drips at the kitchen sink")
            .with_complexity(Complexity::Low);

        let estimate = engine.estimate_issue(&issue, &PropertyContext::default()).await;
        assert_eq!(estimate.method, EstimationMethod::Lookup);
        assert!(estimate.confidence <= 0.6);
        assert!(estimate.confidence_breakdown.is_some());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_hybrid_without_provider_keeps_lookup_range() {
        let engine = engine(Arc::new(UnavailableProvider::new()));
        let issue = Issue::new("a", "roof", 0.6, "Worn shingles on the south slope");
        let estimate = engine.estimate_issue(&issue, &PropertyContext::default()).await;
        assert_eq!(estimate.method, EstimationMethod::Lookup);
        assert!(estimate.warnings[0].contains("unavailable"));
    }

    #[tokio::test]
    async fn test_generative_success() {
        let engine = engine(Arc::new(StaticProvider::success(400.0, 900.0, 0.8)));
        let issue = Issue::new("a", "pool equipment", 0.9, "Pump motor hums and trips breaker");
        let estimate = engine.estimate_issue(&issue, &PropertyContext::default()).await;
        assert_eq!(estimate.method, EstimationMethod::Generative);
        assert_eq!((estimate.estimated_low, estimate.estimated_high), (400.0, 900.0));
        assert!(estimate.satisfies_invariants(10.0));
    }

    #[tokio::test]
    async fn test_incomplete_response_falls_back() {
        let provider = ScriptedProvider::new().with_default(ProviderOutcome::Incomplete {
            missing: vec!["reasoning shorter than 100 characters".into()],
        });
        let engine = engine(Arc::new(provider));
        let issue = Issue::new("a", "pool equipment", 0.9, "Pump motor hums");
        let estimate = engine.estimate_issue(&issue, &PropertyContext::default()).await;
        assert_eq!(estimate.method, EstimationMethod::Fallback);
        assert!(estimate.warnings[0].contains("incomplete"));
    }

    #[tokio::test]
    async fn test_batch_attaches_group_ids() {
        let engine = engine(Arc::new(UnavailableProvider::new()));
        let issues = vec![
            Issue::new("a", "plumbing", 0.95, "Faucet loose at base")
                .with_complexity(Complexity::Low)
                .with_location("Kitchen"),
            Issue::new("b", "plumbing", 0.95, "Slow drain at sink")
                .with_complexity(Complexity::Low)
                .with_location("Kitchen"),
        ];
        let report = engine.estimate_batch(issues, PropertyContext::default()).await;
        assert_eq!(report.estimates.len(), 2);
        assert_eq!(report.groups.len(), 1);
        let gid = &report.groups[0].group_id;
        assert!(report.estimates.iter().all(|e| e.group_id.as_ref() == Some(gid)));
        assert_eq!(report.provider, "unavailable");
        assert_eq!(report.stats.issues_estimated, 2);
    }
}
