//! Batch execution: worker pool, quota, timeouts and task failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cost_reference::CostCatalog;
use estimator_core::{
    Complexity, ConfigError, EngineConfig, EstimationEngine, EstimationMethod, EstimatorError,
    Issue,
};
use genai_provider::fakes::{valid_estimate, ScriptedProvider, StaticProvider, UnavailableProvider};
use genai_provider::{
    EstimateRequest, FailureKind, GenerativeEstimateProvider, PropertyContext, ProviderOutcome,
    QuotaState,
};

fn engine(
    config: EngineConfig,
    provider: Arc<dyn GenerativeEstimateProvider>,
    quota: u64,
) -> EstimationEngine {
    EstimationEngine::new(
        config.with_daily_quota(quota),
        Arc::new(CostCatalog::builtin()),
        provider,
        Arc::new(QuotaState::new(quota)),
    )
    .unwrap()
}

/// Issues whose category has no table entry, so they route to the provider.
fn generative_issues(n: usize) -> Vec<Issue> {
    (0..n)
        .map(|i| Issue::new(format!("gen-{i:02}"), "pool equipment", 0.9, "Pump motor hums"))
        .collect()
}

fn mixed_issues() -> Vec<Issue> {
    vec![
        Issue::new("m-01", "plumbing", 0.95, "Faucet drips").with_complexity(Complexity::Low),
        Issue::new("m-02", "roof", 0.6, "Worn shingles near ridge"),
        Issue::new("m-03", "interior", 0.7, "Repaint 150 sq ft of hallway walls"),
        Issue::new("m-04", "hvac", 0.2, "Unit makes noise"),
        Issue::new("m-05", "pool equipment", 0.9, "Heater will not ignite"),
        Issue::new("m-06", "electrical", 85.0, "Possible aluminum branch wiring"),
        Issue::new("m-07", "foundation", 0.9, "Step crack in block wall")
            .with_complexity(Complexity::High),
        Issue::new("m-08", "", 0.0, ""),
        Issue::new("m-09", "windows", 0.8, "Failed seal, fogged glass").with_complexity(Complexity::Low),
        Issue::new("m-10", "exterior", 0.5, "Fence sagging for 40 linear feet"),
    ]
}

// ---- coverage ----

#[tokio::test]
async fn every_issue_gets_exactly_one_valid_estimate() {
    let engine = engine(EngineConfig::default(), Arc::new(UnavailableProvider::new()), 100);
    let issues = mixed_issues();
    let ids: Vec<String> = issues.iter().map(|i| i.id.clone()).collect();

    let report = engine.estimate_batch(issues, PropertyContext::default()).await;

    assert_eq!(report.estimates.len(), ids.len());
    let report_ids: Vec<String> = report.estimates.iter().map(|e| e.issue_id.clone()).collect();
    assert_eq!(report_ids, ids, "estimates keep input order");
    for estimate in &report.estimates {
        assert!(
            estimate.satisfies_invariants(engine.config().max_cost_ratio),
            "{} violates invariants: {:?}",
            estimate.issue_id,
            estimate
        );
    }
    assert_eq!(report.summary.issue_count, ids.len());
    assert_eq!(report.stats.issues_estimated, ids.len() as u64);
}

#[tokio::test]
async fn concurrency_limit_does_not_change_results() {
    let provider = Arc::new(StaticProvider::success(300.0, 700.0, 0.8));
    let serial = engine(EngineConfig::default().with_max_concurrency(1), provider.clone(), 100);
    let parallel = engine(EngineConfig::default().with_max_concurrency(8), provider, 100);

    let a = serial.estimate_batch(mixed_issues(), PropertyContext::default()).await;
    let b = parallel.estimate_batch(mixed_issues(), PropertyContext::default()).await;

    for (x, y) in a.estimates.iter().zip(&b.estimates) {
        assert_eq!(x.issue_id, y.issue_id);
        assert_eq!(x.method, y.method);
        assert_eq!(x.estimated_low, y.estimated_low);
        assert_eq!(x.estimated_high, y.estimated_high);
    }
    assert_eq!(a.groups, b.groups);
}

// ---- quota ----

#[tokio::test]
async fn local_quota_stops_provider_calls() {
    let provider = Arc::new(StaticProvider::success(300.0, 700.0, 0.8));
    let engine = engine(EngineConfig::default(), provider.clone(), 2);

    let report = engine.estimate_batch(generative_issues(6), PropertyContext::default()).await;

    assert_eq!(provider.call_count(), 2);
    assert_eq!(report.stats.provider_success, 2);
    assert_eq!(report.stats.provider_skipped, 4);
    assert_eq!(report.summary.method_counts[&EstimationMethod::Generative], 2);
    assert_eq!(report.summary.method_counts[&EstimationMethod::Fallback], 4);
    assert!(engine.quota().is_exhausted());
}

#[test]
fn shared_quota_must_match_configured_limit() {
    let result = EstimationEngine::new(
        EngineConfig::default().with_daily_quota(1),
        Arc::new(CostCatalog::builtin()),
        Arc::new(UnavailableProvider::new()),
        Arc::new(QuotaState::new(100)),
    );
    assert!(matches!(
        result,
        Err(EstimatorError::Config(ConfigError::Invalid { ref field, .. })) if field == "daily_quota"
    ));
}

#[tokio::test]
async fn configured_daily_quota_limits_provider_calls() {
    let provider = Arc::new(StaticProvider::success(300.0, 700.0, 0.8));
    let config = EngineConfig::default().with_daily_quota(1);
    let quota = Arc::new(QuotaState::new(config.daily_quota));
    let engine =
        EstimationEngine::new(config, Arc::new(CostCatalog::builtin()), provider.clone(), quota)
            .unwrap();

    let report = engine.estimate_batch(generative_issues(4), PropertyContext::default()).await;

    assert_eq!(provider.call_count(), 1);
    assert_eq!(report.stats.provider_skipped, 3);
}

#[tokio::test]
async fn provider_quota_exhaustion_stops_the_run() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then(ProviderOutcome::failure(FailureKind::QuotaExhausted))
            .with_default(ProviderOutcome::Success(valid_estimate(300.0, 700.0, 0.8))),
    );
    let engine = engine(EngineConfig::default().with_max_concurrency(1), provider.clone(), 100);

    let report = engine.estimate_batch(generative_issues(5), PropertyContext::default()).await;

    assert_eq!(provider.call_count(), 1);
    assert_eq!(report.stats.quota_exhausted, 1);
    assert_eq!(report.stats.provider_skipped, 4);
    assert!(report
        .estimates
        .iter()
        .all(|e| e.method == EstimationMethod::Fallback));
}

#[tokio::test]
async fn deterministic_paths_continue_after_quota_stop() {
    let provider = Arc::new(StaticProvider::success(300.0, 700.0, 0.8));
    let engine = engine(EngineConfig::default().with_max_concurrency(1), provider, 0);
    let issues = vec![
        Issue::new("a", "plumbing", 0.95, "Faucet drips").with_complexity(Complexity::Low),
        Issue::new("b", "roof", 0.6, "Worn shingles near ridge"),
        Issue::new("c", "pool equipment", 0.9, "Pump motor hums"),
    ];

    let report = engine.estimate_batch(issues, PropertyContext::default()).await;

    assert_eq!(report.estimate("a").unwrap().method, EstimationMethod::Lookup);
    assert_eq!(report.estimate("b").unwrap().method, EstimationMethod::Lookup);
    assert_eq!(report.estimate("c").unwrap().method, EstimationMethod::Fallback);
}

// ---- timeouts and failures ----

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out_to_fallback() {
    let provider = Arc::new(
        StaticProvider::success(300.0, 700.0, 0.8).with_delay(Duration::from_secs(120)),
    );
    let config = EngineConfig::default().with_provider_timeout(Duration::from_secs(5));
    let engine = engine(config, provider, 100);

    let report = engine.estimate_batch(generative_issues(3), PropertyContext::default()).await;

    assert!(report
        .estimates
        .iter()
        .all(|e| e.method == EstimationMethod::Fallback));
    assert!(report.estimates[0].warnings[0].contains("timeout"));
    assert_eq!(report.stats.provider_failure, 3);
}

/// Panics for one issue id, succeeds for the rest.
struct PanickingProvider {
    poison: String,
}

#[async_trait]
impl GenerativeEstimateProvider for PanickingProvider {
    async fn estimate(&self, request: &EstimateRequest) -> ProviderOutcome {
        if request.issue_id == self.poison {
            panic!("provider blew up");
        }
        ProviderOutcome::Success(valid_estimate(300.0, 700.0, 0.8))
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

#[tokio::test]
async fn panicking_task_is_replaced_by_fallback() {
    let provider = Arc::new(PanickingProvider {
        poison: "gen-01".to_string(),
    });
    let engine = engine(EngineConfig::default(), provider, 100);

    let report = engine.estimate_batch(generative_issues(3), PropertyContext::default()).await;

    assert_eq!(report.estimates.len(), 3);
    let poisoned = report.estimate("gen-01").unwrap();
    assert_eq!(poisoned.method, EstimationMethod::Fallback);
    assert!(poisoned.warnings[0].contains("panicked"));
    assert_eq!(report.estimate("gen-00").unwrap().method, EstimationMethod::Generative);
    assert_eq!(report.stats.task_failures, 1);
    assert_eq!(report.provider, "panicking");
}
