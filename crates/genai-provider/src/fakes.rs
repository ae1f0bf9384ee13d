//! In-memory fakes for the provider trait (testing only)
//!
//! Provides `ScriptedProvider`, `StaticProvider` and `UnavailableProvider`
//! that satisfy the [`GenerativeEstimateProvider`] contract without any
//! network access.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::outcome::{FailureKind, ProviderOutcome, RawEstimate};
use crate::provider::GenerativeEstimateProvider;
use crate::request::EstimateRequest;

/// A `RawEstimate` that passes every validation rule.
pub fn valid_estimate(low: f64, high: f64, reported_confidence: f64) -> RawEstimate {
    RawEstimate {
        estimated_low: low,
        estimated_high: high,
        reasoning: "Licensed contractor labor of roughly four to six hours plus materials \
                    priced at current regional market rates, including disposal and permit fees."
            .to_string(),
        assumptions: vec![
            "Work is accessible without demolition".to_string(),
            "Standard grade materials".to_string(),
            "No additional code upgrades required".to_string(),
        ],
        risk_factors: vec![
            "Concealed damage found during repair".to_string(),
            "Material price volatility".to_string(),
        ],
        reported_confidence,
    }
}

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

/// Replays scripted outcomes.
///
/// Outcomes registered for a specific issue id win; otherwise the queue is
/// consumed in call order; once it is empty the default outcome is returned.
#[derive(Debug)]
pub struct ScriptedProvider {
    by_issue: Mutex<HashMap<String, ProviderOutcome>>,
    queue: Mutex<VecDeque<ProviderOutcome>>,
    default: ProviderOutcome,
    requests: Mutex<Vec<EstimateRequest>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            by_issue: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            default: ProviderOutcome::failure(FailureKind::Unavailable),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `outcome` for `issue_id`.
    pub fn with_outcome_for(self, issue_id: &str, outcome: ProviderOutcome) -> Self {
        self.by_issue
            .lock()
            .unwrap()
            .insert(issue_id.to_string(), outcome);
        self
    }

    /// Queue an outcome for the next unscripted call.
    pub fn then(self, outcome: ProviderOutcome) -> Self {
        self.queue.lock().unwrap().push_back(outcome);
        self
    }

    pub fn with_default(mut self, outcome: ProviderOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<EstimateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeEstimateProvider for ScriptedProvider {
    async fn estimate(&self, request: &EstimateRequest) -> ProviderOutcome {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(outcome) = self.by_issue.lock().unwrap().get(&request.issue_id) {
            return outcome.clone();
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// StaticProvider
// ---------------------------------------------------------------------------

/// Returns the same outcome for every call, optionally after a delay.
#[derive(Debug)]
pub struct StaticProvider {
    outcome: ProviderOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(outcome: ProviderOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Convenience for a successful estimate.
    pub fn success(low: f64, high: f64, reported_confidence: f64) -> Self {
        Self::new(ProviderOutcome::Success(valid_estimate(
            low,
            high,
            reported_confidence,
        )))
    }

    /// Sleep (tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeEstimateProvider for StaticProvider {
    async fn estimate(&self, _request: &EstimateRequest) -> ProviderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}

// ---------------------------------------------------------------------------
// UnavailableProvider
// ---------------------------------------------------------------------------

/// Stand-in when no generative provider is configured.
#[derive(Debug, Default)]
pub struct UnavailableProvider {
    calls: AtomicUsize,
}

impl UnavailableProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeEstimateProvider for UnavailableProvider {
    async fn estimate(&self, _request: &EstimateRequest) -> ProviderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProviderOutcome::failure(FailureKind::Unavailable)
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::validate_response;

    fn req(id: &str) -> EstimateRequest {
        EstimateRequest::new(id, "roof", "medium", "Cracked tiles")
    }

    #[test]
    fn test_valid_estimate_passes_validation() {
        let value = serde_json::json!({
            "estimated_low": 300.0,
            "estimated_high": 900.0,
            "reasoning": valid_estimate(300.0, 900.0, 0.8).reasoning,
            "assumptions": valid_estimate(300.0, 900.0, 0.8).assumptions,
            "risk_factors": valid_estimate(300.0, 900.0, 0.8).risk_factors,
            "confidence": 0.8,
        });
        assert!(validate_response(&value).is_success());
    }

    #[tokio::test]
    async fn test_scripted_by_issue_then_queue_then_default() {
        let provider = ScriptedProvider::new()
            .with_outcome_for("a", ProviderOutcome::failure(FailureKind::Timeout))
            .then(ProviderOutcome::Incomplete {
                missing: vec!["reasoning: missing".into()],
            });

        assert_eq!(
            provider.estimate(&req("a")).await,
            ProviderOutcome::failure(FailureKind::Timeout)
        );
        assert_eq!(provider.estimate(&req("b")).await.label(), "incomplete");
        assert_eq!(provider.estimate(&req("c")).await.label(), "unavailable");
        assert_eq!(provider.estimate(&req("a")).await.label(), "timeout");
        assert_eq!(provider.call_count(), 4);
        assert_eq!(provider.requests()[1].issue_id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_provider_delay() {
        let provider = StaticProvider::success(100.0, 400.0, 90.0).with_delay(Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        assert!(provider.estimate(&req("x")).await.is_success());
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider() {
        let provider = UnavailableProvider::new();
        assert_eq!(
            provider.estimate(&req("x")).await,
            ProviderOutcome::failure(FailureKind::Unavailable)
        );
        assert_eq!(provider.call_count(), 1);
    }
}
