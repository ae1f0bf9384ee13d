//! Per-engine atomic counters.
//!
//! Counters are bumped at the call site without locking. [`EngineStats::flush`]
//! emits every value as one `tracing::info!` event; the engine calls it at
//! the end of each batch.

use std::sync::atomic::{AtomicU64, Ordering};

use genai_provider::{FailureKind, ProviderOutcome};
use serde::{Deserialize, Serialize};

use crate::domain::EstimationMethod;

#[derive(Debug, Default)]
pub struct EngineStats {
    issues_estimated: AtomicU64,
    lookup: AtomicU64,
    formula: AtomicU64,
    hybrid: AtomicU64,
    generative: AtomicU64,
    fallback: AtomicU64,
    provider_success: AtomicU64,
    provider_incomplete: AtomicU64,
    provider_failure: AtomicU64,
    provider_skipped: AtomicU64,
    quota_exhausted: AtomicU64,
    corrections: AtomicU64,
    task_failures: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`], included in batch reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub issues_estimated: u64,
    pub lookup: u64,
    pub formula: u64,
    pub hybrid: u64,
    pub generative: u64,
    pub fallback: u64,
    pub provider_success: u64,
    pub provider_incomplete: u64,
    pub provider_failure: u64,
    /// Provider calls not made because the quota was spent.
    pub provider_skipped: u64,
    pub quota_exhausted: u64,
    pub corrections: u64,
    /// Worker tasks that panicked or were cancelled.
    pub task_failures: u64,
}

impl StatsSnapshot {
    pub fn method_count(&self, method: EstimationMethod) -> u64 {
        match method {
            EstimationMethod::Lookup => self.lookup,
            EstimationMethod::Formula => self.formula,
            EstimationMethod::Hybrid => self.hybrid,
            EstimationMethod::Generative => self.generative,
            EstimationMethod::Fallback => self.fallback,
        }
    }
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_estimate(&self, method: EstimationMethod, corrections: usize) {
        self.issues_estimated.fetch_add(1, Ordering::Relaxed);
        let counter = match method {
            EstimationMethod::Lookup => &self.lookup,
            EstimationMethod::Formula => &self.formula,
            EstimationMethod::Hybrid => &self.hybrid,
            EstimationMethod::Generative => &self.generative,
            EstimationMethod::Fallback => &self.fallback,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.corrections
            .fetch_add(corrections as u64, Ordering::Relaxed);
        tracing::trace!(metric = "estimate", method = %method, "counter incremented");
    }

    pub fn record_outcome(&self, outcome: &ProviderOutcome) {
        let counter = match outcome {
            ProviderOutcome::Success(_) => &self.provider_success,
            ProviderOutcome::Incomplete { .. } => &self.provider_incomplete,
            ProviderOutcome::Failure { kind } => {
                if *kind == FailureKind::QuotaExhausted {
                    self.quota_exhausted.fetch_add(1, Ordering::Relaxed);
                }
                &self.provider_failure
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.provider_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_exhausted(&self) {
        self.quota_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failure(&self) {
        self.task_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            issues_estimated: load(&self.issues_estimated),
            lookup: load(&self.lookup),
            formula: load(&self.formula),
            hybrid: load(&self.hybrid),
            generative: load(&self.generative),
            fallback: load(&self.fallback),
            provider_success: load(&self.provider_success),
            provider_incomplete: load(&self.provider_incomplete),
            provider_failure: load(&self.provider_failure),
            provider_skipped: load(&self.provider_skipped),
            quota_exhausted: load(&self.quota_exhausted),
            corrections: load(&self.corrections),
            task_failures: load(&self.task_failures),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            issues_estimated = s.issues_estimated,
            lookup = s.lookup,
            formula = s.formula,
            hybrid = s.hybrid,
            generative = s.generative,
            fallback = s.fallback,
            provider_success = s.provider_success,
            provider_incomplete = s.provider_incomplete,
            provider_failure = s.provider_failure,
            provider_skipped = s.provider_skipped,
            quota_exhausted = s.quota_exhausted,
            corrections = s.corrections,
            task_failures = s.task_failures,
        );
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.issues_estimated,
            &self.lookup,
            &self.formula,
            &self.hybrid,
            &self.generative,
            &self.fallback,
            &self.provider_success,
            &self.provider_incomplete,
            &self.provider_failure,
            &self.provider_skipped,
            &self.quota_exhausted,
            &self.corrections,
            &self.task_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
