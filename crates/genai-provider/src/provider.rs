use async_trait::async_trait;

use crate::outcome::ProviderOutcome;
use crate::request::EstimateRequest;

/// A source of generative cost estimates.
///
/// Implementations own their transport, retry and backoff. The call itself
/// is infallible at the type level: every failure mode is folded into
/// [`ProviderOutcome::Failure`] or [`ProviderOutcome::Incomplete`].
#[async_trait]
pub trait GenerativeEstimateProvider: Send + Sync {
    /// Request an estimate for one issue.
    async fn estimate(&self, request: &EstimateRequest) -> ProviderOutcome;

    /// Name used in logs.
    fn name(&self) -> &str;
}
