//! HTTP estimate provider
//!
//! Posts an [`EstimateRequest`] as JSON to an estimate gateway and validates
//! the JSON it returns. Transport errors, 5xx and plain 429 responses are
//! retried with exponential backoff; a 429 that mentions a quota is treated
//! as exhaustion and not retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::ProviderError;
use crate::outcome::{parse_response_text, FailureKind, ProviderOutcome};
use crate::provider::GenerativeEstimateProvider;
use crate::rate_limit::RateLimiter;
use crate::request::EstimateRequest;
use crate::Result;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// HTTP provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Gateway endpoint that accepts estimate requests
    pub endpoint: String,
    /// Bearer token (optional for local gateways)
    pub api_key: Option<String>,
    /// Model name forwarded to the gateway
    pub model: String,
    /// Sampling temperature forwarded to the gateway
    pub temperature: f32,
    /// Per-attempt timeout
    pub request_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff delay
    pub max_backoff: Duration,
    /// Per-minute call budget; `None` derives it from the model name
    pub max_calls_per_minute: Option<usize>,
}

impl HttpProviderConfig {
    pub fn new(endpoint: &str) -> Self {
        HttpProviderConfig {
            endpoint: endpoint.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_calls_per_minute: None,
        }
    }

    /// Build from `ESTIMATOR_PROVIDER_URL`, `ESTIMATOR_PROVIDER_KEY` and
    /// `ESTIMATOR_PROVIDER_MODEL`. Returns `None` when no URL is set.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("ESTIMATOR_PROVIDER_URL").ok()?;
        let mut config = Self::new(&endpoint);
        config.api_key = std::env::var("ESTIMATOR_PROVIDER_KEY").ok();
        if let Ok(model) = std::env::var("ESTIMATOR_PROVIDER_MODEL") {
            config.model = model;
        }
        Some(config)
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_rate_limit(mut self, max_calls_per_minute: usize) -> Self {
        self.max_calls_per_minute = Some(max_calls_per_minute);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ProviderError::Config("endpoint is empty".into()));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ProviderError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ProviderError::Config("request_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Serialize)]
struct GatewayBody<'a> {
    model: &'a str,
    temperature: f32,
    prompt: String,
    request: &'a EstimateRequest,
}

/// What one attempt produced.
enum Attempt {
    Done(ProviderOutcome),
    Retry(ProviderOutcome, Option<Duration>),
}

/// Estimate provider backed by an HTTP gateway.
pub struct HttpEstimateProvider {
    config: HttpProviderConfig,
    http_client: reqwest::Client,
    limiter: RateLimiter,
}

impl HttpEstimateProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("repair-estimator/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        let limiter = match config.max_calls_per_minute {
            Some(limit) => RateLimiter::new(limit),
            None => RateLimiter::for_model(&config.model),
        };

        Ok(HttpEstimateProvider {
            config,
            http_client,
            limiter,
        })
    }

    pub fn config(&self) -> &HttpProviderConfig {
        &self.config
    }

    async fn attempt(&self, request: &EstimateRequest) -> Attempt {
        self.limiter.acquire().await;

        let body = GatewayBody {
            model: &self.config.model,
            temperature: self.config.temperature,
            prompt: request.render_prompt(),
            request,
        };
        let mut call = self.http_client.post(&self.config.endpoint).json(&body);
        if let Some(token) = &self.config.api_key {
            call = call.bearer_auth(token);
        }

        let response = match call.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Transient
                };
                warn!(error = %e, kind = %kind, "estimate request failed");
                return Attempt::Retry(ProviderOutcome::failure(kind), None);
            }
        };

        let status = response.status();
        let retry_after = retry_after(&response);
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to read estimate response body");
                return Attempt::Retry(ProviderOutcome::failure(FailureKind::Transient), None);
            }
        };

        match classify_status(status, &text) {
            Some(StatusClass::Quota) => {
                warn!(%status, "provider reports quota exhausted");
                Attempt::Done(ProviderOutcome::failure(FailureKind::QuotaExhausted))
            }
            Some(StatusClass::Retryable) => {
                warn!(%status, "provider returned retryable status");
                Attempt::Retry(ProviderOutcome::failure(FailureKind::Transient), retry_after)
            }
            Some(StatusClass::Refused) => {
                warn!(%status, "provider refused request");
                Attempt::Done(ProviderOutcome::failure(FailureKind::Unavailable))
            }
            None => match parse_response_text(&text) {
                outcome @ ProviderOutcome::Success(_) => Attempt::Done(outcome),
                outcome => {
                    warn!(outcome = outcome.label(), "provider response rejected");
                    Attempt::Retry(outcome, None)
                }
            },
        }
    }
}

#[async_trait]
impl GenerativeEstimateProvider for HttpEstimateProvider {
    #[instrument(skip(self, request), fields(issue_id = %request.issue_id, model = %self.config.model))]
    async fn estimate(&self, request: &EstimateRequest) -> ProviderOutcome {
        let mut retry = 0;
        loop {
            match self.attempt(request).await {
                Attempt::Done(outcome) => {
                    debug!(outcome = outcome.label(), retries = retry, "estimate call finished");
                    return outcome;
                }
                Attempt::Retry(outcome, hint) => {
                    if retry >= self.config.max_retries {
                        info!(outcome = outcome.label(), retries = retry, "retries exhausted");
                        return outcome;
                    }
                    retry += 1;
                    let delay = hint
                        .unwrap_or_else(|| self.config.backoff_for(retry))
                        .min(self.config.max_backoff);
                    debug!(retry, delay_ms = delay.as_millis() as u64, "retrying estimate call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StatusClass {
    Quota,
    Retryable,
    Refused,
}

/// `None` means the body should be parsed as an estimate.
fn classify_status(status: StatusCode, body: &str) -> Option<StatusClass> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        if body.to_ascii_lowercase().contains("quota") {
            return Some(StatusClass::Quota);
        }
        return Some(StatusClass::Retryable);
    }
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return Some(StatusClass::Retryable);
    }
    Some(StatusClass::Refused)
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpProviderConfig::new("https://estimates.example.com/v1/estimate")
            .with_api_key("secret")
            .with_model("gemini-1.5-flash")
            .with_retries(4, Duration::from_millis(100));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_retries, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_endpoint() {
        assert!(HttpProviderConfig::new("").validate().is_err());
        assert!(HttpProviderConfig::new("ftp://x").validate().is_err());
        assert!(HttpProviderConfig::new("http://localhost:8080")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = HttpProviderConfig::new("http://localhost")
            .with_retries(10, Duration::from_secs(1));
        assert_eq!(config.backoff_for(1), Duration::from_secs(1));
        assert_eq!(config.backoff_for(2), Duration::from_secs(2));
        assert_eq!(config.backoff_for(3), Duration::from_secs(4));
        assert_eq!(config.backoff_for(9), Duration::from_secs(30));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK, ""), None);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "Daily QUOTA exceeded"),
            Some(StatusClass::Quota)
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Some(StatusClass::Retryable)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            Some(StatusClass::Retryable)
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            Some(StatusClass::Refused)
        );
    }

    #[test]
    fn test_rate_limit_derived_from_model() {
        let provider =
            HttpEstimateProvider::new(HttpProviderConfig::new("http://localhost:9").with_model("gemini-1.5-pro"))
                .unwrap();
        assert_eq!(provider.limiter.max_calls_per_minute(), 1);
        assert_eq!(provider.name(), "http");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transient_failure() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let config = HttpProviderConfig::new("http://127.0.0.1:9/estimate")
            .with_retries(1, Duration::from_millis(1))
            .with_rate_limit(0);
        let provider = HttpEstimateProvider::new(config).unwrap();
        let request = EstimateRequest::new("i-1", "roof", "high", "Missing shingles");
        let outcome = provider.estimate(&request).await;
        assert!(matches!(
            outcome,
            ProviderOutcome::Failure {
                kind: FailureKind::Transient | FailureKind::Timeout
            }
        ));
    }
}
