//! GenAI-Provider: Generative Estimate Boundary
//!
//! This crate owns everything between the estimator and a generative
//! model: the request shape, the typed three-way outcome, strict
//! validation of untyped responses, the shared daily quota, the
//! per-minute rate limiter and the HTTP transport with its retry policy.
//!
//! Callers only ever see a [`ProviderOutcome`]. Raw JSON is inspected in
//! exactly one place, [`validate_response`].
//!
//! ## Layer 1 - Provider Boundary
//!
//! Focus: Typed outcomes, quota safety under concurrency, retry/backoff.

pub mod error;
pub mod fakes;
pub mod http;
pub mod outcome;
pub mod provider;
pub mod quota;
pub mod rate_limit;
pub mod request;

pub use error::ProviderError;
pub use http::{HttpEstimateProvider, HttpProviderConfig};
pub use outcome::{
    parse_response_text, validate_response, FailureKind, ProviderOutcome, RawEstimate,
    MIN_ASSUMPTIONS, MIN_REASONING_CHARS, MIN_RISK_FACTORS,
};
pub use provider::GenerativeEstimateProvider;
pub use quota::{QuotaLedger, QuotaState};
pub use rate_limit::RateLimiter;
pub use request::{EstimateRequest, PropertyContext};

/// Result type for provider construction and quota accounting.
pub type Result<T> = std::result::Result<T, ProviderError>;
