//! Error types for genai-provider

use thiserror::Error;

/// Errors surfaced outside the estimate call itself.
///
/// An estimate call never returns these; it reports a
/// [`FailureKind`](crate::FailureKind) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The daily request quota is spent
    #[error("daily quota exceeded: {used}/{limit} requests used")]
    QuotaExceeded { used: u64, limit: u64 },

    /// Provider configuration is unusable
    #[error("invalid provider configuration: {0}")]
    Config(String),

    /// The persisted quota ledger could not be read or written
    #[error("quota ledger error: {0}")]
    Ledger(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_display() {
        let err = ProviderError::QuotaExceeded {
            used: 100,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "daily quota exceeded: 100/100 requests used"
        );
    }

    #[test]
    fn test_config_display() {
        let err = ProviderError::Config("endpoint is empty".into());
        assert!(err.to_string().contains("endpoint is empty"));
    }
}
