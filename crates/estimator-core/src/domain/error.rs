//! Domain-level error taxonomy for the estimator.
//!
//! The per-issue pipeline never returns these: provider, validation and
//! quota failures are folded into the estimate's method and confidence.
//! Errors only surface while loading configuration or input.

/// Errors produced while loading or checking an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Estimator errors.
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("duplicate issue id: {0}")]
    DuplicateIssueId(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for estimator operations that can fail.
pub type Result<T> = std::result::Result<T, EstimatorError>;
