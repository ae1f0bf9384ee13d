//! Error types for cost-reference

use thiserror::Error;

/// Errors raised while building or loading a cost table.
///
/// Lookups themselves never fail; these only surface at construction time.
#[derive(Error, Debug)]
pub enum TableError {
    /// A range violates `0 < low < high`
    #[error("invalid cost range: low={low}, high={high}")]
    InvalidRange { low: f64, high: f64 },

    /// Tier name not one of minor/moderate/major
    #[error("unknown complexity tier: {0}")]
    UnknownTier(String),

    /// Category name normalizes to an empty key
    #[error("category name must not be empty")]
    EmptyCategory,

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
