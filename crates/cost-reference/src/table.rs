//! Reference table trait and the value types it trades in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TableError;

// ---------------------------------------------------------------------------
// CostRange
// ---------------------------------------------------------------------------

/// A market cost range in dollars.
///
/// Constructed through [`CostRange::new`], which enforces `0 < low < high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub low: f64,
    pub high: f64,
}

impl CostRange {
    /// Build a range, rejecting non-finite, non-positive or inverted bounds.
    pub fn new(low: f64, high: f64) -> Result<Self, TableError> {
        if !low.is_finite() || !high.is_finite() || low <= 0.0 || high <= low {
            return Err(TableError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    /// Midpoint of the range.
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    /// `high / low`.
    pub fn ratio(&self) -> f64 {
        self.high / self.low
    }
}

impl fmt::Display for CostRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.0}-${:.0}", self.low, self.high)
    }
}

// ---------------------------------------------------------------------------
// Lookup attributes
// ---------------------------------------------------------------------------

/// Coarse scope tier used to pick a row within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Minor,
    Moderate,
    Major,
}

impl ComplexityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityTier {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" | "low" => Ok(Self::Minor),
            "moderate" | "medium" => Ok(Self::Moderate),
            "major" | "high" => Ok(Self::Major),
            other => Err(TableError::UnknownTier(other.to_string())),
        }
    }
}

/// Attributes that refine a category lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupAttributes {
    /// Named subtype within the category (e.g. "panel", "replacement").
    /// Takes precedence over the tier when the table knows it.
    pub subcategory: Option<String>,
    /// Scope tier used when no subtype matches.
    pub tier: ComplexityTier,
}

impl LookupAttributes {
    pub fn tier(tier: ComplexityTier) -> Self {
        Self {
            subcategory: None,
            tier,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ReferenceCostTable
// ---------------------------------------------------------------------------

/// Read-only reference cost lookup.
///
/// Guarantees:
/// - `lookup` has no side effects and is deterministic for a given table.
/// - `None` means "no candidate", not a failure.
pub trait ReferenceCostTable: Send + Sync {
    /// Look up the cost range for `category` refined by `attrs`.
    fn lookup(&self, category: &str, attrs: &LookupAttributes) -> Option<CostRange>;
}

/// Canonical key form of a category name: lowercase, `_`/`-` treated as
/// spaces, whitespace collapsed.
pub fn normalize_category(raw: &str) -> String {
    raw.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_range_rejects_inverted_and_non_positive() {
        assert!(CostRange::new(100.0, 50.0).is_err());
        assert!(CostRange::new(0.0, 50.0).is_err());
        assert!(CostRange::new(100.0, 100.0).is_err());
        assert!(CostRange::new(f64::NAN, 100.0).is_err());
        assert!(CostRange::new(100.0, 250.0).is_ok());
    }

    #[test]
    fn test_cost_range_ratio_and_midpoint() {
        let r = CostRange::new(200.0, 600.0).unwrap();
        assert_eq!(r.ratio(), 3.0);
        assert_eq!(r.midpoint(), 400.0);
        assert_eq!(r.to_string(), "$200-$600");
    }

    #[test]
    fn test_tier_parses_aliases() {
        assert_eq!("Minor".parse::<ComplexityTier>().unwrap(), ComplexityTier::Minor);
        assert_eq!("medium".parse::<ComplexityTier>().unwrap(), ComplexityTier::Moderate);
        assert_eq!(" HIGH ".parse::<ComplexityTier>().unwrap(), ComplexityTier::Major);
        assert!("huge".parse::<ComplexityTier>().is_err());
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("  Roof_Covering "), "roof covering");
        assert_eq!(normalize_category("HVAC"), "hvac");
        assert_eq!(normalize_category("water-heater  unit"), "water heater unit");
    }
}
