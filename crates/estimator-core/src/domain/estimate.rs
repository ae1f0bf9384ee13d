//! Estimate candidates and finalized cost estimates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::breakdown::ConfidenceBreakdown;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Lookup,
    /// Deterministic per-unit formula; treated like a table lookup when
    /// combining.
    Formula,
    Generative,
}

impl CandidateSource {
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Lookup | Self::Formula)
    }
}

/// An unvalidated estimate proposal from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateCandidate {
    pub low: f64,
    pub high: f64,
    pub reasoning: Option<String>,
    pub assumptions: Vec<String>,
    pub risk_factors: Vec<String>,
    /// Self-reported confidence, already normalized to [0, 1].
    pub stated_confidence: Option<f64>,
    pub source: CandidateSource,
}

impl EstimateCandidate {
    /// Bare range with no narrative.
    pub fn range(source: CandidateSource, low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            reasoning: None,
            assumptions: Vec::new(),
            risk_factors: Vec::new(),
            stated_confidence: None,
            source,
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// The path that produced a final estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    Lookup,
    Formula,
    Hybrid,
    Generative,
    Fallback,
}

impl EstimationMethod {
    pub const ALL: [EstimationMethod; 5] = [
        Self::Lookup,
        Self::Formula,
        Self::Hybrid,
        Self::Generative,
        Self::Fallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Formula => "formula",
            Self::Hybrid => "hybrid",
            Self::Generative => "generative",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final per-issue estimate.
///
/// # Invariants
///
/// Once produced by the engine: `estimated_low > 0`,
/// `estimated_high > estimated_low`, `estimated_high / estimated_low` within
/// the configured ratio and `confidence` in [0, 1]. Cost values are never
/// changed afterwards; only `group_id` is filled in at report assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub issue_id: String,
    pub item: String,
    pub estimated_low: f64,
    pub estimated_high: f64,
    pub confidence: f64,
    pub method: EstimationMethod,
    pub reasoning: String,
    pub assumptions: Vec<String>,
    pub risk_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<ConfidenceBreakdown>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub needs_review: bool,
}

impl CostEstimate {
    pub fn midpoint(&self) -> f64 {
        (self.estimated_low + self.estimated_high) / 2.0
    }

    pub fn ratio(&self) -> f64 {
        self.estimated_high / self.estimated_low
    }

    /// Whether every range and confidence invariant holds.
    pub fn satisfies_invariants(&self, max_cost_ratio: f64) -> bool {
        self.estimated_low.is_finite()
            && self.estimated_high.is_finite()
            && self.estimated_low > 0.0
            && self.estimated_high > self.estimated_low
            && self.ratio() <= max_cost_ratio
            && (0.0..=1.0).contains(&self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(low: f64, high: f64, confidence: f64) -> CostEstimate {
        CostEstimate {
            issue_id: "i".into(),
            item: "item".into(),
            estimated_low: low,
            estimated_high: high,
            confidence,
            method: EstimationMethod::Lookup,
            reasoning: String::new(),
            assumptions: vec![],
            risk_factors: vec![],
            group_id: None,
            confidence_breakdown: None,
            corrections: vec![],
            warnings: vec![],
            needs_review: false,
        }
    }

    #[test]
    fn test_invariants() {
        assert!(estimate(100.0, 500.0, 0.7).satisfies_invariants(10.0));
        assert!(estimate(100.0, 1000.0, 1.0).satisfies_invariants(10.0));
        assert!(!estimate(100.0, 1001.0, 0.7).satisfies_invariants(10.0));
        assert!(!estimate(0.0, 10.0, 0.7).satisfies_invariants(10.0));
        assert!(!estimate(100.0, 100.0, 0.7).satisfies_invariants(10.0));
        assert!(!estimate(100.0, 200.0, 1.2).satisfies_invariants(10.0));
    }

    #[test]
    fn test_method_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EstimationMethod::Fallback).unwrap(),
            "\"fallback\""
        );
        assert!(CandidateSource::Formula.is_deterministic());
        assert!(!CandidateSource::Generative.is_deterministic());
    }

    #[test]
    fn test_empty_lists_are_skipped_in_json() {
        let json = serde_json::to_value(estimate(100.0, 200.0, 0.5)).unwrap();
        assert!(json.get("corrections").is_none());
        assert!(json.get("group_id").is_none());
        assert_eq!(json["method"], "lookup");
    }
}
