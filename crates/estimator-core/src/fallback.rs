//! Rule-based fallback estimates.
//!
//! Used whenever no valid estimate could be produced. Always succeeds and
//! always returns a range that satisfies the estimate invariants.

use cost_reference::normalize_category;
use tracing::warn;

use crate::config::EngineConfig;
use crate::domain::{CostEstimate, EstimationMethod, Issue, Severity};

/// (category, low, high)
const FALLBACK_RANGES: [(&str, f64, f64); 6] = [
    ("roof", 500.0, 15_000.0),
    ("hvac", 300.0, 8_000.0),
    ("plumbing", 200.0, 5_000.0),
    ("electrical", 150.0, 3_000.0),
    ("foundation", 1_000.0, 25_000.0),
    ("structural", 500.0, 10_000.0),
];

const DEFAULT_RANGE: (f64, f64) = (500.0, 3_000.0);

/// Category aliases folded onto the table above.
const CATEGORY_ALIASES: [(&str, &str); 4] = [
    ("roofing", "roof"),
    ("heating/cooling", "hvac"),
    ("heating", "hvac"),
    ("structure", "structural"),
];

pub fn severity_multiplier(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 1.5,
        Severity::High => 1.2,
        Severity::Medium => 1.0,
        Severity::Low | Severity::Info => 0.6,
    }
}

#[derive(Debug, Clone)]
pub struct FallbackEstimator {
    max_cost_ratio: f64,
    cap_multiplier: f64,
    confidence: f64,
}

impl FallbackEstimator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_cost_ratio: config.max_cost_ratio,
            cap_multiplier: config.fallback_cap_multiplier,
            confidence: config.fallback_confidence,
        }
    }

    /// `(low, high)` for a category and severity, bounded by the ratio cap.
    pub fn range_for(&self, category: &str, severity: Severity) -> (f64, f64) {
        let key = normalize_category(category);
        let key = CATEGORY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(key);
        let (base_low, base_high) = FALLBACK_RANGES
            .iter()
            .find(|(name, _, _)| *name == key)
            .map(|(_, low, high)| (*low, *high))
            .unwrap_or(DEFAULT_RANGE);

        let multiplier = severity_multiplier(severity);
        let low = (base_low * multiplier).round();
        let mut high = (base_high * multiplier).round();
        if high / low > self.max_cost_ratio {
            high = (low * self.cap_multiplier).round();
        }
        (low, high)
    }

    pub fn estimate(&self, issue: &Issue, reason: &str) -> CostEstimate {
        let category = issue.category();
        let (low, high) = self.range_for(category, issue.severity);
        warn!(issue_id = %issue.id, category, reason, "fallback estimate used");

        CostEstimate {
            issue_id: issue.id.clone(),
            item: issue.item(),
            estimated_low: low,
            estimated_high: high,
            confidence: self.confidence,
            method: EstimationMethod::Fallback,
            reasoning: format!(
                "Rule-based estimate for {} {category} issue: ${low:.0}-${high:.0}. \
                 A detailed estimate was not available; a professional inspection is \
                 recommended to confirm scope and cost.",
                issue.severity
            ),
            assumptions: vec![
                format!("Typical {category} repair scope"),
                format!("Range adjusted for {} severity", issue.severity),
                "Regional average labor and material rates".to_string(),
            ],
            risk_factors: vec![
                "Estimate not based on a detailed assessment".to_string(),
                "Professional inspection recommended to confirm scope".to_string(),
            ],
            group_id: None,
            confidence_breakdown: None,
            corrections: Vec::new(),
            warnings: vec![format!("fallback used: {reason}")],
            needs_review: true,
        }
    }
}
