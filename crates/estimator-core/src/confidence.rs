//! Multi-dimension confidence scoring.
//!
//! Each dimension is scored independently in [0, 1] and combined with the
//! configured weights. A dimension whose input is missing, unusable or not
//! applicable scores 0, is recorded as a [`DimensionGap`] and is logged;
//! scoring itself never fails.
//!
//! | dimension           | input                                            |
//! |---------------------|--------------------------------------------------|
//! | range_quality       | `high / low` of the combined range               |
//! | reasoning_quality   | narrative length, cost vocabulary, list support  |
//! | taxonomy_quality    | issue classification confidence                  |
//! | source_quality      | estimation method trust order                    |
//! | consistency_quality | agreement of deterministic and generative ranges |
//! | severity_alignment  | severity/urgency against method suitability      |
//! | stated_confidence   | generative self-reported confidence              |

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::ConfidenceWeights;
use crate::domain::{
    ConfidenceBreakdown, Dimension, DimensionGap, EstimationMethod, Issue, Severity,
};

/// Urgency (0-10) at or above which severity is treated as at least high.
pub const URGENCY_ESCALATION: f64 = 7.0;

const VAGUE_WORDS: [&str; 5] = ["depends", "varies", "uncertain", "unclear", "unknown"];

/// Bring an externally supplied confidence onto the canonical [0, 1] scale.
///
/// Values above 1 are read as percentages and divided by 100; the result is
/// clamped to [0, 1]. Non-finite and negative values are unusable and yield
/// `None`. Apply exactly once, where the value enters the system.
pub fn normalize_confidence(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    Some(scaled.min(1.0))
}

/// Midpoints of the deterministic and generative candidates that were
/// combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceAgreement {
    pub deterministic_mid: f64,
    pub generative_mid: f64,
}

impl SourceAgreement {
    /// `max / min` of the two midpoints, `None` when either is not positive.
    pub fn divergence(&self) -> Option<f64> {
        let (a, b) = (self.deterministic_mid, self.generative_mid);
        if !(a.is_finite() && b.is_finite()) || a <= 0.0 || b <= 0.0 {
            return None;
        }
        Some(a.max(b) / a.min(b))
    }
}

/// Everything the scorer looks at for one estimate.
#[derive(Debug, Clone)]
pub struct ScoringInput<'a> {
    pub issue: &'a Issue,
    pub low: f64,
    pub high: f64,
    pub method: EstimationMethod,
    pub reasoning: &'a str,
    pub assumption_count: usize,
    pub risk_factor_count: usize,
    /// Normalized self-reported confidence, if any.
    pub stated_confidence: Option<f64>,
    pub agreement: Option<SourceAgreement>,
}

enum DimensionScore {
    Scored(f64),
    /// Input present but unusable.
    Unusable(String),
    /// Input does not exist for this estimate.
    NotApplicable(String),
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
    max_cost_ratio: f64,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights, max_cost_ratio: f64) -> Self {
        Self {
            weights,
            max_cost_ratio,
        }
    }

    pub fn score(&self, input: &ScoringInput<'_>) -> ConfidenceBreakdown {
        let mut dimensions = BTreeMap::new();
        let mut weights = BTreeMap::new();
        let mut gaps = Vec::new();
        let mut overall = 0.0;

        for dimension in Dimension::ALL {
            let weight = self.weights.weight(dimension);
            let value = match self.score_dimension(dimension, input) {
                DimensionScore::Scored(v) => v.clamp(0.0, 1.0),
                DimensionScore::Unusable(reason) => {
                    warn!(issue_id = %input.issue.id, dimension = %dimension, reason = %reason, "confidence dimension unusable");
                    gaps.push(DimensionGap { dimension, reason });
                    0.0
                }
                DimensionScore::NotApplicable(reason) => {
                    debug!(issue_id = %input.issue.id, dimension = %dimension, reason = %reason, "confidence dimension not applicable");
                    gaps.push(DimensionGap { dimension, reason });
                    0.0
                }
            };
            overall += weight * value;
            dimensions.insert(dimension, value);
            weights.insert(dimension, weight);
        }

        ConfidenceBreakdown {
            dimensions,
            weights,
            overall: overall.clamp(0.0, 1.0),
            gaps,
        }
    }

    fn score_dimension(&self, dimension: Dimension, input: &ScoringInput<'_>) -> DimensionScore {
        match dimension {
            Dimension::RangeQuality => self.range_quality(input.low, input.high),
            Dimension::ReasoningQuality => reasoning_quality(
                input.reasoning,
                input.assumption_count,
                input.risk_factor_count,
            ),
            Dimension::TaxonomyQuality => match input.issue.taxonomy.confidence {
                Some(c) => DimensionScore::Scored(c),
                None => DimensionScore::Unusable("taxonomy confidence missing or unusable".into()),
            },
            Dimension::SourceQuality => DimensionScore::Scored(source_quality(input.method)),
            Dimension::ConsistencyQuality => consistency_quality(input.agreement),
            Dimension::SeverityAlignment => DimensionScore::Scored(severity_alignment(
                effective_severity(input.issue),
                input.method,
            )),
            Dimension::StatedConfidence => match input.stated_confidence {
                Some(c) => DimensionScore::Scored(c),
                None if matches!(
                    input.method,
                    EstimationMethod::Generative | EstimationMethod::Hybrid
                ) =>
                {
                    DimensionScore::Unusable("generative confidence missing or unusable".into())
                }
                None => DimensionScore::NotApplicable("no generative source".into()),
            },
        }
    }

    fn range_quality(&self, low: f64, high: f64) -> DimensionScore {
        if !(low.is_finite() && high.is_finite()) || low <= 0.0 || high <= low {
            return DimensionScore::Unusable(format!("invalid range {low}-{high}"));
        }
        let ratio = high / low;
        let score = if (1.3..=2.5).contains(&ratio) {
            1.0
        } else if (1.2..=3.0).contains(&ratio) {
            0.85
        } else if (1.1..=4.0).contains(&ratio) {
            0.70
        } else if ratio < 1.1 {
            0.40
        } else if ratio <= self.max_cost_ratio {
            0.50
        } else {
            0.20
        };
        DimensionScore::Scored(score)
    }
}

fn reasoning_quality(reasoning: &str, assumptions: usize, risks: usize) -> DimensionScore {
    let text = reasoning.trim();
    if text.is_empty() {
        return DimensionScore::Unusable("empty reasoning".into());
    }

    let length = text.chars().count();
    let mut narrative: f64 = if length < 50 {
        0.2
    } else if length < 150 {
        0.6
    } else if length < 300 {
        0.8
    } else {
        0.9
    };

    let lower = text.to_lowercase();
    if lower.contains("labor") || lower.contains("hours") {
        narrative += 0.05;
    }
    if lower.contains("material") || lower.contains("supplies") {
        narrative += 0.05;
    }
    if lower.contains("market") || lower.contains("regional") {
        narrative += 0.05;
    }
    let vague = VAGUE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    narrative -= 0.05 * vague as f64;
    let narrative = narrative.clamp(0.0, 1.0);

    let support = (assumptions as f64 / 3.0).min(1.0) * 0.5 + (risks as f64 / 2.0).min(1.0) * 0.5;
    DimensionScore::Scored(narrative * 0.7 + support * 0.3)
}

/// Trust order: lookup > formula > hybrid > generative > fallback.
pub fn source_quality(method: EstimationMethod) -> f64 {
    match method {
        EstimationMethod::Lookup => 1.0,
        EstimationMethod::Formula => 0.9,
        EstimationMethod::Hybrid => 0.8,
        EstimationMethod::Generative => 0.6,
        EstimationMethod::Fallback => 0.3,
    }
}

fn consistency_quality(agreement: Option<SourceAgreement>) -> DimensionScore {
    let Some(agreement) = agreement else {
        return DimensionScore::NotApplicable("single source".into());
    };
    let Some(divergence) = agreement.divergence() else {
        return DimensionScore::Unusable("non-positive candidate midpoint".into());
    };
    let score = if divergence <= 1.25 {
        1.0
    } else if divergence >= 4.0 {
        0.0
    } else {
        1.0 - (divergence - 1.25) / (4.0 - 1.25)
    };
    DimensionScore::Scored(score)
}

/// Severity, escalated to at least `High` when urgency is 7/10 or more.
pub fn effective_severity(issue: &Issue) -> Severity {
    let urgent = issue
        .urgency_score
        .is_some_and(|u| u.is_finite() && u >= URGENCY_ESCALATION);
    match issue.severity {
        Severity::Critical => Severity::Critical,
        _ if urgent => Severity::High,
        other => other,
    }
}

/// How well the method suits the severity. Severe items call for
/// contextual reasoning; minor items are well served by tables.
pub fn severity_alignment(severity: Severity, method: EstimationMethod) -> f64 {
    use EstimationMethod::*;
    match severity {
        Severity::Critical | Severity::High => match method {
            Hybrid => 1.0,
            Generative => 0.85,
            Formula => 0.6,
            Lookup => 0.5,
            Fallback => 0.3,
        },
        Severity::Medium => match method {
            Hybrid | Formula => 0.9,
            Lookup => 0.85,
            Generative => 0.8,
            Fallback => 0.4,
        },
        Severity::Low | Severity::Info => match method {
            Lookup | Formula => 1.0,
            Hybrid => 0.8,
            Generative => 0.7,
            Fallback => 0.5,
        },
    }
}
