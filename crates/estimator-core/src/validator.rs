//! Range and confidence validation.
//!
//! Rules run in a fixed order. Each either passes, corrects the draft
//! (recording what changed) or rejects it. After the corrections every
//! invariant is checked once more, so a `Valid` result always satisfies
//! them.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EngineConfig;

/// A range and confidence awaiting validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftEstimate {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub confidence: f64,
}

impl DraftEstimate {
    pub fn new(low: f64, high: f64, confidence: f64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Low and high are present and finite.
    RequiredFields,
    /// A non-positive low is raised to a floor.
    PositiveLow,
    /// An inverted range is swapped.
    OrderedRange,
    /// `high / low` above the maximum ratio is capped.
    RatioCap,
    /// Confidence is clamped to [0, 1].
    ConfidenceBounds,
    /// Final re-check of every invariant.
    Invariants,
}

impl ValidationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiredFields => "required_fields",
            Self::PositiveLow => "positive_low",
            Self::OrderedRange => "ordered_range",
            Self::RatioCap => "ratio_cap",
            Self::ConfidenceBounds => "confidence_bounds",
            Self::Invariants => "invariants",
        }
    }
}

/// A change a rule made to the draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub rule: ValidationRule,
    pub detail: String,
}

impl std::fmt::Display for Correction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.rule.as_str(), self.detail)
    }
}

/// A draft that passed validation, with complete `low` and `high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRange {
    pub low: f64,
    pub high: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid {
        draft: ValidRange,
        corrections: Vec<Correction>,
        warnings: Vec<String>,
        needs_review: bool,
    },
    Invalid {
        rule: ValidationRule,
        reason: String,
    },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    max_cost_ratio: f64,
    fallback_cap_multiplier: f64,
    minimum_floor: f64,
    review_cost_threshold: f64,
    review_confidence_threshold: f64,
    max_warnings_before_review: usize,
}

impl Validator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_cost_ratio: config.max_cost_ratio,
            fallback_cap_multiplier: config.fallback_cap_multiplier,
            minimum_floor: config.minimum_floor,
            review_cost_threshold: config.review_cost_threshold,
            review_confidence_threshold: config.review_confidence_threshold,
            max_warnings_before_review: config.max_warnings_before_review,
        }
    }

    pub fn validate(&self, draft: DraftEstimate) -> Validation {
        let mut corrections = Vec::new();
        let mut warnings = Vec::new();

        // RequiredFields
        let (mut low, mut high) = match (draft.low, draft.high) {
            (Some(l), Some(h)) if l.is_finite() && h.is_finite() => (l, h),
            (low, high) => {
                return invalid(
                    ValidationRule::RequiredFields,
                    format!("low/high missing or not finite (low={low:?}, high={high:?})"),
                )
            }
        };

        // PositiveLow
        if low <= 0.0 {
            let floor = self.minimum_floor.max(high * 0.1);
            corrections.push(Correction {
                rule: ValidationRule::PositiveLow,
                detail: format!("low {low:.2} raised to {floor:.2}"),
            });
            low = floor;
        }

        // OrderedRange
        if high <= low {
            corrections.push(Correction {
                rule: ValidationRule::OrderedRange,
                detail: format!("range {low:.2}-{high:.2} swapped"),
            });
            std::mem::swap(&mut low, &mut high);
            if !(low > 0.0 && high > low) {
                return invalid(
                    ValidationRule::OrderedRange,
                    format!("range {low:.2}-{high:.2} cannot be ordered"),
                );
            }
        }

        // RatioCap
        let ratio = high / low;
        if ratio > self.max_cost_ratio {
            let capped = low * self.fallback_cap_multiplier;
            warnings.push(format!(
                "cost ratio {ratio:.1} exceeds {:.1}; high capped at {capped:.2}",
                self.max_cost_ratio
            ));
            corrections.push(Correction {
                rule: ValidationRule::RatioCap,
                detail: format!("high {high:.2} capped to {capped:.2}"),
            });
            high = capped;
        }

        // ConfidenceBounds
        let confidence = if draft.confidence.is_nan() {
            0.0
        } else {
            draft.confidence.clamp(0.0, 1.0)
        };
        if confidence != draft.confidence {
            corrections.push(Correction {
                rule: ValidationRule::ConfidenceBounds,
                detail: format!("confidence {} clamped to {confidence}", draft.confidence),
            });
        }

        if let Some(reason) = self.invariant_violation(low, high, confidence) {
            return invalid(ValidationRule::Invariants, reason);
        }

        let mut needs_review = false;
        if high > self.review_cost_threshold {
            warnings.push(format!(
                "high estimate ${high:.0} exceeds ${:.0}; verify with a contractor",
                self.review_cost_threshold
            ));
            needs_review = true;
        }
        if confidence < self.review_confidence_threshold {
            needs_review = true;
        }
        if warnings.len() > self.max_warnings_before_review {
            needs_review = true;
        }

        for correction in &corrections {
            warn!(rule = correction.rule.as_str(), detail = %correction.detail, "estimate corrected");
        }

        Validation::Valid {
            draft: ValidRange {
                low,
                high,
                confidence,
            },
            corrections,
            warnings,
            needs_review,
        }
    }

    fn invariant_violation(&self, low: f64, high: f64, confidence: f64) -> Option<String> {
        if !(low.is_finite() && high.is_finite()) {
            return Some("non-finite range".to_string());
        }
        if low <= 0.0 {
            return Some(format!("low {low:.2} is not positive"));
        }
        if high <= low {
            return Some(format!("high {high:.2} is not above low {low:.2}"));
        }
        if high / low > self.max_cost_ratio {
            return Some(format!(
                "ratio {:.2} still exceeds {:.2}",
                high / low,
                self.max_cost_ratio
            ));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Some(format!("confidence {confidence} outside [0, 1]"));
        }
        None
    }
}

fn invalid(rule: ValidationRule, reason: String) -> Validation {
    warn!(rule = rule.as_str(), reason = %reason, "estimate rejected");
    Validation::Invalid { rule, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::from_config(&EngineConfig::default())
    }

    fn valid(v: Validation) -> (ValidRange, Vec<Correction>, Vec<String>, bool) {
        match v {
            Validation::Valid {
                draft,
                corrections,
                warnings,
                needs_review,
            } => (draft, corrections, warnings, needs_review),
            Validation::Invalid { rule, reason } => panic!("invalid {rule:?}: {reason}"),
        }
    }

    #[test]
    fn test_clean_draft_passes_untouched() {
        let (draft, corrections, warnings, review) =
            valid(validator().validate(DraftEstimate::new(200.0, 600.0, 0.8)));
        assert_eq!((draft.low, draft.high, draft.confidence), (200.0, 600.0, 0.8));
        assert!(corrections.is_empty());
        assert!(warnings.is_empty());
        assert!(!review);
    }

    #[test]
    fn test_ratio_cap() {
        let (draft, corrections, warnings, _) =
            valid(validator().validate(DraftEstimate::new(100.0, 20_000.0, 0.7)));
        assert_eq!(draft.low, 100.0);
        assert_eq!(draft.high, 500.0);
        assert_eq!(corrections[0].rule, ValidationRule::RatioCap);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_non_positive_low_raised_to_floor() {
        let (draft, corrections, _, _) =
            valid(validator().validate(DraftEstimate::new(0.0, 3000.0, 0.7)));
        assert_eq!(draft.low, 300.0);
        assert_eq!(draft.high, 3000.0);
        assert_eq!(corrections[0].rule, ValidationRule::PositiveLow);

        let (draft, _, _, _) = valid(validator().validate(DraftEstimate::new(-5.0, 400.0, 0.7)));
        assert_eq!(draft.low, 100.0);
    }

    #[test]
    fn test_inverted_range_swapped() {
        let (draft, corrections, _, _) =
            valid(validator().validate(DraftEstimate::new(900.0, 300.0, 0.7)));
        assert_eq!((draft.low, draft.high), (300.0, 900.0));
        assert_eq!(corrections[0].rule, ValidationRule::OrderedRange);
    }

    #[test]
    fn test_equal_or_unfixable_range_invalid() {
        assert!(matches!(
            validator().validate(DraftEstimate::new(500.0, 500.0, 0.7)),
            Validation::Invalid {
                rule: ValidationRule::OrderedRange,
                ..
            }
        ));
        assert!(matches!(
            validator().validate(DraftEstimate::new(-10.0, -20.0, 0.7)),
            Validation::Invalid { .. }
        ));
    }

    #[test]
    fn test_missing_fields_invalid() {
        let draft = DraftEstimate {
            low: None,
            high: Some(100.0),
            confidence: 0.5,
        };
        assert!(matches!(
            validator().validate(draft),
            Validation::Invalid {
                rule: ValidationRule::RequiredFields,
                ..
            }
        ));
        assert!(!validator()
            .validate(DraftEstimate::new(f64::NAN, 100.0, 0.5))
            .is_valid());
    }

    #[test]
    fn test_confidence_clamped() {
        let (draft, corrections, _, _) =
            valid(validator().validate(DraftEstimate::new(100.0, 200.0, 1.4)));
        assert_eq!(draft.confidence, 1.0);
        assert_eq!(corrections[0].rule, ValidationRule::ConfidenceBounds);

        let (draft, _, _, review) = valid(validator().validate(DraftEstimate::new(100.0, 200.0, f64::NAN)));
        assert_eq!(draft.confidence, 0.0);
        assert!(review);
    }

    #[test]
    fn test_review_flags() {
        let (_, _, warnings, review) =
            valid(validator().validate(DraftEstimate::new(20_000.0, 60_000.0, 0.9)));
        assert!(review);
        assert!(warnings[0].contains("exceeds"));

        let (_, _, _, review) = valid(validator().validate(DraftEstimate::new(100.0, 200.0, 0.5)));
        assert!(review);
    }

    #[test]
    fn test_rule_serializes_with_type_tag() {
        let json = serde_json::to_value(ValidationRule::RatioCap).unwrap();
        assert_eq!(json["type"], "ratio_cap");
    }
}
