//! Typed provider outcomes and strict response validation.
//!
//! Generative responses arrive as loosely structured JSON. They are checked
//! here once, in full, and either become a [`RawEstimate`] or are rejected
//! wholesale. No field of a rejected response survives.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Minimum narrative length, in characters.
pub const MIN_REASONING_CHARS: usize = 100;
/// Minimum number of stated assumptions.
pub const MIN_ASSUMPTIONS: usize = 3;
/// Minimum number of stated risk factors.
pub const MIN_RISK_FACTORS: usize = 2;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// A fully validated generative estimate.
///
/// `reported_confidence` is passed through exactly as the model stated it;
/// its scale (0-1 or 0-100) is resolved by the consumer on ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEstimate {
    pub estimated_low: f64,
    pub estimated_high: f64,
    pub reasoning: String,
    pub assumptions: Vec<String>,
    pub risk_factors: Vec<String>,
    pub reported_confidence: f64,
}

impl RawEstimate {
    /// Every requirement this estimate fails; empty when it is usable.
    ///
    /// Applies the same rules as [`validate_response`], for estimates that
    /// were built directly rather than parsed.
    pub fn violations(&self) -> Vec<String> {
        let mut missing = Vec::new();
        let low_ok = check_positive(self.estimated_low, "estimated_low", &mut missing);
        let high_ok = check_positive(self.estimated_high, "estimated_high", &mut missing);
        if low_ok && high_ok && self.estimated_high <= self.estimated_low {
            missing.push("estimated_high: must be greater than estimated_low".to_string());
        }
        if self.reasoning.trim().chars().count() < MIN_REASONING_CHARS {
            missing.push(format!(
                "reasoning: shorter than {MIN_REASONING_CHARS} characters"
            ));
        }
        check_count(&self.assumptions, "assumptions", MIN_ASSUMPTIONS, &mut missing);
        check_count(&self.risk_factors, "risk_factors", MIN_RISK_FACTORS, &mut missing);
        if !self.reported_confidence.is_finite() {
            missing.push("confidence: not a finite number".to_string());
        }
        missing
    }

    /// `Success` when the estimate passes every rule, otherwise
    /// `Incomplete` listing every violation.
    pub fn into_outcome(self) -> ProviderOutcome {
        let missing = self.violations();
        if missing.is_empty() {
            ProviderOutcome::Success(self)
        } else {
            ProviderOutcome::Incomplete { missing }
        }
    }
}

fn check_positive(value: f64, field: &str, missing: &mut Vec<String>) -> bool {
    if value.is_finite() && value > 0.0 {
        true
    } else {
        missing.push(format!("{field}: must be a positive number"));
        false
    }
}

fn check_count(items: &[String], field: &str, min: usize, missing: &mut Vec<String>) {
    let given = items.iter().filter(|s| !s.trim().is_empty()).count();
    if given < min {
        missing.push(format!("{field}: {given} given, at least {min} required"));
    }
}

/// Why a provider call produced no usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable transport or server error, retries exhausted
    Transient,
    /// Upstream reports the quota is spent
    QuotaExhausted,
    /// The call did not finish in time
    Timeout,
    /// The call was abandoned
    Cancelled,
    /// Provider is not configured or refuses service
    Unavailable,
    /// Response was not a JSON object
    Malformed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unavailable => "unavailable",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one estimate call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success(RawEstimate),
    /// The response was parsed but violated at least one requirement.
    Incomplete { missing: Vec<String> },
    Failure { kind: FailureKind },
}

impl ProviderOutcome {
    pub fn failure(kind: FailureKind) -> Self {
        Self::Failure { kind }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Short label for logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Incomplete { .. } => "incomplete",
            Self::Failure { kind } => kind.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an untyped response body.
///
/// Every requirement is checked and every violation is reported, so the
/// `missing` list of an `Incomplete` outcome is complete rather than
/// first-failure. A body that is not a JSON object is `Malformed`.
pub fn validate_response(value: &Value) -> ProviderOutcome {
    let Some(obj) = value.as_object() else {
        return ProviderOutcome::failure(FailureKind::Malformed);
    };

    let mut missing = Vec::new();

    let low = positive_number(obj.get("estimated_low"), "estimated_low", &mut missing);
    let high = positive_number(obj.get("estimated_high"), "estimated_high", &mut missing);
    if let (Some(low), Some(high)) = (low, high) {
        if high <= low {
            missing.push("estimated_high: must be greater than estimated_low".to_string());
        }
    }

    let reasoning = match obj.get("reasoning").and_then(Value::as_str) {
        Some(text) if text.trim().chars().count() >= MIN_REASONING_CHARS => {
            Some(text.trim().to_string())
        }
        Some(_) => {
            missing.push(format!(
                "reasoning: shorter than {MIN_REASONING_CHARS} characters"
            ));
            None
        }
        None => {
            missing.push("reasoning: missing".to_string());
            None
        }
    };

    let assumptions = string_list(obj.get("assumptions"), "assumptions", MIN_ASSUMPTIONS, &mut missing);
    let risk_factors = string_list(obj.get("risk_factors"), "risk_factors", MIN_RISK_FACTORS, &mut missing);

    // Some models emit `confidence_score` instead of `confidence`.
    let confidence = match obj.get("confidence").or_else(|| obj.get("confidence_score")) {
        None | Some(Value::Null) => {
            missing.push("confidence: missing".to_string());
            None
        }
        Some(v) => match v.as_f64() {
            Some(c) if c.is_finite() => Some(c),
            _ => {
                missing.push("confidence: not a finite number".to_string());
                None
            }
        },
    };

    match (low, high, reasoning, assumptions, risk_factors, confidence) {
        (Some(low), Some(high), Some(reasoning), Some(assumptions), Some(risk_factors), Some(confidence))
            if missing.is_empty() =>
        {
            RawEstimate {
                estimated_low: low,
                estimated_high: high,
                reasoning,
                assumptions,
                risk_factors,
                reported_confidence: confidence,
            }
            .into_outcome()
        }
        _ => ProviderOutcome::Incomplete { missing },
    }
}

/// Parse a response body and validate it.
///
/// Markdown code fences around the JSON are tolerated.
pub fn parse_response_text(text: &str) -> ProviderOutcome {
    let body = strip_code_fence(text);
    match serde_json::from_str::<Value>(body) {
        Ok(value) => validate_response(&value),
        Err(_) => ProviderOutcome::failure(FailureKind::Malformed),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn positive_number(value: Option<&Value>, field: &str, missing: &mut Vec<String>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => {
            missing.push(format!("{field}: missing"));
            None
        }
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() && n > 0.0 => Some(n),
            Some(_) => {
                missing.push(format!("{field}: must be a positive number"));
                None
            }
            None => {
                missing.push(format!("{field}: not a number"));
                None
            }
        },
    }
}

fn string_list(
    value: Option<&Value>,
    field: &str,
    min: usize,
    missing: &mut Vec<String>,
) -> Option<Vec<String>> {
    let Some(items) = value.and_then(Value::as_array) else {
        missing.push(format!("{field}: missing"));
        return None;
    };

    let items: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if items.len() < min {
        missing.push(format!("{field}: {} given, at least {min} required", items.len()));
        return None;
    }
    Some(items)
}
