//! Engine configuration.
//!
//! Every knob has a default; a TOML file only needs to name what it
//! overrides. Unknown keys are rejected and [`EngineConfig::validate`] runs
//! on every load.
//!
//! ```toml
//! max_cost_ratio = 10.0
//! daily_quota = 100
//!
//! [blend]
//! deterministic_low = 0.6
//! generative_low = 0.4
//!
//! [bundling]
//! causal_chain = 0.25
//!
//! [market]
//! enabled = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigError, Dimension, GroupType};
use crate::market::MarketAdjustment;

const WEIGHT_EPSILON: f64 = 1e-6;

/// Lower and upper bound for any bundling discount.
pub const MIN_BUNDLE_DISCOUNT: f64 = 0.15;
pub const MAX_BUNDLE_DISCOUNT: f64 = 0.25;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Hybrid blend weights. Each low pair and each high pair sums to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlendWeights {
    pub deterministic_low: f64,
    pub generative_low: f64,
    pub deterministic_high: f64,
    pub generative_high: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            deterministic_low: 0.6,
            generative_low: 0.4,
            deterministic_high: 0.4,
            generative_high: 0.6,
        }
    }
}

/// Discount fraction per group type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundlingDiscounts {
    pub causal_chain: f64,
    pub location_trade: f64,
    pub category_work: f64,
}

impl Default for BundlingDiscounts {
    fn default() -> Self {
        Self {
            causal_chain: 0.25,
            location_trade: 0.20,
            category_work: 0.15,
        }
    }
}

impl BundlingDiscounts {
    /// Discount for `group_type`, clamped to the allowed band.
    pub fn discount(&self, group_type: GroupType) -> f64 {
        let raw = match group_type {
            GroupType::CausalChain => self.causal_chain,
            GroupType::LocationTrade => self.location_trade,
            GroupType::CategoryWork => self.category_work,
        };
        raw.clamp(MIN_BUNDLE_DISCOUNT, MAX_BUNDLE_DISCOUNT)
    }
}

/// Taxonomy-confidence thresholds used by strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyThresholds {
    pub high_confidence: f64,
    pub moderate_confidence: f64,
    pub low_confidence: f64,
    /// Descriptions longer than this are treated as needing context.
    pub long_description_chars: usize,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            high_confidence: 0.8,
            moderate_confidence: 0.5,
            low_confidence: 0.3,
            long_description_chars: 400,
        }
    }
}

/// Weight per confidence dimension. Must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfidenceWeights {
    pub range_quality: f64,
    pub reasoning_quality: f64,
    pub taxonomy_quality: f64,
    pub source_quality: f64,
    pub consistency_quality: f64,
    pub severity_alignment: f64,
    pub stated_confidence: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            range_quality: 0.20,
            reasoning_quality: 0.15,
            taxonomy_quality: 0.15,
            source_quality: 0.15,
            consistency_quality: 0.15,
            severity_alignment: 0.10,
            stated_confidence: 0.10,
        }
    }
}

impl ConfidenceWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::RangeQuality => self.range_quality,
            Dimension::ReasoningQuality => self.reasoning_quality,
            Dimension::TaxonomyQuality => self.taxonomy_quality,
            Dimension::SourceQuality => self.source_quality,
            Dimension::ConsistencyQuality => self.consistency_quality,
            Dimension::SeverityAlignment => self.severity_alignment,
            Dimension::StatedConfidence => self.stated_confidence,
        }
    }

    pub fn total(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest allowed `high / low`.
    pub max_cost_ratio: f64,
    /// Ratio-cap correction sets `high = low * fallback_cap_multiplier`.
    pub fallback_cap_multiplier: f64,
    /// Floor used when a non-positive low is corrected.
    pub minimum_floor: f64,
    /// Estimates with a high above this are flagged for review.
    pub review_cost_threshold: f64,
    /// Estimates with confidence below this are flagged for review.
    pub review_confidence_threshold: f64,
    /// More warnings than this flags the estimate for review.
    pub max_warnings_before_review: usize,
    pub daily_quota: u64,
    /// Confidence ceiling for lookup/formula-only estimates.
    pub lookup_confidence_ceiling: f64,
    pub fallback_confidence: f64,
    pub provider_timeout_ms: u64,
    pub max_concurrency: usize,
    pub blend: BlendWeights,
    pub bundling: BundlingDiscounts,
    pub strategy: StrategyThresholds,
    pub confidence: ConfidenceWeights,
    /// Regional re-pricing; off unless `market.enabled` is set.
    pub market: MarketAdjustment,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cost_ratio: 10.0,
            fallback_cap_multiplier: 5.0,
            minimum_floor: 100.0,
            review_cost_threshold: 50_000.0,
            review_confidence_threshold: 0.6,
            max_warnings_before_review: 3,
            daily_quota: 100,
            lookup_confidence_ceiling: 0.6,
            fallback_confidence: 0.4,
            provider_timeout_ms: 30_000,
            max_concurrency: 4,
            blend: BlendWeights::default(),
            bundling: BundlingDiscounts::default(),
            strategy: StrategyThresholds::default(),
            confidence: ConfidenceWeights::default(),
            market: MarketAdjustment::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_daily_quota(mut self, daily_quota: u64) -> Self {
        self.daily_quota = daily_quota;
        self
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Reject values and combinations the engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_cost_ratio.is_finite() && self.max_cost_ratio > 1.0) {
            return Err(ConfigError::invalid("max_cost_ratio", "must be a finite number greater than 1"));
        }
        if !(self.fallback_cap_multiplier.is_finite() && self.fallback_cap_multiplier > 1.0) {
            return Err(ConfigError::invalid(
                "fallback_cap_multiplier",
                "must be a finite number greater than 1",
            ));
        }
        if self.fallback_cap_multiplier > self.max_cost_ratio {
            return Err(ConfigError::invalid(
                "fallback_cap_multiplier",
                format!(
                    "{} exceeds max_cost_ratio {}; capped ranges would still violate the ratio",
                    self.fallback_cap_multiplier, self.max_cost_ratio
                ),
            ));
        }
        if !(self.minimum_floor.is_finite() && self.minimum_floor > 0.0) {
            return Err(ConfigError::invalid("minimum_floor", "must be positive"));
        }
        if !(self.review_cost_threshold.is_finite() && self.review_cost_threshold > 0.0) {
            return Err(ConfigError::invalid("review_cost_threshold", "must be positive"));
        }
        check_unit("review_confidence_threshold", self.review_confidence_threshold)?;
        check_unit("lookup_confidence_ceiling", self.lookup_confidence_ceiling)?;
        check_unit("fallback_confidence", self.fallback_confidence)?;
        if self.provider_timeout_ms == 0 {
            return Err(ConfigError::invalid("provider_timeout_ms", "must be non-zero"));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid("max_concurrency", "must be at least 1"));
        }

        let blend = &self.blend;
        for (field, value) in [
            ("blend.deterministic_low", blend.deterministic_low),
            ("blend.generative_low", blend.generative_low),
            ("blend.deterministic_high", blend.deterministic_high),
            ("blend.generative_high", blend.generative_high),
        ] {
            check_unit(field, value)?;
        }
        if ((blend.deterministic_low + blend.generative_low) - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::invalid("blend", "low weights must sum to 1"));
        }
        if ((blend.deterministic_high + blend.generative_high) - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::invalid("blend", "high weights must sum to 1"));
        }

        for (field, value) in [
            ("bundling.causal_chain", self.bundling.causal_chain),
            ("bundling.location_trade", self.bundling.location_trade),
            ("bundling.category_work", self.bundling.category_work),
        ] {
            check_unit(field, value)?;
        }

        let s = &self.strategy;
        for (field, value) in [
            ("strategy.low_confidence", s.low_confidence),
            ("strategy.moderate_confidence", s.moderate_confidence),
            ("strategy.high_confidence", s.high_confidence),
        ] {
            check_unit(field, value)?;
        }
        if !(s.low_confidence <= s.moderate_confidence && s.moderate_confidence <= s.high_confidence) {
            return Err(ConfigError::invalid(
                "strategy",
                "thresholds must satisfy low <= moderate <= high",
            ));
        }

        for dimension in Dimension::ALL {
            let weight = self.confidence.weight(dimension);
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(ConfigError::invalid(
                    &format!("confidence.{dimension}"),
                    "must be a non-negative number",
                ));
            }
        }
        let total = self.confidence.total();
        if (total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::invalid(
                "confidence",
                format!("weights sum to {total:.4}, expected 1"),
            ));
        }

        self.market.validate()
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")))
    }
}
