//! Regional market adjustment.
//!
//! Reference tables and generative estimates are priced at national
//! averages. A [`MarketAdjustment`] re-prices a combined range for one
//! regional market: a labor and a material premium per trade, a permit fee
//! when the work needs one, and climate surcharges for trades the local
//! climate makes more expensive.
//!
//! The built-in tables describe the Houston market. They only apply once
//! `enabled` is set. A table given in TOML replaces the built-in one
//! whole:
//!
//! ```toml
//! [market]
//! enabled = true
//! region = "austin"
//!
//! [market.labor]
//! hvac = 1.10
//! plumbing = 1.05
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ConfigError, Issue};
use crate::relationship::{infer_trade, Trade};

/// Phrases marking work too small to need a permit.
const PERMIT_EXEMPT_PHRASES: [&str; 9] = [
    "replace filter",
    "change filter",
    "battery",
    "light bulb",
    "outlet cover",
    "switch plate",
    "minor",
    "small repair",
    "touch up",
];

// ---------------------------------------------------------------------------
// Permits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermitKind {
    Electrical,
    Plumbing,
    Mechanical,
    Structural,
    Roofing,
}

impl PermitKind {
    pub const ALL: [PermitKind; 5] = [
        PermitKind::Electrical,
        PermitKind::Plumbing,
        PermitKind::Mechanical,
        PermitKind::Structural,
        PermitKind::Roofing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electrical => "electrical",
            Self::Plumbing => "plumbing",
            Self::Mechanical => "mechanical",
            Self::Structural => "structural",
            Self::Roofing => "roofing",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Electrical => &[
                "electrical", "panel", "circuit", "wiring", "breaker", "outlet", "switch",
                "lighting", "electric",
            ],
            Self::Plumbing => &[
                "plumbing", "pipe", "water line", "drain", "sewer", "water heater", "fixture",
                "faucet", "toilet",
            ],
            Self::Mechanical => &[
                "hvac", "air conditioning", "furnace", "heating", "cooling", "ductwork",
                "ventilation", "ac unit",
            ],
            Self::Structural => &[
                "foundation", "structural", "beam", "joist", "load bearing", "pier", "support",
                "framing",
            ],
            Self::Roofing => &["roof", "roofing", "shingles", "decking", "flashing"],
        }
    }
}

/// Permit required for lowercase issue text, if any. First kind in
/// [`PermitKind::ALL`] order whose keywords match wins.
pub fn permit_for(text: &str) -> Option<PermitKind> {
    if PERMIT_EXEMPT_PHRASES.iter().any(|p| text.contains(p)) {
        return None;
    }
    PermitKind::ALL
        .into_iter()
        .find(|kind| kind.keywords().iter().any(|k| text.contains(k)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermitFee {
    pub low: f64,
    pub high: f64,
}

/// Climate surcharge for one trade: a factor on the material share of the
/// high end plus a fixed amount on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClimateFactor {
    pub material_factor: f64,
    pub fixed_cost: f64,
    pub note: String,
}

// ---------------------------------------------------------------------------
// MarketAdjustment
// ---------------------------------------------------------------------------

/// Trade-keyed adjustment tables. Keys are trade names (`hvac`,
/// `plumbing`, `electrical`, `roofing`, `foundation`, `handyman`,
/// `general`) and permit kinds (`electrical`, `plumbing`, `mechanical`,
/// `structural`, `roofing`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketAdjustment {
    pub enabled: bool,
    pub region: String,
    /// Share of a repair's cost that is labor; the rest is materials.
    pub labor_share: f64,
    pub default_labor: f64,
    pub default_material: f64,
    pub labor: BTreeMap<String, f64>,
    pub material: BTreeMap<String, f64>,
    pub permits: BTreeMap<String, PermitFee>,
    pub climate: BTreeMap<String, ClimateFactor>,
}

impl Default for MarketAdjustment {
    fn default() -> Self {
        let labor = [
            ("hvac", 1.15),
            ("plumbing", 1.12),
            ("electrical", 1.10),
            ("roofing", 1.15),
            ("foundation", 1.25),
            ("general", 1.08),
        ];
        let material = [("hvac", 1.10), ("roofing", 1.08), ("foundation", 1.15)];
        let permits = [
            ("electrical", 150.0, 300.0),
            ("plumbing", 125.0, 250.0),
            ("mechanical", 175.0, 350.0),
            ("structural", 300.0, 600.0),
            ("roofing", 200.0, 400.0),
        ];
        let climate = [
            ("foundation", 1.10, 500.0, "Clay soil drainage and soil testing"),
            ("hvac", 1.08, 300.0, "High-efficiency equipment and humidity control"),
            ("roofing", 1.10, 200.0, "Hurricane-rated materials and attic ventilation"),
        ];

        Self {
            enabled: false,
            region: "houston".to_string(),
            labor_share: 0.5,
            default_labor: 1.10,
            default_material: 1.0,
            labor: labor.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            material: material.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            permits: permits
                .iter()
                .map(|(k, low, high)| (k.to_string(), PermitFee { low: *low, high: *high }))
                .collect(),
            climate: climate
                .iter()
                .map(|(k, factor, fixed, note)| {
                    (
                        k.to_string(),
                        ClimateFactor {
                            material_factor: *factor,
                            fixed_cost: *fixed,
                            note: note.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// A re-priced range and the assumption line describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketAdjusted {
    pub low: f64,
    pub high: f64,
    pub trade: Trade,
    pub permit: Option<PermitKind>,
    pub note: String,
}

impl MarketAdjustment {
    /// Built-in tables, switched on.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn labor_multiplier(&self, trade: Trade) -> f64 {
        self.labor.get(trade.as_str()).copied().unwrap_or(self.default_labor)
    }

    pub fn material_multiplier(&self, trade: Trade) -> f64 {
        self.material
            .get(trade.as_str())
            .copied()
            .unwrap_or(self.default_material)
    }

    /// Re-price `low..high` for `issue`. `None` when disabled.
    pub fn adjust(&self, issue: &Issue, low: f64, high: f64) -> Option<MarketAdjusted> {
        if !self.enabled {
            return None;
        }
        let text = issue.searchable_text();
        let trade = infer_trade(&text);
        let labor = self.labor_multiplier(trade);
        let material = self.material_multiplier(trade);
        let climate = self.climate.get(trade.as_str());
        let climate_factor = climate.map_or(1.0, |c| c.material_factor);
        let fixed = climate.map_or(0.0, |c| c.fixed_cost);

        let permit = permit_for(&text);
        let fee = permit
            .and_then(|kind| self.permits.get(kind.as_str()))
            .copied()
            .unwrap_or(PermitFee { low: 0.0, high: 0.0 });

        let labor_share = self.labor_share;
        let low_factor = labor_share * labor + (1.0 - labor_share) * material;
        let high_factor = labor_share * labor + (1.0 - labor_share) * material * climate_factor;
        let adjusted_low = (low * low_factor + fee.low + fixed).round();
        let adjusted_high = (high * high_factor + fee.high + fixed).round();

        let mut parts = vec![format!(
            "{} market adjustment ({trade}): labor {:+.0}%, materials {:+.0}%",
            self.region,
            (labor - 1.0) * 100.0,
            (material - 1.0) * 100.0
        )];
        if let Some(kind) = permit {
            parts.push(format!(
                "permit ({}) ${:.0}-${:.0}",
                kind.as_str(),
                fee.low,
                fee.high
            ));
        }
        if let Some(c) = climate {
            parts.push(format!("{} (+${:.0})", c.note, c.fixed_cost));
        }

        debug!(
            issue_id = %issue.id,
            trade = %trade,
            low,
            high,
            adjusted_low,
            adjusted_high,
            "market adjustment applied"
        );
        Some(MarketAdjusted {
            low: adjusted_low,
            high: adjusted_high,
            trade,
            permit,
            note: parts.join("; "),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.labor_share.is_finite() && (0.0..=1.0).contains(&self.labor_share)) {
            return Err(ConfigError::invalid("market.labor_share", "must be within [0, 1]"));
        }
        let multipliers = [
            ("market.default_labor".to_string(), self.default_labor),
            ("market.default_material".to_string(), self.default_material),
        ]
        .into_iter()
        .chain(self.labor.iter().map(|(k, v)| (format!("market.labor.{k}"), *v)))
        .chain(self.material.iter().map(|(k, v)| (format!("market.material.{k}"), *v)))
        .chain(
            self.climate
                .iter()
                .map(|(k, c)| (format!("market.climate.{k}.material_factor"), c.material_factor)),
        );
        for (field, value) in multipliers {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(&field, "must be a positive number"));
            }
        }
        for (kind, fee) in &self.permits {
            if !(fee.low.is_finite() && fee.high.is_finite() && 0.0 <= fee.low && fee.low <= fee.high)
            {
                return Err(ConfigError::invalid(
                    &format!("market.permits.{kind}"),
                    "must satisfy 0 <= low <= high",
                ));
            }
        }
        for (trade, climate) in &self.climate {
            if !(climate.fixed_cost.is_finite() && climate.fixed_cost >= 0.0) {
                return Err(ConfigError::invalid(
                    &format!("market.climate.{trade}.fixed_cost"),
                    "must be non-negative",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let issue = Issue::new("a", "plumbing", 0.9, "Leak at water heater");
        assert!(MarketAdjustment::default().adjust(&issue, 300.0, 900.0).is_none());
    }

    #[test]
    fn test_plumbing_labor_premium_and_permit() {
        // factor 0.5 * 1.12 + 0.5 * 1.0 = 1.06
        let issue = Issue::new("a", "plumbing", 0.9, "Corroded drain pipe under sink");
        let adjusted = MarketAdjustment::enabled().adjust(&issue, 1000.0, 2000.0).unwrap();
        assert_eq!(adjusted.trade, Trade::Plumbing);
        assert_eq!(adjusted.permit, Some(PermitKind::Plumbing));
        assert_eq!(adjusted.low, 1060.0 + 125.0);
        assert_eq!(adjusted.high, 2120.0 + 250.0);
        assert!(adjusted.note.contains("labor +12%"));
        assert!(adjusted.note.contains("permit (plumbing) $125-$250"));
    }

    #[test]
    fn test_climate_surcharge_applies_to_high_materials() {
        // low factor 0.5 * 1.15 + 0.5 * 1.10 = 1.125
        // high factor 0.5 * 1.15 + 0.5 * 1.10 * 1.08 = 1.169
        let issue = Issue::new("a", "hvac", 0.9, "Furnace heat exchanger cracked");
        let adjusted = MarketAdjustment::enabled().adjust(&issue, 1000.0, 2000.0).unwrap();
        assert_eq!(adjusted.permit, Some(PermitKind::Mechanical));
        assert_eq!(adjusted.low, 1125.0 + 175.0 + 300.0);
        assert_eq!(adjusted.high, 2338.0 + 350.0 + 300.0);
        assert!(adjusted.note.contains("humidity control"));
    }

    #[test]
    fn test_minor_work_needs_no_permit() {
        assert_eq!(permit_for("replace filter on return"), None);
        assert_eq!(permit_for("missing outlet cover in garage"), None);
        assert_eq!(permit_for("breaker trips under load"), Some(PermitKind::Electrical));
        assert_eq!(permit_for("loose railing"), None);
    }

    #[test]
    fn test_general_trade_uses_table_default() {
        let market = MarketAdjustment::enabled();
        assert_eq!(market.labor_multiplier(Trade::General), 1.08);
        assert_eq!(market.labor_multiplier(Trade::Handyman), 1.10);
        assert_eq!(market.material_multiplier(Trade::Plumbing), 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut market = MarketAdjustment::enabled();
        market.labor_share = 1.5;
        assert!(market.validate().is_err());

        let mut market = MarketAdjustment::enabled();
        market.permits.insert("roofing".into(), PermitFee { low: 500.0, high: 100.0 });
        assert!(matches!(
            market.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "market.permits.roofing"
        ));

        assert!(MarketAdjustment::default().validate().is_ok());
    }
}
