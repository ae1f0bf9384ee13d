//! Built-in market reference table.
//!
//! Typical repair costs for a mid-size metro market (2024-2025), grouped by
//! trade category with minor/moderate/major tiers and a few named subtypes.

use crate::catalog::CostCatalog;
use crate::table::{ComplexityTier, CostRange};

use ComplexityTier::{Major, Minor, Moderate};

const fn range(low: f64, high: f64) -> CostRange {
    CostRange { low, high }
}

/// (category, tier rows, subtype rows, aliases)
type CategorySeed = (
    &'static str,
    &'static [(ComplexityTier, CostRange)],
    &'static [(&'static str, CostRange)],
    &'static [&'static str],
);

const SEED: &[CategorySeed] = &[
    (
        "roof",
        &[
            (Minor, range(200.0, 500.0)),
            (Moderate, range(500.0, 2000.0)),
            (Major, range(2000.0, 8000.0)),
        ],
        &[
            ("flashing", range(200.0, 500.0)),
            ("replacement", range(8000.0, 25000.0)),
        ],
        &["roofing", "roof covering", "roofs", "roof covering materials"],
    ),
    (
        "electrical",
        &[
            (Minor, range(100.0, 250.0)),
            (Moderate, range(300.0, 800.0)),
            (Major, range(1500.0, 3000.0)),
        ],
        &[
            ("outlet", range(100.0, 250.0)),
            ("circuit", range(300.0, 800.0)),
            ("panel", range(1500.0, 3000.0)),
            ("rewire", range(3000.0, 10000.0)),
        ],
        &["electric", "electrical systems", "service entrance and panels"],
    ),
    (
        "plumbing",
        &[
            (Minor, range(150.0, 400.0)),
            (Moderate, range(400.0, 1500.0)),
            (Major, range(1500.0, 5000.0)),
        ],
        &[
            ("water heater", range(1200.0, 3000.0)),
            ("repipe", range(1500.0, 5000.0)),
            ("sewer", range(1500.0, 5000.0)),
        ],
        &["plumbing systems", "water supply", "drains"],
    ),
    (
        "hvac",
        &[
            (Minor, range(100.0, 300.0)),
            (Moderate, range(300.0, 1000.0)),
            (Major, range(3000.0, 8000.0)),
        ],
        &[
            ("service", range(100.0, 300.0)),
            ("component", range(300.0, 1000.0)),
            ("replacement", range(3000.0, 8000.0)),
        ],
        &[
            "heating",
            "cooling",
            "heating/cooling",
            "air conditioning",
            "hvac systems",
            "heating, ventilation and air conditioning",
        ],
    ),
    (
        "foundation",
        &[
            (Minor, range(500.0, 2000.0)),
            (Moderate, range(2000.0, 8000.0)),
            (Major, range(8000.0, 30000.0)),
        ],
        &[("piers", range(2000.0, 8000.0))],
        &["foundations", "slab"],
    ),
    (
        "structural",
        &[
            (Minor, range(300.0, 1000.0)),
            (Moderate, range(1000.0, 5000.0)),
            (Major, range(5000.0, 20000.0)),
        ],
        &[],
        &["structure", "structural systems", "framing"],
    ),
    (
        "exterior",
        &[
            (Minor, range(200.0, 800.0)),
            (Moderate, range(2000.0, 5000.0)),
            (Major, range(3000.0, 12000.0)),
        ],
        &[
            ("paint", range(2000.0, 5000.0)),
            ("siding", range(3000.0, 12000.0)),
        ],
        &["grounds", "siding", "exterior walls", "cladding"],
    ),
    (
        "interior",
        &[
            (Minor, range(100.0, 500.0)),
            (Moderate, range(300.0, 1500.0)),
            (Major, range(1000.0, 5000.0)),
        ],
        &[
            ("cosmetic", range(100.0, 500.0)),
            ("drywall", range(300.0, 1500.0)),
            ("flooring", range(1000.0, 5000.0)),
        ],
        &["walls", "ceilings", "floors", "interior finishes"],
    ),
    (
        "windows",
        &[
            (Minor, range(100.0, 400.0)),
            (Moderate, range(400.0, 1200.0)),
            (Major, range(2000.0, 8000.0)),
        ],
        &[
            ("repair", range(100.0, 400.0)),
            ("replacement", range(400.0, 1200.0)),
            ("multiple", range(2000.0, 8000.0)),
        ],
        &["doors", "windows/doors", "doors and windows", "glazing"],
    ),
];

impl CostCatalog {
    /// The built-in market table.
    pub fn builtin() -> Self {
        let mut catalog = CostCatalog::new();
        for (category, tiers, subtypes, aliases) in SEED {
            for (tier, range) in tiers.iter() {
                catalog.insert_tier(category, *tier, *range);
            }
            for (subtype, range) in subtypes.iter() {
                catalog.insert_subtype(category, subtype, *range);
            }
            for alias in aliases.iter() {
                catalog = catalog.with_alias(alias, category);
            }
        }
        catalog
    }
}
