//! Per-unit repair formulas.
//!
//! Some work is priced by area or length rather than by item. When an
//! issue's category matches a formula and its description states a
//! measurement, the formula yields a deterministic candidate.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{CandidateSource, EstimateCandidate, Issue};

/// Unit a formula is priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureUnit {
    SquareFeet,
    LinearFeet,
}

impl MeasureUnit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SquareFeet => "sq ft",
            Self::LinearFeet => "linear ft",
        }
    }
}

/// A measurement found in free text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub quantity: f64,
    pub unit: MeasureUnit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostFormula {
    pub name: String,
    /// Lowercase phrases that select this formula.
    pub keywords: Vec<String>,
    pub unit: MeasureUnit,
    pub labor_per_unit: (f64, f64),
    pub material_per_unit: (f64, f64),
    pub minimum_charge: f64,
}

impl CostFormula {
    fn new(
        name: &str,
        keywords: &[&str],
        unit: MeasureUnit,
        labor_per_unit: (f64, f64),
        material_per_unit: (f64, f64),
        minimum_charge: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            unit,
            labor_per_unit,
            material_per_unit,
            minimum_charge,
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// `(low, high)` for `quantity` units.
    pub fn price(&self, quantity: f64) -> (f64, f64) {
        let labor_min = quantity * self.labor_per_unit.0;
        let labor_max = quantity * self.labor_per_unit.1;
        let material_min = quantity * self.material_per_unit.0;
        let material_max = quantity * self.material_per_unit.1;

        let low = (labor_min + material_min).max(self.minimum_charge);
        let mut high = labor_max + material_max;
        if high <= low {
            high = low * 1.5;
        }
        (round2(low), round2(high))
    }
}

#[derive(Debug, Clone)]
pub struct FormulaBook {
    formulas: Vec<CostFormula>,
}

impl Default for FormulaBook {
    fn default() -> Self {
        Self {
            formulas: vec![
                CostFormula::new(
                    "painting",
                    &["painting", "repaint"],
                    MeasureUnit::SquareFeet,
                    (1.5, 3.0),
                    (0.5, 1.0),
                    150.0,
                ),
                CostFormula::new(
                    "drywall_repair",
                    &["drywall"],
                    MeasureUnit::SquareFeet,
                    (2.0, 4.0),
                    (0.75, 1.5),
                    100.0,
                ),
                CostFormula::new(
                    "flooring",
                    &["flooring", "floor covering"],
                    MeasureUnit::SquareFeet,
                    (3.0, 6.0),
                    (2.0, 8.0),
                    300.0,
                ),
                CostFormula::new(
                    "fence_repair",
                    &["fence"],
                    MeasureUnit::LinearFeet,
                    (15.0, 30.0),
                    (10.0, 25.0),
                    200.0,
                ),
            ],
        }
    }
}

impl FormulaBook {
    pub fn empty() -> Self {
        Self {
            formulas: Vec::new(),
        }
    }

    pub fn with_formula(mut self, formula: CostFormula) -> Self {
        self.formulas.push(formula);
        self
    }

    pub fn formulas(&self) -> &[CostFormula] {
        &self.formulas
    }

    /// First formula whose keywords appear in the issue text.
    pub fn formula_for(&self, issue: &Issue) -> Option<&CostFormula> {
        let text = issue.searchable_text();
        self.formulas.iter().find(|f| f.matches(&text))
    }

    /// Formula candidate, or `None` when no formula applies or the
    /// description carries no measurement in the formula's unit.
    pub fn estimate(&self, issue: &Issue) -> Option<EstimateCandidate> {
        let formula = self.formula_for(issue)?;
        let measurement = extract_measurement(&issue.description)?;
        if measurement.unit != formula.unit || measurement.quantity <= 0.0 {
            return None;
        }

        let (low, high) = formula.price(measurement.quantity);
        let unit = formula.unit.label();
        let reasoning = format!(
            "Formula-based {} estimate for {} {unit}: labor ${:.2}-${:.2} per {unit} plus \
             materials ${:.2}-${:.2} per {unit}, minimum charge ${:.0}.",
            formula.name,
            measurement.quantity,
            formula.labor_per_unit.0,
            formula.labor_per_unit.1,
            formula.material_per_unit.0,
            formula.material_per_unit.1,
            formula.minimum_charge,
        );

        Some(EstimateCandidate {
            low,
            high,
            reasoning: Some(reasoning),
            assumptions: vec![
                format!("Measured quantity of {} {unit} is accurate", measurement.quantity),
                "Standard materials and finish quality".to_string(),
                "Normal site access".to_string(),
            ],
            risk_factors: vec![
                "Hidden damage discovered during work".to_string(),
                "Regional labor rates differ from averages".to_string(),
            ],
            stated_confidence: None,
            source: CandidateSource::Formula,
        })
    }
}

fn square_feet_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:square\s*feet|sq\.?\s*ft\.?|sf)\b").ok())
        .as_ref()
}

fn linear_feet_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:linear\s*feet|lf|feet|ft)\b").ok())
        .as_ref()
}

fn first_quantity(pattern: Option<&Regex>, text: &str) -> Option<f64> {
    pattern?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
}

/// Square feet take precedence; linear feet are read only when no area is
/// stated.
pub fn extract_measurement(text: &str) -> Option<Measurement> {
    if let Some(quantity) = first_quantity(square_feet_pattern(), text) {
        return Some(Measurement {
            quantity,
            unit: MeasureUnit::SquareFeet,
        });
    }
    first_quantity(linear_feet_pattern(), text).map(|quantity| Measurement {
        quantity,
        unit: MeasureUnit::LinearFeet,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
