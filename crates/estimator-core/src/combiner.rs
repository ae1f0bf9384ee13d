//! Hybrid combination of deterministic and generative candidates.

use crate::config::BlendWeights;
use crate::confidence::SourceAgreement;
use crate::domain::{CandidateSource, EstimateCandidate, EstimationMethod};

/// Result of combining whatever candidates were gathered for an issue.
#[derive(Debug, Clone, PartialEq)]
pub enum Combination {
    Combined(CombinedEstimate),
    /// Nothing to combine; the caller falls back.
    NoCandidate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedEstimate {
    pub low: f64,
    pub high: f64,
    pub method: EstimationMethod,
    pub reasoning: String,
    pub assumptions: Vec<String>,
    pub risk_factors: Vec<String>,
    pub stated_confidence: Option<f64>,
    /// Upper bound on final confidence, set for deterministic-only results.
    pub confidence_ceiling: Option<f64>,
    /// Present only when both kinds of candidate were blended.
    pub agreement: Option<SourceAgreement>,
}

#[derive(Debug, Clone)]
pub struct HybridCombiner {
    weights: BlendWeights,
    lookup_confidence_ceiling: f64,
}

impl HybridCombiner {
    pub fn new(weights: BlendWeights, lookup_confidence_ceiling: f64) -> Self {
        Self {
            weights,
            lookup_confidence_ceiling,
        }
    }

    pub fn combine(
        &self,
        deterministic: Option<EstimateCandidate>,
        generative: Option<EstimateCandidate>,
        category: &str,
    ) -> Combination {
        match (deterministic, generative) {
            (Some(d), Some(g)) => Combination::Combined(self.blend(d, g, category)),
            (Some(d), None) => Combination::Combined(self.deterministic_only(d, category)),
            (None, Some(g)) => Combination::Combined(generative_only(g, category)),
            (None, None) => Combination::NoCandidate,
        }
    }

    fn blend(&self, d: EstimateCandidate, g: EstimateCandidate, category: &str) -> CombinedEstimate {
        let w = &self.weights;
        let low = (w.deterministic_low * d.low + w.generative_low * g.low).round();
        let high = (w.deterministic_high * d.high + w.generative_high * g.high).round();
        let agreement = SourceAgreement {
            deterministic_mid: d.midpoint(),
            generative_mid: g.midpoint(),
        };

        let reasoning = match g.reasoning.filter(|r| !r.trim().is_empty()) {
            Some(text) => text,
            None => synthesized_reasoning(category, d.source, d.low, d.high),
        };

        let mut assumptions = g.assumptions;
        assumptions.push(format!(
            "Blended with {} range ${:.0}-${:.0}",
            source_label(d.source),
            d.low,
            d.high
        ));

        CombinedEstimate {
            low,
            high,
            method: EstimationMethod::Hybrid,
            reasoning,
            assumptions,
            risk_factors: g.risk_factors,
            stated_confidence: g.stated_confidence,
            confidence_ceiling: None,
            agreement: Some(agreement),
        }
    }

    fn deterministic_only(&self, d: EstimateCandidate, category: &str) -> CombinedEstimate {
        let method = match d.source {
            CandidateSource::Formula => EstimationMethod::Formula,
            _ => EstimationMethod::Lookup,
        };
        let reasoning = match d.reasoning {
            Some(text) if !text.trim().is_empty() => text,
            _ => synthesized_reasoning(category, d.source, d.low, d.high),
        };
        let assumptions = if d.assumptions.is_empty() {
            vec![
                format!("Typical {category} repair scope"),
                "Standard materials and regional labor rates".to_string(),
                "No hidden damage beyond what was observed".to_string(),
            ]
        } else {
            d.assumptions
        };
        let risk_factors = if d.risk_factors.is_empty() {
            vec![
                "Actual scope may differ after contractor evaluation".to_string(),
                "Local pricing may vary from reference data".to_string(),
            ]
        } else {
            d.risk_factors
        };

        CombinedEstimate {
            low: d.low,
            high: d.high,
            method,
            reasoning,
            assumptions,
            risk_factors,
            stated_confidence: None,
            confidence_ceiling: Some(self.lookup_confidence_ceiling),
            agreement: None,
        }
    }
}

fn generative_only(g: EstimateCandidate, category: &str) -> CombinedEstimate {
    let reasoning = match g.reasoning {
        Some(text) if !text.trim().is_empty() => text,
        _ => synthesized_reasoning(category, g.source, g.low, g.high),
    };
    CombinedEstimate {
        low: g.low,
        high: g.high,
        method: EstimationMethod::Generative,
        reasoning,
        assumptions: g.assumptions,
        risk_factors: g.risk_factors,
        stated_confidence: g.stated_confidence,
        confidence_ceiling: None,
        agreement: None,
    }
}

fn source_label(source: CandidateSource) -> &'static str {
    match source {
        CandidateSource::Lookup => "reference table",
        CandidateSource::Formula => "per-unit formula",
        CandidateSource::Generative => "generative",
    }
}

fn synthesized_reasoning(category: &str, source: CandidateSource, low: f64, high: f64) -> String {
    format!(
        "Estimate of ${low:.0}-${high:.0} for {category} work based on {} pricing for \
         typical labor and material costs.",
        source_label(source)
    )
}
