//! Confidence breakdown attached to each scored estimate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scored confidence dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    RangeQuality,
    ReasoningQuality,
    TaxonomyQuality,
    SourceQuality,
    ConsistencyQuality,
    SeverityAlignment,
    StatedConfidence,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Self::RangeQuality,
        Self::ReasoningQuality,
        Self::TaxonomyQuality,
        Self::SourceQuality,
        Self::ConsistencyQuality,
        Self::SeverityAlignment,
        Self::StatedConfidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RangeQuality => "range_quality",
            Self::ReasoningQuality => "reasoning_quality",
            Self::TaxonomyQuality => "taxonomy_quality",
            Self::SourceQuality => "source_quality",
            Self::ConsistencyQuality => "consistency_quality",
            Self::SeverityAlignment => "severity_alignment",
            Self::StatedConfidence => "stated_confidence",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dimension scored 0 because its input was missing, unusable or not
/// applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionGap {
    pub dimension: Dimension,
    pub reason: String,
}

/// Coarse reading of an overall confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl Recommendation {
    pub fn from_score(overall: f64) -> Self {
        if overall >= 0.85 {
            Self::Excellent
        } else if overall >= 0.70 {
            Self::Good
        } else if overall >= 0.55 {
            Self::Fair
        } else if overall >= 0.40 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Excellent => "High confidence - estimate is reliable",
            Self::Good => "Good confidence - minor variations expected",
            Self::Fair => "Fair confidence - recommend professional inspection",
            Self::Poor => "Low confidence - professional inspection strongly recommended",
            Self::VeryPoor => "Very low confidence - on-site evaluation required",
        }
    }
}

/// Per-dimension scores, the weights used, and the weighted overall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub dimensions: BTreeMap<Dimension, f64>,
    pub weights: BTreeMap<Dimension, f64>,
    pub overall: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<DimensionGap>,
}

impl ConfidenceBreakdown {
    pub fn score(&self, dimension: Dimension) -> f64 {
        self.dimensions.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn recommendation(&self) -> Recommendation {
        Recommendation::from_score(self.overall)
    }

    /// Dimensions scoring below `threshold`, weakest first.
    pub fn weak_dimensions(&self, threshold: f64) -> Vec<Dimension> {
        let mut weak: Vec<(Dimension, f64)> = self
            .dimensions
            .iter()
            .filter(|(_, score)| **score < threshold)
            .map(|(d, s)| (*d, *s))
            .collect();
        weak.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        weak.into_iter().map(|(d, _)| d).collect()
    }

    pub fn has_gap(&self, dimension: Dimension) -> bool {
        self.gaps.iter().any(|g| g.dimension == dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_tiers() {
        assert_eq!(Recommendation::from_score(0.9), Recommendation::Excellent);
        assert_eq!(Recommendation::from_score(0.85), Recommendation::Excellent);
        assert_eq!(Recommendation::from_score(0.7), Recommendation::Good);
        assert_eq!(Recommendation::from_score(0.6), Recommendation::Fair);
        assert_eq!(Recommendation::from_score(0.4), Recommendation::Poor);
        assert_eq!(Recommendation::from_score(0.1), Recommendation::VeryPoor);
    }

    #[test]
    fn test_weak_dimensions_sorted_weakest_first() {
        let dimensions = BTreeMap::from([
            (Dimension::RangeQuality, 0.5),
            (Dimension::SourceQuality, 1.0),
            (Dimension::ConsistencyQuality, 0.0),
            (Dimension::ReasoningQuality, 0.3),
        ]);
        let breakdown = ConfidenceBreakdown {
            dimensions,
            weights: BTreeMap::new(),
            overall: 0.5,
            gaps: vec![],
        };
        assert_eq!(
            breakdown.weak_dimensions(0.6),
            vec![
                Dimension::ConsistencyQuality,
                Dimension::ReasoningQuality,
                Dimension::RangeQuality
            ]
        );
        assert_eq!(breakdown.recommendation(), Recommendation::Poor);
    }

    #[test]
    fn test_breakdown_json_uses_dimension_names() {
        let breakdown = ConfidenceBreakdown {
            dimensions: BTreeMap::from([(Dimension::StatedConfidence, 0.85)]),
            weights: BTreeMap::from([(Dimension::StatedConfidence, 0.1)]),
            overall: 0.085,
            gaps: vec![],
        };
        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["dimensions"]["stated_confidence"], 0.85);
    }
}
