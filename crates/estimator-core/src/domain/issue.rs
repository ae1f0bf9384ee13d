//! Inspection issue records consumed by the engine.
//!
//! Issues arrive already classified. The engine reads them and never
//! mutates them. The one transformation applied on the way in is scale
//! normalization of the taxonomy confidence, which happens during
//! deserialization so that no later stage ever sees a value of unknown scale.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use cost_reference::{ComplexityTier, LookupAttributes};
use genai_provider::{EstimateRequest, PropertyContext};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::confidence::normalize_confidence;
use crate::domain::error::{EstimatorError, Result};

// ---------------------------------------------------------------------------
// Severity / complexity
// ---------------------------------------------------------------------------

/// Inspection severity. Parsing is lenient: unknown labels map to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

impl From<&str> for Severity {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "safety" | "urgent" | "immediate" => Self::Critical,
            "high" | "major" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" | "minor" => Self::Low,
            "info" | "informational" | "maintenance" => Self::Info,
            _ => Self::Medium,
        }
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repair complexity as judged by enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Reference-table tier for this complexity.
    pub fn tier(&self) -> ComplexityTier {
        match self {
            Self::Low => ComplexityTier::Minor,
            Self::Medium => ComplexityTier::Moderate,
            Self::High => ComplexityTier::Major,
        }
    }
}

impl From<String> for Complexity {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "simple" | "minor" => Self::Low,
            "high" | "complex" | "major" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl Default for Complexity {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Taxonomy / location
// ---------------------------------------------------------------------------

/// Classification produced by enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// Classification confidence in [0, 1]. `None` when the source value
    /// was missing or unusable.
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub confidence: Option<f64>,
}

impl Taxonomy {
    /// Build from a raw confidence of either scale.
    pub fn new(category: impl Into<String>, raw_confidence: f64) -> Self {
        Self {
            category: category.into(),
            subcategory: None,
            confidence: normalize_confidence(raw_confidence),
        }
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let normalized = normalize_confidence(value);
        if normalized.is_none() {
            warn!(value, "unusable taxonomy confidence discarded");
        }
        normalized
    }))
}

/// Where in the property an issue was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LocationRepr")]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocationRepr {
    Text(String),
    Parts {
        #[serde(default)]
        area: Option<String>,
        #[serde(default)]
        detail: Option<String>,
    },
    /// `"location": null`
    Unknown(()),
}

impl From<LocationRepr> for Location {
    fn from(repr: LocationRepr) -> Self {
        match repr {
            LocationRepr::Text(area) => Location {
                area: Some(area),
                detail: None,
            },
            LocationRepr::Parts { area, detail } => Location { area, detail },
            LocationRepr::Unknown(()) => Location::default(),
        }
    }
}

impl Location {
    pub fn area(area: impl Into<String>) -> Self {
        Self {
            area: Some(area.into()),
            detail: None,
        }
    }

    /// Normalized grouping key, or `None` when the location is unknown.
    pub fn key(&self) -> Option<String> {
        let area = self.area.as_deref()?;
        let key = area
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match key.as_str() {
            "" | "unknown" | "not specified" | "n/a" | "na" | "none" => None,
            _ => Some(key),
        }
    }
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// One classified inspection finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    /// Report section the issue was found in.
    #[serde(default)]
    pub section: String,
    pub taxonomy: Taxonomy,
    #[serde(default)]
    pub severity: Severity,
    /// Urgency on a 0-10 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_score: Option<f64>,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub location: Location,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Issue {
    /// Minimal issue, mostly for tests and programmatic callers.
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        raw_confidence: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            section: String::new(),
            taxonomy: Taxonomy::new(category, raw_confidence),
            severity: Severity::Medium,
            urgency_score: None,
            complexity: Complexity::Medium,
            location: Location::default(),
            description: description.into(),
            title: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_location(mut self, area: &str) -> Self {
        self.location = Location::area(area);
        self
    }

    pub fn with_section(mut self, section: &str) -> Self {
        self.section = section.to_string();
        self
    }

    pub fn with_subcategory(mut self, subcategory: &str) -> Self {
        self.taxonomy.subcategory = Some(subcategory.to_string());
        self
    }

    pub fn with_urgency(mut self, urgency: f64) -> Self {
        self.urgency_score = Some(urgency);
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn category(&self) -> &str {
        &self.taxonomy.category
    }

    /// Normalized taxonomy confidence, 0 when unusable.
    pub fn taxonomy_confidence(&self) -> f64 {
        self.taxonomy.confidence.unwrap_or(0.0)
    }

    /// Short human label for the estimate.
    pub fn item(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.trim().to_string();
        }
        let description = self.description.trim();
        if description.is_empty() {
            return self.taxonomy.category.clone();
        }
        let mut item: String = description.chars().take(60).collect();
        if description.chars().count() > 60 {
            item.push_str("...");
        }
        item
    }

    /// Lowercased text used for keyword matching.
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![self.taxonomy.category.as_str()];
        if let Some(sub) = self.taxonomy.subcategory.as_deref() {
            parts.push(sub);
        }
        if let Some(title) = self.title.as_deref() {
            parts.push(title);
        }
        parts.push(&self.description);
        parts.join(" ").to_lowercase()
    }

    /// Normalized section name, if any.
    pub fn section_key(&self) -> Option<String> {
        let key = self.section.trim().to_lowercase();
        (!key.is_empty()).then_some(key)
    }

    pub fn lookup_attributes(&self) -> LookupAttributes {
        let attrs = LookupAttributes::tier(self.complexity.tier());
        match self.taxonomy.subcategory.as_deref() {
            Some(sub) if !sub.trim().is_empty() => attrs.with_subcategory(sub),
            _ => attrs,
        }
    }

    /// Provider request for this issue.
    pub fn to_request(&self, property: &PropertyContext) -> EstimateRequest {
        let mut request = EstimateRequest::new(
            self.id.clone(),
            self.taxonomy.category.clone(),
            self.severity.as_str(),
            self.description.clone(),
        )
        .with_property(property.clone());
        if let Some(sub) = &self.taxonomy.subcategory {
            request = request.with_subcategory(sub.clone());
        }
        request
    }
}

/// Parse a JSON array of issues, rejecting duplicate ids.
pub fn load_issues_from_str(input: &str) -> Result<Vec<Issue>> {
    let issues: Vec<Issue> = serde_json::from_str(input)?;
    let mut seen = HashSet::new();
    for issue in &issues {
        if !seen.insert(issue.id.as_str()) {
            return Err(EstimatorError::DuplicateIssueId(issue.id.clone()));
        }
    }
    Ok(issues)
}

/// Read and parse an issues file.
pub fn load_issues(path: &Path) -> Result<Vec<Issue>> {
    let content = std::fs::read_to_string(path)?;
    load_issues_from_str(&content)
}
