//! Estimate request sent across the provider boundary.

use serde::{Deserialize, Serialize};

/// Property-level context forwarded with every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_years: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_sqft: Option<f64>,
    /// Market or city the property is in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl PropertyContext {
    pub fn with_age(mut self, years: u32) -> Self {
        self.age_years = Some(years);
        self
    }

    pub fn with_size(mut self, sqft: f64) -> Self {
        self.size_sqft = Some(sqft);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// One issue's worth of input to a generative provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub issue_id: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub property: PropertyContext,
}

impl EstimateRequest {
    pub fn new(
        issue_id: impl Into<String>,
        category: impl Into<String>,
        severity: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            category: category.into(),
            subcategory: None,
            severity: severity.into(),
            description: description.into(),
            property: PropertyContext::default(),
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_property(mut self, property: PropertyContext) -> Self {
        self.property = property;
        self
    }

    /// Render the request as a plain-text instruction for text-only models.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::from(
            "Estimate the repair cost range in US dollars for the following \
             property inspection issue.\n\n",
        );
        prompt.push_str(&format!("Category: {}\n", self.category));
        if let Some(sub) = &self.subcategory {
            prompt.push_str(&format!("Subcategory: {sub}\n"));
        }
        prompt.push_str(&format!("Severity: {}\n", self.severity));
        prompt.push_str(&format!("Description: {}\n", self.description.trim()));

        if let Some(age) = self.property.age_years {
            prompt.push_str(&format!("Property age: {age} years\n"));
        }
        if let Some(size) = self.property.size_sqft {
            prompt.push_str(&format!("Property size: {size:.0} sq ft\n"));
        }
        if let Some(location) = &self.property.location {
            prompt.push_str(&format!("Market: {location}\n"));
        }

        prompt.push_str(
            "\nRespond with a single JSON object with keys estimated_low, \
             estimated_high, reasoning (at least 100 characters covering labor \
             and materials), assumptions (at least 3), risk_factors (at least 2) \
             and confidence (0-100).",
        );
        prompt
    }
}
