//! Concrete cost catalog backing [`ReferenceCostTable`].
//!
//! A catalog holds, per normalized category, a row per complexity tier and
//! optional named subtypes. Aliases map alternative category spellings
//! (e.g. "Roofing", "Heating/Cooling") onto a canonical key.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::TableError;
use crate::table::{normalize_category, ComplexityTier, CostRange, LookupAttributes, ReferenceCostTable};
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq)]
struct CategoryRows {
    tiers: BTreeMap<ComplexityTier, CostRange>,
    subtypes: BTreeMap<String, CostRange>,
}

/// In-memory reference cost table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostCatalog {
    categories: BTreeMap<String, CategoryRows>,
    aliases: BTreeMap<String, String>,
}

impl CostCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the row for `tier` in `category`.
    pub fn with_tier(mut self, category: &str, tier: ComplexityTier, range: CostRange) -> Self {
        self.insert_tier(category, tier, range);
        self
    }

    /// Add or replace a named subtype row in `category`.
    pub fn with_subtype(mut self, category: &str, subtype: &str, range: CostRange) -> Self {
        self.insert_subtype(category, subtype, range);
        self
    }

    /// Register `alias` as another spelling of `category`.
    pub fn with_alias(mut self, alias: &str, category: &str) -> Self {
        self.aliases
            .insert(normalize_category(alias), normalize_category(category));
        self
    }

    pub fn insert_tier(&mut self, category: &str, tier: ComplexityTier, range: CostRange) {
        self.categories
            .entry(normalize_category(category))
            .or_default()
            .tiers
            .insert(tier, range);
    }

    pub fn insert_subtype(&mut self, category: &str, subtype: &str, range: CostRange) {
        self.categories
            .entry(normalize_category(category))
            .or_default()
            .subtypes
            .insert(normalize_category(subtype), range);
    }

    /// Number of canonical categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Canonical category keys in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Parse a catalog from TOML.
    ///
    /// ```toml
    /// [categories.roof]
    /// aliases = ["roofing"]
    /// tiers.minor = { low = 200, high = 500 }
    /// subtypes.replacement = { low = 8000, high = 25000 }
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(input)?;
        let mut catalog = CostCatalog::new();

        for (name, category) in file.categories {
            let key = normalize_category(&name);
            if key.is_empty() {
                return Err(TableError::EmptyCategory);
            }
            for (tier, range) in category.tiers {
                let tier: ComplexityTier = tier.parse()?;
                catalog.insert_tier(&key, tier, CostRange::new(range.low, range.high)?);
            }
            for (subtype, range) in category.subtypes {
                catalog.insert_subtype(&key, &subtype, CostRange::new(range.low, range.high)?);
            }
            for alias in category.aliases {
                catalog
                    .aliases
                    .insert(normalize_category(&alias), key.clone());
            }
            // A category declared with no rows still counts as known.
            catalog.categories.entry(key).or_default();
        }

        debug!(categories = catalog.len(), "loaded cost catalog");
        Ok(catalog)
    }

    /// Load a catalog from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn resolve(&self, category: &str) -> Option<&CategoryRows> {
        let key = normalize_category(category);
        if let Some(rows) = self.lookup_key(&key) {
            return Some(rows);
        }
        // Compound section names such as "grounds/exterior".
        key.split('/')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .find_map(|part| self.lookup_key(part))
    }

    fn lookup_key(&self, key: &str) -> Option<&CategoryRows> {
        self.categories.get(key).or_else(|| {
            self.aliases
                .get(key)
                .and_then(|canonical| self.categories.get(canonical))
        })
    }
}

impl ReferenceCostTable for CostCatalog {
    fn lookup(&self, category: &str, attrs: &LookupAttributes) -> Option<CostRange> {
        let rows = self.resolve(category)?;

        if let Some(subtype) = attrs.subcategory.as_deref() {
            if let Some(range) = rows.subtypes.get(&normalize_category(subtype)) {
                return Some(*range);
            }
        }

        rows.tiers.get(&attrs.tier).copied()
    }
}

// ---------------------------------------------------------------------------
// TOML file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    categories: BTreeMap<String, CategoryFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryFile {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    tiers: BTreeMap<String, RangeFile>,
    #[serde(default)]
    subtypes: BTreeMap<String, RangeFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeFile {
    low: f64,
    high: f64,
}
