//! Cost-Reference: Reference Repair Cost Tables
//!
//! This crate provides the static cost data consumed by the estimator.
//! A table maps a repair category (plus a few attributes) to a market cost
//! range. Lookups are side-effect free and the absence of an entry is a
//! missing candidate, never an error.
//!
//! ## Layer 0 - Reference Data
//!
//! Focus: Read-only keyed lookup, loadable from TOML or built in.

pub mod builtin;
pub mod catalog;
pub mod error;
pub mod table;

pub use catalog::CostCatalog;
pub use error::TableError;
pub use table::{normalize_category, ComplexityTier, CostRange, LookupAttributes, ReferenceCostTable};

/// Result type for table construction and loading.
pub type Result<T> = std::result::Result<T, TableError>;
