//! Estimator-Core: Inspection Repair Cost Estimation
//!
//! Turns classified inspection issues into validated repair cost ranges,
//! each with a confidence score and an explanation, then groups related
//! issues for bundled totals.
//!
//! ## Layer 2 - Estimation Engine
//!
//! Focus: Strategy selection, hybrid combination, regional pricing,
//! confidence scoring, validation with fallback, relationship bundling.
//!
//! ## Pipeline
//!
//! ```text
//! Issue -> StrategySelector -> {table, formula, provider} -> HybridCombiner
//!       -> MarketAdjustment -> ConfidenceScorer -> Validator -> CostEstimate
//!                                   \-> FallbackEstimator (no candidate / invalid)
//!
//! all estimates -> RelationshipAnalyzer -> IssueGroup[] -> CostSummary
//! ```

pub mod aggregate;
pub mod combiner;
pub mod confidence;
pub mod config;
pub mod domain;
pub mod engine;
pub mod fallback;
pub mod formula;
pub mod market;
pub mod relationship;
pub mod stats;
pub mod strategy;
pub mod validator;

pub use aggregate::{summarize, CostSummary};
pub use combiner::{Combination, CombinedEstimate, HybridCombiner};
pub use confidence::{normalize_confidence, ConfidenceScorer, ScoringInput, SourceAgreement};
pub use config::{
    BlendWeights, BundlingDiscounts, ConfidenceWeights, EngineConfig, StrategyThresholds,
};
pub use domain::{
    load_issues, load_issues_from_str, CandidateSource, Complexity, ConfidenceBreakdown,
    ConfigError, CostEstimate, Dimension, DimensionGap, EstimateCandidate, EstimationMethod,
    EstimatorError, GroupType, Issue, IssueGroup, Location, Recommendation, Result, Severity,
    Taxonomy,
};
pub use engine::{BatchReport, EstimationEngine};
pub use fallback::FallbackEstimator;
pub use formula::{extract_measurement, CostFormula, FormulaBook, MeasureUnit, Measurement};
pub use market::{
    permit_for, ClimateFactor, MarketAdjusted, MarketAdjustment, PermitFee, PermitKind,
};
pub use relationship::{infer_trade, infer_work_type, BatchSnapshot, RelationshipAnalyzer, Trade, WorkType};
pub use stats::{EngineStats, StatsSnapshot};
pub use strategy::{Strategy, StrategyDecision, StrategySelector};
pub use validator::{Correction, DraftEstimate, ValidRange, Validation, ValidationRule, Validator};
