//! Domain models for the estimator.
//!
//! Canonical definitions for the core entities:
//! - `Issue`: Classified inspection finding (input)
//! - `EstimateCandidate`: Unvalidated proposal from one source
//! - `CostEstimate`: Final per-issue estimate (output)
//! - `ConfidenceBreakdown`: Per-dimension confidence scores
//! - `IssueGroup`: Bundling group for aggregate totals

pub mod breakdown;
pub mod error;
pub mod estimate;
pub mod group;
pub mod issue;

pub use breakdown::{ConfidenceBreakdown, Dimension, DimensionGap, Recommendation};
pub use error::{ConfigError, EstimatorError, Result};
pub use estimate::{CandidateSource, CostEstimate, EstimateCandidate, EstimationMethod};
pub use group::{group_id, GroupType, IssueGroup};
pub use issue::{load_issues, load_issues_from_str, Complexity, Issue, Location, Severity, Taxonomy};
