//! Bundling groups produced by the relationship analysis.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Why issues were grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    /// One issue plausibly caused the others.
    CausalChain,
    /// Same location, same trade.
    LocationTrade,
    /// Same category, same kind of work.
    CategoryWork,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CausalChain => "causal_chain",
            Self::LocationTrade => "location_trade",
            Self::CategoryWork => "category_work",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of related issues and the discount applied to their combined
/// subtotal. Members are issue ids; the group owns no issue data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueGroup {
    pub group_id: String,
    pub group_type: GroupType,
    pub members: BTreeSet<String>,
    /// Fraction in [0, 1].
    pub discount_pct: f64,
    pub reason: String,
}

impl IssueGroup {
    pub fn new(
        group_type: GroupType,
        members: BTreeSet<String>,
        discount_pct: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id(group_type, &members),
            group_type,
            members,
            discount_pct,
            reason: reason.into(),
        }
    }

    pub fn contains(&self, issue_id: &str) -> bool {
        self.members.contains(issue_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Stable id: first 12 hex chars of SHA-256 over the type and sorted members.
pub fn group_id(group_type: GroupType, members: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(group_type.as_str().as_bytes());
    for member in members {
        hasher.update([0u8]);
        hasher.update(member.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("grp-{}", &digest[..12])
}
