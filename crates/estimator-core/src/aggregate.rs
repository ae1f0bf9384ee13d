//! Batch cost totals with bundling savings.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{CostEstimate, EstimationMethod, IssueGroup};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub issue_count: usize,
    pub subtotal_low: f64,
    pub subtotal_high: f64,
    pub bundle_savings_low: f64,
    pub bundle_savings_high: f64,
    pub total_low: f64,
    pub total_high: f64,
    pub average_confidence: f64,
    pub method_counts: BTreeMap<EstimationMethod, usize>,
    /// Estimates flagged for human review.
    pub needs_review: usize,
}

/// Sum estimates and subtract each group's discount on its members'
/// combined values. Estimates themselves are left untouched.
pub fn summarize(estimates: &[CostEstimate], groups: &[IssueGroup]) -> CostSummary {
    let by_id: HashMap<&str, &CostEstimate> = estimates
        .iter()
        .map(|e| (e.issue_id.as_str(), e))
        .collect();

    let subtotal_low: f64 = estimates.iter().map(|e| e.estimated_low).sum();
    let subtotal_high: f64 = estimates.iter().map(|e| e.estimated_high).sum();

    let mut savings_low = 0.0;
    let mut savings_high = 0.0;
    for group in groups {
        let (low, high) = group
            .members
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .fold((0.0, 0.0), |(l, h), e| (l + e.estimated_low, h + e.estimated_high));
        savings_low += low * group.discount_pct;
        savings_high += high * group.discount_pct;
    }

    let mut method_counts = BTreeMap::new();
    for estimate in estimates {
        *method_counts.entry(estimate.method).or_insert(0) += 1;
    }

    let average_confidence = if estimates.is_empty() {
        0.0
    } else {
        estimates.iter().map(|e| e.confidence).sum::<f64>() / estimates.len() as f64
    };

    CostSummary {
        issue_count: estimates.len(),
        subtotal_low: cents(subtotal_low),
        subtotal_high: cents(subtotal_high),
        bundle_savings_low: cents(savings_low),
        bundle_savings_high: cents(savings_high),
        total_low: cents(subtotal_low - savings_low),
        total_high: cents(subtotal_high - savings_high),
        average_confidence: (average_confidence * 1000.0).round() / 1000.0,
        method_counts,
        needs_review: estimates.iter().filter(|e| e.needs_review).count(),
    }
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
