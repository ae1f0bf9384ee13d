//! Strategy selection.
//!
//! Picks how an issue will be estimated from its taxonomy confidence,
//! complexity and description, and from whether the reference table or the
//! formula book can price it. Selection is pure: no I/O, no provider calls.

use std::fmt;
use std::sync::Arc;

use cost_reference::ReferenceCostTable;
use serde::{Deserialize, Serialize};

use crate::config::StrategyThresholds;
use crate::domain::{Complexity, Issue};
use crate::formula::FormulaBook;

/// Phrases that signal the extent of the problem is not yet known.
const AMBIGUITY_MARKERS: [&str; 7] = [
    "possible",
    "potential",
    "may need",
    "could require",
    "extent unknown",
    "further inspection",
    "evaluation required",
];

/// Work that a flat table row cannot price on its own.
const COMPLEX_KEYWORDS: [&str; 17] = [
    "foundation",
    "structural",
    "pier",
    "underpinning",
    "mold",
    "asbestos",
    "lead paint",
    "roof replacement",
    "reroof",
    "hvac replacement",
    "new system",
    "electrical panel",
    "panel upgrade",
    "repipe",
    "repiping",
    "water damage",
    "flood damage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Lookup,
    Formula,
    Hybrid,
    Generative,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Formula => "formula",
            Self::Hybrid => "hybrid",
            Self::Generative => "generative",
        }
    }

    /// Whether this strategy asks the generative provider.
    pub fn uses_provider(&self) -> bool {
        matches!(self, Self::Hybrid | Self::Generative)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    pub reason: String,
}

impl StrategyDecision {
    fn new(strategy: Strategy, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct StrategySelector {
    thresholds: StrategyThresholds,
    table: Arc<dyn ReferenceCostTable>,
    formulas: FormulaBook,
}

impl StrategySelector {
    pub fn new(
        thresholds: StrategyThresholds,
        table: Arc<dyn ReferenceCostTable>,
        formulas: FormulaBook,
    ) -> Self {
        Self {
            thresholds,
            table,
            formulas,
        }
    }

    /// First matching rule wins.
    pub fn select(&self, issue: &Issue) -> StrategyDecision {
        let confidence = issue.taxonomy_confidence();
        let t = &self.thresholds;

        if confidence < t.low_confidence {
            return StrategyDecision::new(
                Strategy::Generative,
                format!(
                    "taxonomy confidence {confidence:.2} below {:.2}; category untrusted",
                    t.low_confidence
                ),
            );
        }

        let has_entry = self
            .table
            .lookup(issue.category(), &issue.lookup_attributes())
            .is_some();
        let needs_context = self.needs_context(issue);

        if confidence >= t.high_confidence
            && has_entry
            && issue.complexity == Complexity::Low
            && needs_context.is_none()
        {
            return StrategyDecision::new(
                Strategy::Lookup,
                format!("high taxonomy confidence {confidence:.2} with a table entry for a simple repair"),
            );
        }

        if confidence >= t.moderate_confidence {
            if let Some(formula) = self.formulas.formula_for(issue) {
                if self.formulas.estimate(issue).is_some() {
                    return StrategyDecision::new(
                        Strategy::Formula,
                        format!("{} formula applies to the stated measurement", formula.name),
                    );
                }
            }
        }

        if !has_entry {
            return StrategyDecision::new(
                Strategy::Generative,
                format!("no reference entry for category '{}'", issue.category()),
            );
        }

        let reason = match needs_context {
            Some(why) => format!("table entry exists but {why}"),
            None if issue.complexity != Complexity::Low => {
                format!("table entry exists but complexity is {}", issue.complexity)
            }
            None => format!("table entry exists but taxonomy confidence is {confidence:.2}"),
        };
        StrategyDecision::new(Strategy::Hybrid, reason)
    }

    /// Why the description needs contextual reasoning, if it does.
    fn needs_context(&self, issue: &Issue) -> Option<String> {
        let chars = issue.description.chars().count();
        if chars > self.thresholds.long_description_chars {
            return Some(format!("description is long ({chars} chars)"));
        }
        let text = issue.searchable_text();
        if let Some(marker) = AMBIGUITY_MARKERS.iter().find(|m| text.contains(*m)) {
            return Some(format!("description is ambiguous ('{marker}')"));
        }
        if let Some(keyword) = COMPLEX_KEYWORDS.iter().find(|k| text.contains(*k)) {
            return Some(format!("description mentions complex work ('{keyword}')"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cost_reference::CostCatalog;

    fn selector() -> StrategySelector {
        StrategySelector::new(
            StrategyThresholds::default(),
            Arc::new(CostCatalog::builtin()),
            FormulaBook::default(),
        )
    }

    #[test]
    fn test_high_confidence_simple_issue_uses_lookup() {
        let issue = Issue::new("a", "plumbing", 0.95, "Faucet drips at the kitchen sink")
            .with_complexity(Complexity::Low);
        assert_eq!(selector().select(&issue).strategy, Strategy::Lookup);
    }

    #[test]
    fn test_zero_confidence_never_uses_lookup() {
        let issue = Issue::new("a", "plumbing", 0.0, "Faucet drips")
            .with_complexity(Complexity::Low);
        let decision = selector().select(&issue);
        assert_eq!(decision.strategy, Strategy::Generative);
        assert!(decision.reason.contains("untrusted"));
    }

    #[test]
    fn test_ambiguous_description_blocks_lookup() {
        let issue = Issue::new("a", "plumbing", 0.95, "Possible leak, further inspection advised")
            .with_complexity(Complexity::Low);
        let decision = selector().select(&issue);
        assert_eq!(decision.strategy, Strategy::Hybrid);
        assert!(decision.reason.contains("ambiguous"));
    }

    #[test]
    fn test_long_description_blocks_lookup() {
        let issue = Issue::new("a", "plumbing", 0.95, "drip ".repeat(100))
            .with_complexity(Complexity::Low);
        assert_eq!(selector().select(&issue).strategy, Strategy::Hybrid);
    }

    #[test]
    fn test_complex_work_blocks_lookup() {
        let issue = Issue::new("a", "electrical", 0.95, "Recommend electrical panel upgrade")
            .with_complexity(Complexity::Low);
        assert_eq!(selector().select(&issue).strategy, Strategy::Hybrid);
    }

    #[test]
    fn test_measured_formula_work_uses_formula() {
        let issue = Issue::new("a", "interior", 0.6, "Water stained drywall, 40 sq ft");
        let decision = selector().select(&issue);
        assert_eq!(decision.strategy, Strategy::Formula);
        assert!(decision.reason.contains("drywall_repair"));
    }

    #[test]
    fn test_unknown_category_is_generative() {
        let issue = Issue::new("a", "pool equipment", 0.9, "Pump motor hums");
        let decision = selector().select(&issue);
        assert_eq!(decision.strategy, Strategy::Generative);
        assert!(decision.reason.contains("no reference entry"));
    }

    #[test]
    fn test_moderate_confidence_with_entry_is_hybrid() {
        let issue = Issue::new("a", "roof", 0.6, "Worn shingles on the south slope");
        assert_eq!(selector().select(&issue).strategy, Strategy::Hybrid);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let s = selector();
        let issue = Issue::new("a", "hvac", 0.85, "Furnace filter dirty");
        assert_eq!(s.select(&issue), s.select(&issue));
        assert!(Strategy::Hybrid.uses_provider());
        assert!(!Strategy::Formula.uses_provider());
    }
}
