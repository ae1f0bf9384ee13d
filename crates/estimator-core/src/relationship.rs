//! Relationship analysis for bundling.
//!
//! Runs once per batch, after every estimate is final, over an immutable
//! snapshot. Groups are formed in three passes with strict precedence:
//!
//! 1. `causal_chain`: one issue plausibly caused others at the same location
//!    or in the same report section.
//! 2. `location_trade`: same location, same trade.
//! 3. `category_work`: same category, same kind of work.
//!
//! An issue joins at most one group; later passes only see issues that
//! earlier passes left ungrouped. Issues are visited in id order and every
//! collection is ordered, so the same snapshot always yields the same groups.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cost_reference::normalize_category;
use tracing::debug;

use crate::config::BundlingDiscounts;
use crate::domain::{CostEstimate, GroupType, Issue, IssueGroup};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trade {
    Hvac,
    Plumbing,
    Electrical,
    Roofing,
    Foundation,
    Handyman,
    General,
}

impl Trade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hvac => "hvac",
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Roofing => "roofing",
            Self::Foundation => "foundation",
            Self::Handyman => "handyman",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TRADE_KEYWORDS: [(Trade, &[&str]); 6] = [
    (
        Trade::Hvac,
        &["hvac", "air conditioner", "furnace", "heating", "cooling", "duct"],
    ),
    (
        Trade::Plumbing,
        &["plumbing", "pipe", "drain", "water heater", "leak", "faucet"],
    ),
    (
        Trade::Electrical,
        &["electrical", "wiring", "outlet", "panel", "breaker", "switch"],
    ),
    (
        Trade::Roofing,
        &["roof", "shingles", "flashing", "gutter", "downspout"],
    ),
    (Trade::Foundation, &["foundation", "pier", "settlement", "slab"]),
    (Trade::Handyman, &["door", "window", "drywall", "paint", "minor"]),
];

/// Contractor trade for lowercase issue text; first match wins.
pub fn infer_trade(text: &str) -> Trade {
    TRADE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(trade, _)| *trade)
        .unwrap_or(Trade::General)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkType {
    Evaluate,
    Replace,
    Service,
    Repair,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Replace => "replace",
            Self::Service => "service",
            Self::Repair => "repair",
        }
    }
}

const WORK_KEYWORDS: [(WorkType, &[&str]); 3] = [
    (
        WorkType::Evaluate,
        &["evaluate", "evaluation", "inspect", "assess", "investigate", "monitor"],
    ),
    (
        WorkType::Replace,
        &["replace", "replacement", "install new", "end of life", "beyond service life"],
    ),
    (
        WorkType::Service,
        &["service", "clean", "maintain", "maintenance", "tune", "adjust"],
    ),
];

/// Kind of work for lowercase issue text; anything unmatched is a repair.
pub fn infer_work_type(text: &str) -> WorkType {
    WORK_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(work, _)| *work)
        .unwrap_or(WorkType::Repair)
}

// ---------------------------------------------------------------------------
// Causal patterns
// ---------------------------------------------------------------------------

/// A cause matches when every term group has at least one hit.
struct CausalPattern {
    name: &'static str,
    cause: &'static [&'static [&'static str]],
    effects: &'static [&'static str],
}

const CAUSAL_PATTERNS: [CausalPattern; 7] = [
    CausalPattern {
        name: "plumbing_leak",
        cause: &[
            &["leak", "leaking", "drip"],
            &["pipe", "plumbing", "supply", "drain", "faucet", "water heater"],
        ],
        effects: &["water_damage", "mold", "ceiling_stain", "flooring_damage"],
    },
    CausalPattern {
        name: "roof_leak",
        cause: &[&["leak", "leaking"], &["roof", "shingle", "flashing"]],
        effects: &[
            "ceiling_stain",
            "attic_moisture",
            "insulation_damage",
            "mold",
            "drywall_damage",
        ],
    },
    CausalPattern {
        name: "foundation_crack",
        cause: &[&["crack"], &["foundation", "slab"]],
        effects: &["door_misalignment", "wall_crack", "floor_slope", "drainage"],
    },
    CausalPattern {
        name: "hvac_failure",
        cause: &[
            &["hvac", "furnace", "air conditioner", "heat pump"],
            &["fail", "not working", "inoperable", "malfunction", "not cooling", "not heating"],
        ],
        effects: &["duct_leak", "humidity", "airflow"],
    },
    CausalPattern {
        name: "electrical_panel",
        cause: &[&["panel"], &["electrical", "breaker", "service", "overheat", "scorch"]],
        effects: &["breaker", "outlet", "flicker"],
    },
    CausalPattern {
        name: "drainage",
        cause: &[&["drainage", "grading", "negative slope"]],
        effects: &["foundation", "moisture", "erosion"],
    },
    CausalPattern {
        name: "termite",
        cause: &[&["termite", "wood destroying insect"]],
        effects: &["wood_deterioration", "structural"],
    },
];

const EFFECT_TERMS: [(&str, &[&str]); 22] = [
    ("water_damage", &["water damage", "water-damaged", "water stain"]),
    ("mold", &["mold", "mildew", "microbial"]),
    ("ceiling_stain", &["ceiling stain", "stained ceiling", "stain on ceiling", "stain on the ceiling"]),
    ("flooring_damage", &["floor damage", "damaged floor", "warped floor", "flooring", "subfloor"]),
    ("attic_moisture", &["attic moisture", "moisture in attic", "moisture in the attic", "sheathing stain"]),
    ("insulation_damage", &["insulation"]),
    ("drywall_damage", &["drywall"]),
    ("door_misalignment", &["door misalign", "misaligned door", "door sticks", "doors stick", "sticking door"]),
    ("wall_crack", &["wall crack", "crack in wall", "crack in the wall", "cracked wall", "drywall crack"]),
    ("floor_slope", &["floor slope", "sloping floor", "sloped floor", "uneven floor"]),
    ("drainage", &["drainage", "grading", "downspout", "pooling"]),
    ("duct_leak", &["duct"]),
    ("humidity", &["humidity", "condensation"]),
    ("airflow", &["airflow", "air flow", "weak air"]),
    ("breaker", &["breaker"]),
    ("outlet", &["outlet", "receptacle"]),
    ("flicker", &["flicker"]),
    ("foundation", &["foundation"]),
    ("moisture", &["moisture", "damp", "water intrusion"]),
    ("erosion", &["erosion", "eroded", "washout"]),
    ("wood_deterioration", &["wood rot", "rotted", "damaged wood", "wood damage", "deteriorat"]),
    ("structural", &["structural", "joist", "beam", "sill plate"]),
];

fn effect_terms(effect: &str) -> &'static [&'static str] {
    EFFECT_TERMS
        .iter()
        .find(|(name, _)| *name == effect)
        .map(|(_, terms)| *terms)
        .unwrap_or(&[])
}

impl CausalPattern {
    fn is_cause(&self, text: &str) -> bool {
        self.cause
            .iter()
            .all(|group| group.iter().any(|term| text.contains(term)))
    }

    fn is_effect(&self, text: &str) -> bool {
        self.effects
            .iter()
            .any(|effect| effect_terms(effect).iter().any(|term| text.contains(term)))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One issue as the analyzer sees it.
#[derive(Debug, Clone)]
struct Entry<'a> {
    issue: &'a Issue,
    text: String,
    location: Option<String>,
    section: Option<String>,
}

/// Read-only view of a finished batch: every issue that has a final
/// estimate, ordered by id.
#[derive(Debug, Clone)]
pub struct BatchSnapshot<'a> {
    entries: Vec<Entry<'a>>,
}

impl<'a> BatchSnapshot<'a> {
    pub fn new(issues: &'a [Issue], estimates: &[CostEstimate]) -> Self {
        let estimated: BTreeSet<&str> = estimates.iter().map(|e| e.issue_id.as_str()).collect();
        let mut entries: Vec<Entry<'a>> = issues
            .iter()
            .filter(|issue| estimated.contains(issue.id.as_str()))
            .map(|issue| Entry {
                issue,
                text: issue.searchable_text(),
                location: issue.location.key(),
                section: issue.section_key(),
            })
            .collect();
        entries.sort_by(|a, b| a.issue.id.cmp(&b.issue.id));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RelationshipAnalyzer {
    discounts: BundlingDiscounts,
}

impl RelationshipAnalyzer {
    pub fn new(discounts: BundlingDiscounts) -> Self {
        Self { discounts }
    }

    pub fn analyze(&self, snapshot: &BatchSnapshot<'_>) -> Vec<IssueGroup> {
        let entries = &snapshot.entries;
        let mut grouped = vec![false; entries.len()];
        let mut groups = Vec::new();

        groups.extend(self.causal_groups(entries, &mut grouped));

        // location_trade
        let mut by_location: BTreeMap<(String, Trade), Vec<usize>> = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if grouped[idx] {
                continue;
            }
            if let Some(location) = &entry.location {
                by_location
                    .entry((location.clone(), infer_trade(&entry.text)))
                    .or_default()
                    .push(idx);
            }
        }
        for ((location, trade), members) in by_location {
            if members.len() < 2 {
                continue;
            }
            mark(&mut grouped, &members);
            groups.push(self.group(
                GroupType::LocationTrade,
                entries,
                &members,
                format!("{trade} work in {location}"),
            ));
        }

        // category_work
        let mut by_category: BTreeMap<(String, WorkType), Vec<usize>> = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if grouped[idx] {
                continue;
            }
            let category = normalize_category(entry.issue.category());
            if category.is_empty() {
                continue;
            }
            by_category
                .entry((category, infer_work_type(&entry.text)))
                .or_default()
                .push(idx);
        }
        for ((category, work), members) in by_category {
            if members.len() < 2 {
                continue;
            }
            mark(&mut grouped, &members);
            groups.push(self.group(
                GroupType::CategoryWork,
                entries,
                &members,
                format!("{} work on {category}", work.as_str()),
            ));
        }

        debug!(
            issues = entries.len(),
            groups = groups.len(),
            grouped = grouped.iter().filter(|g| **g).count(),
            "relationship analysis complete"
        );
        groups
    }

    fn causal_groups(&self, entries: &[Entry<'_>], grouped: &mut [bool]) -> Vec<IssueGroup> {
        let mut sets = DisjointSets::new(entries.len());
        let mut causes: BTreeMap<usize, BTreeSet<&'static str>> = BTreeMap::new();

        for (a, cause) in entries.iter().enumerate() {
            for pattern in CAUSAL_PATTERNS.iter().filter(|p| p.is_cause(&cause.text)) {
                for (b, effect) in entries.iter().enumerate() {
                    if a == b || !adjacent(cause, effect) || !pattern.is_effect(&effect.text) {
                        continue;
                    }
                    sets.union(a, b);
                    causes.entry(a).or_default().insert(pattern.name);
                }
            }
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in 0..entries.len() {
            components.entry(sets.find(idx)).or_default().push(idx);
        }

        let mut ordered: Vec<Vec<usize>> = components
            .into_values()
            .filter(|members| members.len() >= 2)
            .collect();
        ordered.sort();

        ordered
            .into_iter()
            .map(|members| {
                mark(grouped, &members);
                let names: BTreeSet<&str> = members
                    .iter()
                    .filter_map(|idx| causes.get(idx))
                    .flatten()
                    .copied()
                    .collect();
                let reason = format!(
                    "causal chain: {}",
                    names.into_iter().collect::<Vec<_>>().join(", ")
                );
                self.group(GroupType::CausalChain, entries, &members, reason)
            })
            .collect()
    }

    fn group(
        &self,
        group_type: GroupType,
        entries: &[Entry<'_>],
        members: &[usize],
        reason: String,
    ) -> IssueGroup {
        let ids: BTreeSet<String> = members
            .iter()
            .map(|idx| entries[*idx].issue.id.clone())
            .collect();
        IssueGroup::new(group_type, ids, self.discounts.discount(group_type), reason)
    }
}

/// Shared location key or shared report section.
fn adjacent(a: &Entry<'_>, b: &Entry<'_>) -> bool {
    let same_location = matches!((&a.location, &b.location), (Some(x), Some(y)) if x == y);
    let same_section = matches!((&a.section, &b.section), (Some(x), Some(y)) if x == y);
    same_location || same_section
}

fn mark(grouped: &mut [bool], members: &[usize]) {
    for idx in members {
        grouped[*idx] = true;
    }
}

/// Union-find; the root of a set is always its smallest index.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut idx: usize) -> usize {
        while self.parent[idx] != idx {
            self.parent[idx] = self.parent[self.parent[idx]];
            idx = self.parent[idx];
        }
        idx
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EstimationMethod;

    fn estimate_for(issue: &Issue) -> CostEstimate {
        CostEstimate {
            issue_id: issue.id.clone(),
            item: issue.item(),
            estimated_low: 100.0,
            estimated_high: 300.0,
            confidence: 0.7,
            method: EstimationMethod::Lookup,
            reasoning: String::new(),
            assumptions: vec![],
            risk_factors: vec![],
            group_id: None,
            confidence_breakdown: None,
            corrections: vec![],
            warnings: vec![],
            needs_review: false,
        }
    }

    fn analyze(issues: &[Issue]) -> Vec<IssueGroup> {
        let estimates: Vec<CostEstimate> = issues.iter().map(estimate_for).collect();
        RelationshipAnalyzer::default().analyze(&BatchSnapshot::new(issues, &estimates))
    }

    #[test]
    fn test_infer_trade_and_work() {
        assert_eq!(infer_trade("furnace short cycles"), Trade::Hvac);
        assert_eq!(infer_trade("leak under sink"), Trade::Plumbing);
        assert_eq!(infer_trade("missing shingles"), Trade::Roofing);
        assert_eq!(infer_trade("loose railing"), Trade::General);
        assert_eq!(infer_work_type("recommend evaluation by a licensed contractor"), WorkType::Evaluate);
        assert_eq!(infer_work_type("replace the water heater"), WorkType::Replace);
        assert_eq!(infer_work_type("tighten loose handle"), WorkType::Repair);
    }

    #[test]
    fn test_leak_and_ceiling_stain_form_causal_chain() {
        let issues = vec![
            Issue::new("a", "plumbing", 0.9, "Leaking drain pipe under upstairs tub")
                .with_location("Hall Bath"),
            Issue::new("b", "interior", 0.9, "Water stain on the ceiling below")
                .with_location("hall bath"),
            Issue::new("c", "interior", 0.9, "Water stain on the ceiling in garage")
                .with_location("Garage"),
        ];
        let groups = analyze(&issues);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.group_type, GroupType::CausalChain);
        assert!(group.contains("a") && group.contains("b") && !group.contains("c"));
        assert_eq!(group.discount_pct, 0.25);
        assert!(group.reason.contains("plumbing_leak"));
    }

    #[test]
    fn test_same_section_counts_as_adjacent() {
        let issues = vec![
            Issue::new("r1", "roof", 0.9, "Roof leak at chimney flashing").with_section("Roof"),
            Issue::new("r2", "attic", 0.9, "Wet insulation near chimney").with_section("roof"),
        ];
        let groups = analyze(&issues);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_type, GroupType::CausalChain);
    }

    #[test]
    fn test_location_trade_then_category_work() {
        let issues = vec![
            Issue::new("k1", "plumbing", 0.9, "Faucet loose at base").with_location("Kitchen"),
            Issue::new("k2", "plumbing", 0.9, "Slow drain at sink").with_location("kitchen"),
            Issue::new("e1", "electrical", 0.9, "Replace cover plate at outlet").with_location("Garage"),
            Issue::new("e2", "electrical", 0.9, "Replace missing switch cover").with_location("Bedroom"),
            Issue::new("z", "exterior", 0.9, "Loose railing").with_location("Porch"),
        ];
        let groups = analyze(&issues);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_type, GroupType::LocationTrade);
        assert_eq!(groups[0].members, BTreeSet::from(["k1".to_string(), "k2".to_string()]));
        assert_eq!(groups[0].discount_pct, 0.20);
        assert_eq!(groups[1].group_type, GroupType::CategoryWork);
        assert_eq!(groups[1].members, BTreeSet::from(["e1".to_string(), "e2".to_string()]));
        assert_eq!(groups[1].discount_pct, 0.15);
    }

    #[test]
    fn test_membership_is_exclusive() {
        let issues = vec![
            Issue::new("a", "plumbing", 0.9, "Leaking supply pipe").with_location("Kitchen"),
            Issue::new("b", "interior", 0.9, "Mold on cabinet floor").with_location("Kitchen"),
            Issue::new("c", "plumbing", 0.9, "Faucet handle loose").with_location("Kitchen"),
            Issue::new("d", "plumbing", 0.9, "Drain stopper missing").with_location("Kitchen"),
        ];
        let groups = analyze(&issues);
        let mut seen = BTreeSet::new();
        for group in &groups {
            for member in &group.members {
                assert!(seen.insert(member.clone()), "{member} in two groups");
            }
        }
        assert_eq!(groups[0].group_type, GroupType::CausalChain);
    }

    #[test]
    fn test_unknown_location_never_groups_by_location() {
        let issues = vec![
            Issue::new("a", "hvac", 0.9, "Furnace filter dirty").with_location("unknown"),
            Issue::new("b", "roof", 0.9, "Furnace flue rusted").with_location("Unknown"),
        ];
        assert!(analyze(&issues).is_empty());
    }

    #[test]
    fn test_analysis_is_idempotent_and_order_independent() {
        let mut issues = vec![
            Issue::new("b", "interior", 0.9, "Water stain on the ceiling").with_location("Den"),
            Issue::new("a", "plumbing", 0.9, "Pipe leak above den").with_location("Den"),
            Issue::new("c", "hvac", 0.9, "Furnace needs service").with_location("Basement"),
            Issue::new("d", "hvac", 0.9, "Duct disconnected").with_location("Basement"),
        ];
        let first = analyze(&issues);
        let second = analyze(&issues);
        issues.reverse();
        let reversed = analyze(&issues);
        assert_eq!(first, second);
        assert_eq!(first, reversed);
    }

    #[test]
    fn test_issues_without_estimates_are_ignored() {
        let issues = vec![
            Issue::new("a", "plumbing", 0.9, "Faucet loose").with_location("Kitchen"),
            Issue::new("b", "plumbing", 0.9, "Drain slow").with_location("Kitchen"),
        ];
        let estimates = vec![estimate_for(&issues[0])];
        let snapshot = BatchSnapshot::new(&issues, &estimates);
        assert_eq!(snapshot.len(), 1);
        assert!(RelationshipAnalyzer::default().analyze(&snapshot).is_empty());
    }
}
