//! # Completeness & Coverage Verifier
//!
//! Audits a trace graph and produces a [`ComplianceReport`].
//!
//! Rules run in a fixed order and never short-circuit:
//!
//! 1. goal coverage (`NoFSRForGoal`)
//! 2. allocation completeness (`UnallocatedFSR`)
//! 3. ASIL integrity (`ASILMismatch`)
//! 4. high-ASIL mechanism coverage (`InsufficientCoverage`)
//! 5. validation coverage (`MissingValidationCriterion`)
//! 6. orphan detection (`OrphanNode`)
//! 7. derivation acyclicity (`DerivationCycle`)
//!
//! Within a rule, entities are visited in insertion order, so the report is a
//! pure function of the graph. Verification never mutates.

use crate::asil::{
    Asil, Coverage, CoverageThresholds, aggregate_coverage, inherit, valid_decompositions,
};
use crate::entity::{Fsr, is_placeholder};
use crate::graph::{GraphStore, TraceGraph};
use crate::report::{
    Advisory, AdvisoryKind, ComplianceReport, ReportStatistics, Violation, ViolationKind,
};
use crate::types::{EntityKind, Relation, StrategyKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Verifier thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub asil_d_threshold: Coverage,
    pub asil_c_threshold: Coverage,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let thresholds = CoverageThresholds::default();
        Self {
            asil_d_threshold: thresholds.asil_d,
            asil_c_threshold: thresholds.asil_c,
        }
    }
}

impl VerifierConfig {
    pub fn thresholds(&self) -> CoverageThresholds {
        CoverageThresholds {
            asil_d: self.asil_d_threshold,
            asil_c: self.asil_c_threshold,
        }
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Verify with default thresholds.
pub fn verify(graph: &TraceGraph) -> ComplianceReport {
    verify_with(graph, &VerifierConfig::default())
}

/// Verify with explicit thresholds.
pub fn verify_with(graph: &TraceGraph, config: &VerifierConfig) -> ComplianceReport {
    let mut violations = goal_coverage(graph);
    violations.extend(allocation_completeness(graph));
    violations.extend(asil_integrity(graph));
    violations.extend(mechanism_coverage(graph, &config.thresholds()));
    violations.extend(validation_coverage(graph));
    violations.extend(orphans(graph));
    violations.extend(derivation_cycles(graph));

    ComplianceReport::new(
        violations,
        coverage_by_asil(graph),
        advisories(graph),
        statistics(graph),
    )
}

// =============================================================================
// RULES
// =============================================================================

/// Rule 1: every goal derives at least one FSR, directly or through a
/// decomposition chain.
pub fn goal_coverage(graph: &TraceGraph) -> Vec<Violation> {
    graph
        .goals()
        .filter(|goal| {
            !graph
                .reachable([&goal.id], Relation::is_derivation)
                .iter()
                .any(|id| graph.fsr(id).is_ok())
        })
        .map(|goal| {
            Violation::new(
                ViolationKind::NoFsrForGoal,
                goal.id.clone(),
                format!("{} ({}) has no derived FSR", goal.id, goal.asil),
            )
        })
        .collect()
}

/// Whether `fsr` is realized by an applied decomposition whose children
/// all still exist.
pub fn realized_by_decomposition(graph: &TraceGraph, fsr: &Fsr) -> bool {
    !fsr.is_active()
        && graph.decompositions().any(|dec| {
            dec.parent == fsr.id
                && dec.is_applied()
                && !dec.children.is_empty()
                && dec.children.iter().all(|part| graph.fsr(&part.fsr).is_ok())
        })
}

/// FSRs that must be allocated and covered themselves.
fn directly_realized(graph: &TraceGraph) -> impl Iterator<Item = &Fsr> {
    graph
        .fsrs()
        .filter(move |fsr| !realized_by_decomposition(graph, fsr))
}

/// Rule 2: every FSR is allocated, unless an intact decomposition realizes
/// it through its children.
pub fn allocation_completeness(graph: &TraceGraph) -> Vec<Violation> {
    directly_realized(graph)
        .filter(|fsr| graph.children(&fsr.id, Relation::AllocatedTo).is_empty())
        .map(|fsr| {
            Violation::new(
                ViolationKind::UnallocatedFsr,
                fsr.id.clone(),
                format!("{} is not allocated to any architectural element", fsr.id),
            )
        })
        .collect()
}

/// Rule 3: every FSR carries its goal's ASIL, or the ASIL assigned by an
/// applied decomposition with a valid pattern.
pub fn asil_integrity(graph: &TraceGraph) -> Vec<Violation> {
    graph
        .fsrs()
        .filter_map(|fsr| {
            asil_problem(graph, fsr)
                .map(|message| Violation::new(ViolationKind::AsilMismatch, fsr.id.clone(), message))
        })
        .collect()
}

fn asil_problem(graph: &TraceGraph, fsr: &Fsr) -> Option<String> {
    let Some(dec_id) = &fsr.decomposition else {
        let Ok(goal) = graph.goal(&fsr.goal) else {
            return Some(format!(
                "{} cannot be checked: goal {} is missing",
                fsr.id, fsr.goal
            ));
        };
        let expected = inherit(goal.asil);
        return (fsr.asil != expected).then(|| {
            format!(
                "{} is {} but goal {} requires {}",
                fsr.id, fsr.asil, goal.id, expected
            )
        });
    };

    let Ok(dec) = graph.decomposition(dec_id) else {
        return Some(format!("{} cites missing decomposition {}", fsr.id, dec_id));
    };
    if !dec.is_applied() {
        return Some(format!("decomposition {} is not applied", dec.id));
    }
    if !valid_decompositions(dec.target).contains(&dec.pattern) {
        return Some(format!(
            "decomposition {} uses {} which is not defined for {}",
            dec.id, dec.pattern, dec.target
        ));
    }
    if let Some(parent_asil) = parent_asil(graph, &dec.parent) {
        if parent_asil != dec.target {
            return Some(format!(
                "decomposition {} targets {} but its parent {} is {}",
                dec.id, dec.target, dec.parent, parent_asil
            ));
        }
    }
    match dec.child_asil(&fsr.id) {
        Some(asil) if asil == fsr.asil => None,
        Some(asil) => Some(format!(
            "{} is {} but decomposition {} assigns {}",
            fsr.id, fsr.asil, dec.id, asil
        )),
        None => Some(format!("{} is not a listed child of {}", fsr.id, dec.id)),
    }
}

fn parent_asil(graph: &TraceGraph, parent: &crate::types::EntityId) -> Option<Asil> {
    graph
        .fsr(parent)
        .map(|f| f.asil)
        .or_else(|_| graph.goal(parent).map(|g| g.asil))
        .ok()
}

/// Rule 4: every directly realized FSR at a thresholded ASIL has mechanisms
/// whose aggregated coverage meets the threshold.
pub fn mechanism_coverage(graph: &TraceGraph, thresholds: &CoverageThresholds) -> Vec<Violation> {
    let mut violations = Vec::new();
    for fsr in directly_realized(graph) {
        let Some(required) = thresholds.for_asil(fsr.asil) else {
            continue;
        };
        if graph.mechanisms_for(&fsr.id).next().is_none() {
            violations.push(Violation::new(
                ViolationKind::InsufficientCoverage,
                fsr.id.clone(),
                format!("{} ({}) has no safety mechanism", fsr.id, fsr.asil),
            ));
            continue;
        }
        let achieved = fsr_coverage(graph, fsr);
        if achieved < required {
            violations.push(Violation::new(
                ViolationKind::InsufficientCoverage,
                fsr.id.clone(),
                format!(
                    "{} ({}) reaches {} diagnostic coverage, {} required",
                    fsr.id, fsr.asil, achieved, required
                ),
            ));
        }
    }
    violations
}

/// Aggregated coverage of the mechanisms covering `fsr`.
///
/// Redundancy is credited only when more than one mechanism covers the FSR
/// and every one of them claims independence.
pub fn fsr_coverage(graph: &TraceGraph, fsr: &Fsr) -> Coverage {
    let mechanisms: Vec<_> = graph.mechanisms_for(&fsr.id).collect();
    let independent = mechanisms.len() > 1 && mechanisms.iter().all(|m| m.independent);
    let coverages: Vec<_> = mechanisms.iter().map(|m| m.coverage).collect();
    aggregate_coverage(&coverages, independent)
}

/// Rule 5: every goal and every FSR has a validation criterion.
pub fn validation_coverage(graph: &TraceGraph) -> Vec<Violation> {
    let goals = graph
        .goals()
        .map(|g| (&g.id, EntityKind::SafetyGoal));
    let fsrs = graph.fsrs().map(|f| (&f.id, EntityKind::Fsr));
    goals
        .chain(fsrs)
        .filter(|(id, _)| graph.children(id, Relation::ValidatedBy).is_empty())
        .map(|(id, kind)| {
            Violation::new(
                ViolationKind::MissingValidationCriterion,
                id.clone(),
                format!("{} {} has no validation criterion", kind, id),
            )
        })
        .collect()
}

/// Rule 6: every non-goal node is reachable from some goal.
///
/// Visited kind by kind so the order survives a per-kind snapshot.
pub fn orphans(graph: &TraceGraph) -> Vec<Violation> {
    let reachable = graph.reachable(graph.goals().map(|g| &g.id), |_| true);
    EntityKind::ALL
        .into_iter()
        .filter(|kind| *kind != EntityKind::SafetyGoal)
        .flat_map(|kind| graph.entities().filter(move |e| e.kind() == kind))
        .filter(|e| !reachable.contains(e.id()))
        .map(|e| {
            Violation::new(
                ViolationKind::OrphanNode,
                e.id().clone(),
                format!("{} {} is not traced to any safety goal", e.kind(), e.id()),
            )
        })
        .collect()
}

/// Rule 7: the derivation subgraph is acyclic.
pub fn derivation_cycles(graph: &TraceGraph) -> Vec<Violation> {
    graph
        .find_derivation_cycle()
        .map(|link| {
            Violation::new(
                ViolationKind::DerivationCycle,
                link.source.clone(),
                format!(
                    "derivation cycle closed by {} -[{}]-> {}",
                    link.source, link.relation, link.target
                ),
            )
        })
        .into_iter()
        .collect()
}

// =============================================================================
// COVERAGE MAP
// =============================================================================

/// Worst-case aggregated coverage per ASIL over directly realized FSRs.
pub fn coverage_by_asil(graph: &TraceGraph) -> BTreeMap<Asil, Coverage> {
    let mut map: BTreeMap<Asil, Coverage> = BTreeMap::new();
    for fsr in directly_realized(graph) {
        let coverage = fsr_coverage(graph, fsr);
        map.entry(fsr.asil)
            .and_modify(|worst| *worst = (*worst).min(coverage))
            .or_insert(coverage);
    }
    map
}

// =============================================================================
// ADVISORIES
// =============================================================================

/// Soft findings that never affect `passed`.
pub fn advisories(graph: &TraceGraph) -> Vec<Advisory> {
    let mut out = Vec::new();

    for goal in graph.goals().filter(|g| g.is_safety_relevant()) {
        if is_placeholder(&goal.safe_state) {
            out.push(Advisory::new(
                AdvisoryKind::PlaceholderSafeState,
                Some(goal.id.clone()),
                format!("{} safe state is still a placeholder", goal.id),
            ));
        }
        if goal.ftti.as_deref().is_none_or(is_placeholder) {
            out.push(Advisory::new(
                AdvisoryKind::PlaceholderFtti,
                Some(goal.id.clone()),
                format!("{} FTTI is not specified", goal.id),
            ));
        }

        let fsr_count = graph.fsrs().filter(|f| f.goal == goal.id).count();
        let recommended = goal.asil.recommended_min_fsrs();
        if fsr_count < recommended {
            out.push(Advisory::new(
                AdvisoryKind::FewerFsrsThanRecommended,
                Some(goal.id.clone()),
                format!(
                    "{} ({}) has {} FSRs, at least {} recommended",
                    goal.id, goal.asil, fsr_count, recommended
                ),
            ));
        }

        let mut kinds: BTreeMap<StrategyKind, usize> = BTreeMap::new();
        for strategy in graph.strategies().filter(|s| s.goal == goal.id) {
            *kinds.entry(strategy.kind).or_insert(0) += 1;
        }
        for (kind, count) in kinds.iter().filter(|(_, n)| **n > 1) {
            out.push(Advisory::new(
                AdvisoryKind::DuplicateStrategyKind,
                Some(goal.id.clone()),
                format!("{} has {} {} strategies", goal.id, count, kind),
            ));
        }
        let missing: Vec<_> = StrategyKind::ALL
            .iter()
            .filter(|k| !kinds.contains_key(*k))
            .map(|k| k.label())
            .collect();
        if !missing.is_empty() {
            out.push(Advisory::new(
                AdvisoryKind::IncompleteStrategySet,
                Some(goal.id.clone()),
                format!("{} lacks strategies: {}", goal.id, missing.join(", ")),
            ));
        }
    }

    for allocation in graph.allocations() {
        let Ok(fsr) = graph.fsr(&allocation.fsr) else {
            continue;
        };
        for element in allocation
            .elements
            .iter()
            .filter_map(|id| graph.element(id).ok())
            .filter(|e| e.max_asil < fsr.asil)
        {
            out.push(Advisory::new(
                AdvisoryKind::ElementCapabilityBelowAsil,
                Some(allocation.id.clone()),
                format!(
                    "{} ({}) allocated to {} rated only {}",
                    fsr.id, fsr.asil, element.id, element.max_asil
                ),
            ));
        }
    }

    if graph.goals().next().is_some() && !graph.goals().any(|g| g.is_safety_relevant()) {
        out.push(Advisory::new(
            AdvisoryKind::NoSafetyRelevantGoal,
            None,
            "no safety goal is rated above QM",
        ));
    }

    out
}

// =============================================================================
// STATISTICS
// =============================================================================

pub fn statistics(graph: &TraceGraph) -> ReportStatistics {
    let mut stats = ReportStatistics {
        goals: graph.count_of(EntityKind::SafetyGoal),
        strategies: graph.count_of(EntityKind::Strategy),
        fsrs: graph.count_of(EntityKind::Fsr),
        elements: graph.count_of(EntityKind::Element),
        mechanisms: graph.count_of(EntityKind::Mechanism),
        decompositions: graph.count_of(EntityKind::Decomposition),
        criteria: graph.count_of(EntityKind::Criterion),
        ..ReportStatistics::default()
    };

    for goal in graph.goals() {
        *stats.goals_by_asil.entry(goal.asil).or_insert(0) += 1;
        if goal.is_safety_relevant() {
            stats.safety_relevant_goals += 1;
        }
    }

    let allocated: BTreeSet<_> = graph.allocations().map(|a| &a.fsr).collect();
    for fsr in graph.fsrs() {
        *stats.fsrs_by_category.entry(fsr.category).or_insert(0) += 1;
        if fsr.is_active() {
            stats.active_fsrs += 1;
        }
        if allocated.contains(&fsr.id) {
            stats.allocated_fsrs += 1;
        }
        if graph.mechanisms_for(&fsr.id).next().is_some() {
            stats.covered_fsrs += 1;
        }
    }

    stats
}

// =============================================================================
// TESTS
// =============================================================================
