//! # Compliance Report
//!
//! Structured output of the verifier.
//!
//! Violations are compliance findings, never errors: the caller decides how
//! to present or remediate them. `passed` is true iff there are no
//! violations. Advisories carry softer guidance and never affect `passed`.

use crate::asil::{Asil, Coverage};
use crate::types::{EntityId, FsrCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// VIOLATIONS
// =============================================================================

/// Rule that produced a violation, in rule execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    #[serde(rename = "NoFSRForGoal")]
    NoFsrForGoal,
    #[serde(rename = "UnallocatedFSR")]
    UnallocatedFsr,
    #[serde(rename = "ASILMismatch")]
    AsilMismatch,
    InsufficientCoverage,
    MissingValidationCriterion,
    OrphanNode,
    DerivationCycle,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::NoFsrForGoal => "NoFSRForGoal",
            ViolationKind::UnallocatedFsr => "UnallocatedFSR",
            ViolationKind::AsilMismatch => "ASILMismatch",
            ViolationKind::InsufficientCoverage => "InsufficientCoverage",
            ViolationKind::MissingValidationCriterion => "MissingValidationCriterion",
            ViolationKind::OrphanNode => "OrphanNode",
            ViolationKind::DerivationCycle => "DerivationCycle",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compliance finding against one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub entity: EntityId,
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn new(kind: ViolationKind, entity: EntityId, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            message: message.into(),
        }
    }
}

// =============================================================================
// ADVISORIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AdvisoryKind {
    PlaceholderSafeState,
    PlaceholderFtti,
    FewerFsrsThanRecommended,
    DuplicateStrategyKind,
    IncompleteStrategySet,
    ElementCapabilityBelowAsil,
    NoSafetyRelevantGoal,
}

/// Non-blocking guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub entity: Option<EntityId>,
    pub message: String,
}

impl Advisory {
    #[must_use]
    pub fn new(kind: AdvisoryKind, entity: Option<EntityId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            message: message.into(),
        }
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub goals: usize,
    pub safety_relevant_goals: usize,
    pub strategies: usize,
    pub fsrs: usize,
    pub active_fsrs: usize,
    pub allocated_fsrs: usize,
    pub covered_fsrs: usize,
    pub elements: usize,
    pub mechanisms: usize,
    pub decompositions: usize,
    pub criteria: usize,
    pub goals_by_asil: BTreeMap<Asil, usize>,
    pub fsrs_by_category: BTreeMap<FsrCategory, usize>,
}

// =============================================================================
// REPORT
// =============================================================================

/// Result of one `verify` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub passed: bool,
    pub violations: Vec<Violation>,
    /// Worst-case aggregated mechanism coverage among active FSRs of each
    /// ASIL that has at least one active FSR.
    pub coverage: BTreeMap<Asil, Coverage>,
    pub advisories: Vec<Advisory>,
    pub statistics: ReportStatistics,
}

impl ComplianceReport {
    /// Build a report; `passed` is derived from `violations`.
    #[must_use]
    pub fn new(
        violations: Vec<Violation>,
        coverage: BTreeMap<Asil, Coverage>,
        advisories: Vec<Advisory>,
        statistics: ReportStatistics,
    ) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
            coverage,
            advisories,
            statistics,
        }
    }

    /// Violations of one kind.
    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Entities named by violations of one kind, in report order.
    pub fn entities_with(&self, kind: ViolationKind) -> Vec<EntityId> {
        self.violations_of(kind).map(|v| v.entity.clone()).collect()
    }

    /// Violation counts per kind.
    pub fn counts(&self) -> BTreeMap<ViolationKind, usize> {
        let mut counts = BTreeMap::new();
        for v in &self.violations {
            *counts.entry(v.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Format as plain text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("┌─────────────────────────────────────┐\n");
        if self.passed {
            output.push_str("│ COMPLIANCE: PASSED                  │\n");
        } else {
            output.push_str("│ COMPLIANCE: FAILED                  │\n");
        }

        output.push_str("├─────────────────────────────────────┤\n");
        output.push_str("│ VIOLATIONS                          │\n");
        if self.violations.is_empty() {
            output.push_str("│ - (none)                            │\n");
        } else {
            for v in &self.violations {
                output.push_str(&format!("│ - [{}] {}: {}\n", v.kind, v.entity, v.message));
            }
        }

        output.push_str("├─────────────────────────────────────┤\n");
        output.push_str("│ COVERAGE (worst case per ASIL)      │\n");
        if self.coverage.is_empty() {
            output.push_str("│ - (none)                            │\n");
        } else {
            for (asil, coverage) in &self.coverage {
                output.push_str(&format!("│ - {}: {}\n", asil, coverage));
            }
        }

        output.push_str("├─────────────────────────────────────┤\n");
        output.push_str("│ ADVISORIES                          │\n");
        if self.advisories.is_empty() {
            output.push_str("│ - (none)                            │\n");
        } else {
            for a in &self.advisories {
                match &a.entity {
                    Some(id) => output.push_str(&format!("│ - {}: {}\n", id, a.message)),
                    None => output.push_str(&format!("│ - {}\n", a.message)),
                }
            }
        }

        let s = &self.statistics;
        output.push_str("├─────────────────────────────────────┤\n");
        output.push_str(&format!(
            "│ goals {} | FSRs {} ({} allocated) | criteria {}\n",
            s.goals, s.fsrs, s.allocated_fsrs, s.criteria
        ));
        output.push_str("└─────────────────────────────────────┘\n");

        output
    }
}

// =============================================================================
// TESTS
// =============================================================================
