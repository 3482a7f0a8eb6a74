//! # Entity Records
//!
//! Tagged records for every node kind in the trace graph.
//!
//! Records are created once and then only replaced through explicit
//! refinement, which bumps the per-entity `revision` counter. Each record
//! declares the ids it references and the trace links those references
//! imply; the graph store checks the former and materializes the latter.

use crate::asil::{Asil, Coverage, DecompositionPattern};
use crate::primitives::PLACEHOLDER_MARKERS;
use crate::types::{
    DecompositionStatus, ElementKind, EntityId, EntityKind, FsrCategory, FsrStatus,
    MechanismCategory, Relation, StrategyKind, TraceLink, ValidationLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Returns true if a caller-supplied field is a placeholder rather than
/// engineered content.
pub fn is_placeholder(text: &str) -> bool {
    let lower = text.trim().to_ascii_lowercase();
    lower.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}

// =============================================================================
// SAFETY GOAL
// =============================================================================

/// Optional hazard-analysis context carried alongside a goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardContext {
    pub hazard_id: Option<String>,
    pub hazardous_event: Option<String>,
    pub operational_situation: Option<String>,
    pub severity: Option<String>,
    pub exposure: Option<String>,
    pub controllability: Option<String>,
}

/// Root of every trace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyGoal {
    pub id: EntityId,
    pub revision: u32,
    pub description: String,
    pub asil: Asil,
    pub safe_state: String,
    pub ftti: Option<String>,
    pub hazard: HazardContext,
}

impl SafetyGoal {
    pub fn is_safety_relevant(&self) -> bool {
        self.asil.is_safety_relevant()
    }
}

// =============================================================================
// STRATEGY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: EntityId,
    pub revision: u32,
    pub goal: EntityId,
    pub kind: StrategyKind,
    /// Externally generated prose.
    pub content: String,
}

// =============================================================================
// FUNCTIONAL SAFETY REQUIREMENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fsr {
    pub id: EntityId,
    pub revision: u32,
    pub goal: EntityId,
    pub strategy: Option<EntityId>,
    pub category: FsrCategory,
    pub asil: Asil,
    pub safe_state: String,
    pub ftti: Option<String>,
    pub operating_modes: Vec<String>,
    pub emergency_operation: Option<String>,
    pub functional_redundancy: bool,
    /// Externally generated requirement body.
    pub requirement: String,
    /// Set when this FSR is a child produced by an ASIL decomposition.
    pub decomposition: Option<EntityId>,
    pub status: FsrStatus,
}

impl Fsr {
    /// Active FSRs are realized directly; decomposed ones by their children.
    pub fn is_active(&self) -> bool {
        self.status == FsrStatus::Active
    }
}

// =============================================================================
// ARCHITECTURE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitecturalElement {
    pub id: EntityId,
    pub revision: u32,
    pub name: String,
    pub kind: ElementKind,
    /// Highest ASIL this element can be developed to.
    pub max_asil: Asil,
}

/// Assignment of one FSR to one or more architectural elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: EntityId,
    pub revision: u32,
    pub fsr: EntityId,
    pub elements: Vec<EntityId>,
    pub interface: String,
    /// Freedom-from-interference rationale.
    pub ffi_rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyMechanism {
    pub id: EntityId,
    pub revision: u32,
    pub name: String,
    pub category: MechanismCategory,
    pub coverage: Coverage,
    /// Whether this mechanism claims independence from other mechanisms
    /// covering the same requirement.
    pub independent: bool,
    pub covers: BTreeSet<EntityId>,
}

// =============================================================================
// DECOMPOSITION
// =============================================================================

/// One child requirement of a decomposition and the ASIL it received.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DecomposedPart {
    pub fsr: EntityId,
    pub asil: Asil,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsilDecomposition {
    pub id: EntityId,
    pub revision: u32,
    /// The FSR (or safety goal) being decomposed.
    pub parent: EntityId,
    /// ASIL of the parent at proposal time.
    pub target: Asil,
    pub pattern: DecompositionPattern,
    pub children: Vec<DecomposedPart>,
    pub justification: String,
    pub status: DecompositionStatus,
}

impl AsilDecomposition {
    pub fn is_applied(&self) -> bool {
        self.status == DecompositionStatus::Applied
    }

    /// The ASIL recorded for `fsr`, if it is a child of this decomposition.
    pub fn child_asil(&self, fsr: &EntityId) -> Option<Asil> {
        self.children
            .iter()
            .find(|part| &part.fsr == fsr)
            .map(|part| part.asil)
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCriterion {
    pub id: EntityId,
    pub revision: u32,
    /// The safety goal or FSR being validated.
    pub target: EntityId,
    pub method: String,
    pub environment: String,
    pub pass_criteria: String,
    pub level: ValidationLevel,
}

// =============================================================================
// ENTITY
// =============================================================================

/// Any node of the trace graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    SafetyGoal(SafetyGoal),
    Strategy(Strategy),
    Fsr(Fsr),
    Element(ArchitecturalElement),
    Allocation(Allocation),
    Mechanism(SafetyMechanism),
    Decomposition(AsilDecomposition),
    Criterion(ValidationCriterion),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::SafetyGoal(e) => &e.id,
            Entity::Strategy(e) => &e.id,
            Entity::Fsr(e) => &e.id,
            Entity::Element(e) => &e.id,
            Entity::Allocation(e) => &e.id,
            Entity::Mechanism(e) => &e.id,
            Entity::Decomposition(e) => &e.id,
            Entity::Criterion(e) => &e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::SafetyGoal(_) => EntityKind::SafetyGoal,
            Entity::Strategy(_) => EntityKind::Strategy,
            Entity::Fsr(_) => EntityKind::Fsr,
            Entity::Element(_) => EntityKind::Element,
            Entity::Allocation(_) => EntityKind::Allocation,
            Entity::Mechanism(_) => EntityKind::Mechanism,
            Entity::Decomposition(_) => EntityKind::Decomposition,
            Entity::Criterion(_) => EntityKind::Criterion,
        }
    }

    pub fn revision(&self) -> u32 {
        match self {
            Entity::SafetyGoal(e) => e.revision,
            Entity::Strategy(e) => e.revision,
            Entity::Fsr(e) => e.revision,
            Entity::Element(e) => e.revision,
            Entity::Allocation(e) => e.revision,
            Entity::Mechanism(e) => e.revision,
            Entity::Decomposition(e) => e.revision,
            Entity::Criterion(e) => e.revision,
        }
    }

    pub(crate) fn bump_revision(&mut self) {
        let revision = match self {
            Entity::SafetyGoal(e) => &mut e.revision,
            Entity::Strategy(e) => &mut e.revision,
            Entity::Fsr(e) => &mut e.revision,
            Entity::Element(e) => &mut e.revision,
            Entity::Allocation(e) => &mut e.revision,
            Entity::Mechanism(e) => &mut e.revision,
            Entity::Decomposition(e) => &mut e.revision,
            Entity::Criterion(e) => &mut e.revision,
        };
        *revision = revision.saturating_add(1);
    }

    /// Ids that must already exist for this entity to be inserted.
    pub fn references(&self) -> Vec<&EntityId> {
        match self {
            Entity::SafetyGoal(_) | Entity::Element(_) => Vec::new(),
            Entity::Strategy(s) => vec![&s.goal],
            Entity::Fsr(f) => std::iter::once(&f.goal)
                .chain(f.strategy.as_ref())
                .chain(f.decomposition.as_ref())
                .collect(),
            Entity::Allocation(a) => std::iter::once(&a.fsr).chain(&a.elements).collect(),
            Entity::Mechanism(m) => m.covers.iter().collect(),
            Entity::Decomposition(d) => std::iter::once(&d.parent)
                .chain(d.children.iter().map(|part| &part.fsr))
                .collect(),
            Entity::Criterion(c) => vec![&c.target],
        }
    }

    /// Trace links implied by this entity's references. Links point
    /// from the upstream artifact down to this one.
    pub fn implied_links(&self) -> Vec<TraceLink> {
        let id = self.id().clone();
        let down = |from: &EntityId, relation: Relation| TraceLink::new(from.clone(), id.clone(), relation);
        match self {
            Entity::SafetyGoal(_) | Entity::Element(_) => Vec::new(),
            Entity::Strategy(s) => vec![down(&s.goal, Relation::DerivesFrom)],
            Entity::Fsr(f) => match &f.decomposition {
                Some(dec) => vec![down(dec, Relation::DecomposedInto)],
                None => std::iter::once(&f.goal)
                    .chain(f.strategy.as_ref())
                    .map(|parent| down(parent, Relation::DerivesFrom))
                    .collect(),
            },
            Entity::Allocation(a) => std::iter::once(down(&a.fsr, Relation::AllocatedTo))
                .chain(
                    a.elements
                        .iter()
                        .map(|e| TraceLink::new(id.clone(), e.clone(), Relation::AllocatedTo)),
                )
                .collect(),
            Entity::Mechanism(m) => m
                .covers
                .iter()
                .map(|fsr| down(fsr, Relation::CoveredBy))
                .collect(),
            Entity::Decomposition(d) => vec![down(&d.parent, Relation::DecomposedInto)],
            Entity::Criterion(c) => vec![down(&c.target, Relation::ValidatedBy)],
        }
    }

    pub fn as_goal(&self) -> Option<&SafetyGoal> {
        match self {
            Entity::SafetyGoal(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_strategy(&self) -> Option<&Strategy> {
        match self {
            Entity::Strategy(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fsr(&self) -> Option<&Fsr> {
        match self {
            Entity::Fsr(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ArchitecturalElement> {
        match self {
            Entity::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_allocation(&self) -> Option<&Allocation> {
        match self {
            Entity::Allocation(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_mechanism(&self) -> Option<&SafetyMechanism> {
        match self {
            Entity::Mechanism(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_decomposition(&self) -> Option<&AsilDecomposition> {
        match self {
            Entity::Decomposition(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_criterion(&self) -> Option<&ValidationCriterion> {
        match self {
            Entity::Criterion(c) => Some(c),
            _ => None,
        }
    }
}
