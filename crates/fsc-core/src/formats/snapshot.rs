//! Structured session export.
//!
//! One array per entity kind, the links, the workflow stage, the id counters
//! and the compliance report computed at export time. This is the form both
//! persisted sessions and the document renderer consume.

use crate::entity::{
    Allocation, ArchitecturalElement, AsilDecomposition, Entity, Fsr, SafetyGoal,
    SafetyMechanism, Strategy, ValidationCriterion,
};
use crate::error::{FscError, Result};
use crate::graph::TraceGraph;
use crate::ids::{IdAllocator, IdCounter};
use crate::primitives::SNAPSHOT_FORMAT_VERSION;
use crate::report::ComplianceReport;
use crate::session::SessionConfig;
use crate::system::{Stage, Workflow};
use crate::types::TraceLink;
use serde::{Deserialize, Serialize};

/// Full, self-contained export of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u16,
    pub config: SessionConfig,
    pub stage: Stage,
    pub goals: Vec<SafetyGoal>,
    pub strategies: Vec<Strategy>,
    pub fsrs: Vec<Fsr>,
    pub elements: Vec<ArchitecturalElement>,
    pub allocations: Vec<Allocation>,
    pub mechanisms: Vec<SafetyMechanism>,
    pub decompositions: Vec<AsilDecomposition>,
    pub criteria: Vec<ValidationCriterion>,
    pub links: Vec<TraceLink>,
    pub id_counters: Vec<IdCounter>,
    pub report: ComplianceReport,
}

impl Snapshot {
    /// Capture the given session state.
    pub fn capture(
        config: &SessionConfig,
        workflow: &Workflow,
        graph: &TraceGraph,
        ids: &IdAllocator,
        report: ComplianceReport,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            config: config.clone(),
            stage: workflow.reached(),
            goals: graph.goals().cloned().collect(),
            strategies: graph.strategies().cloned().collect(),
            fsrs: graph.fsrs().cloned().collect(),
            elements: graph.elements().cloned().collect(),
            allocations: graph.allocations().cloned().collect(),
            mechanisms: graph.mechanisms().cloned().collect(),
            decompositions: graph.decompositions().cloned().collect(),
            criteria: graph.criteria().cloned().collect(),
            links: graph.links().cloned().collect(),
            id_counters: ids.counters(),
            report,
        }
    }

    /// Total entity count across kinds.
    pub fn entity_count(&self) -> usize {
        self.goals.len()
            + self.strategies.len()
            + self.fsrs.len()
            + self.elements.len()
            + self.allocations.len()
            + self.mechanisms.len()
            + self.decompositions.len()
            + self.criteria.len()
    }

    /// Entities in kind order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        let goals = self.goals.iter().cloned().map(Entity::SafetyGoal);
        let strategies = self.strategies.iter().cloned().map(Entity::Strategy);
        let fsrs = self.fsrs.iter().cloned().map(Entity::Fsr);
        let elements = self.elements.iter().cloned().map(Entity::Element);
        let allocations = self.allocations.iter().cloned().map(Entity::Allocation);
        let mechanisms = self.mechanisms.iter().cloned().map(Entity::Mechanism);
        let decompositions = self
            .decompositions
            .iter()
            .cloned()
            .map(Entity::Decomposition);
        let criteria = self.criteria.iter().cloned().map(Entity::Criterion);
        goals
            .chain(strategies)
            .chain(fsrs)
            .chain(elements)
            .chain(allocations)
            .chain(mechanisms)
            .chain(decompositions)
            .chain(criteria)
    }

    /// Rebuild the graph, id allocator and workflow.
    pub fn restore(&self) -> Result<(TraceGraph, IdAllocator, Workflow)> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(FscError::Format(format!(
                "unsupported snapshot version {} (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        let graph = TraceGraph::restore(self.entities(), self.links.iter().cloned())?;
        let ids = IdAllocator::from_counters(self.id_counters.iter().cloned());
        Ok((graph, ids, Workflow::at(self.stage)))
    }
}
