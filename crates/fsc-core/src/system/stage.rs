//! # Workflow Stage Controller
//!
//! Finite state machine over the FSC development stages.
//!
//! The controller tracks the highest stage reached. Forward transitions go
//! one stage at a time and only when the target's entry condition holds on
//! the current graph. Backward transitions are always allowed. Edits to an
//! upstream entity pull the high-water mark back to the stage that owns that
//! entity, forcing re-verification of everything downstream.

use crate::error::{FscError, Result};
use crate::graph::TraceGraph;
use crate::types::{EntityId, EntityKind};
use crate::verify::{
    VerifierConfig, allocation_completeness, goal_coverage, validation_coverage, verify_with,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// STAGE
// =============================================================================

/// Development stage, in strict forward order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    Initialized,
    GoalsLoaded,
    StrategiesDeveloped,
    #[serde(rename = "FSRsDerived")]
    FsrsDerived,
    Allocated,
    ValidationSpecified,
    Verified,
    DocumentGenerated,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Initialized,
        Stage::GoalsLoaded,
        Stage::StrategiesDeveloped,
        Stage::FsrsDerived,
        Stage::Allocated,
        Stage::ValidationSpecified,
        Stage::Verified,
        Stage::DocumentGenerated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initialized => "Initialized",
            Stage::GoalsLoaded => "GoalsLoaded",
            Stage::StrategiesDeveloped => "StrategiesDeveloped",
            Stage::FsrsDerived => "FSRsDerived",
            Stage::Allocated => "Allocated",
            Stage::ValidationSpecified => "ValidationSpecified",
            Stage::Verified => "Verified",
            Stage::DocumentGenerated => "DocumentGenerated",
        }
    }

    #[must_use]
    pub fn next(self) -> Option<Stage> {
        Self::ALL.get((self as usize).saturating_add(1)).copied()
    }

    #[must_use]
    pub fn previous(self) -> Option<Stage> {
        (self as usize)
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// The stage whose exit condition an entity kind contributes to.
    pub fn owner_of(kind: EntityKind) -> Stage {
        match kind {
            EntityKind::SafetyGoal => Stage::GoalsLoaded,
            EntityKind::Strategy => Stage::StrategiesDeveloped,
            EntityKind::Fsr | EntityKind::Decomposition => Stage::FsrsDerived,
            EntityKind::Element | EntityKind::Allocation | EntityKind::Mechanism => {
                Stage::Allocated
            }
            EntityKind::Criterion => Stage::ValidationSpecified,
        }
    }

    /// Minimum stage at which entities of a kind may be added.
    pub fn required_for(kind: EntityKind) -> Stage {
        match kind {
            EntityKind::SafetyGoal | EntityKind::Element => Stage::Initialized,
            EntityKind::Strategy => Stage::GoalsLoaded,
            EntityKind::Fsr => Stage::StrategiesDeveloped,
            EntityKind::Allocation | EntityKind::Mechanism | EntityKind::Decomposition => {
                Stage::FsrsDerived
            }
            EntityKind::Criterion => Stage::Allocated,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = FscError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| FscError::InvalidInput(format!("unknown stage '{}'", s)))
    }
}

// =============================================================================
// ENTRY CONDITIONS
// =============================================================================

/// Check the entry condition of `target` against the graph.
pub fn entry_condition(target: Stage, graph: &TraceGraph, config: &VerifierConfig) -> Result<()> {
    let fail = |requirement: &str, entities: Vec<EntityId>| -> Result<()> {
        Err(FscError::StagePrecondition {
            target,
            requirement: requirement.to_string(),
            entities,
        })
    };

    match target {
        Stage::Initialized => Ok(()),
        Stage::GoalsLoaded => {
            if graph.goals().next().is_none() {
                fail("at least one safety goal is required", Vec::new())
            } else {
                Ok(())
            }
        }
        Stage::StrategiesDeveloped => {
            let lacking: Vec<_> = graph
                .goals()
                .filter(|g| graph.strategies().all(|s| s.goal != g.id))
                .map(|g| g.id.clone())
                .collect();
            require_none("every safety goal needs a strategy", lacking, fail)
        }
        Stage::FsrsDerived => require_none(
            "every safety goal needs a derived FSR",
            goal_coverage(graph).into_iter().map(|v| v.entity).collect(),
            fail,
        ),
        Stage::Allocated => require_none(
            "every FSR needs an allocation",
            allocation_completeness(graph)
                .into_iter()
                .map(|v| v.entity)
                .collect(),
            fail,
        ),
        Stage::ValidationSpecified => require_none(
            "every safety goal and FSR needs a validation criterion",
            validation_coverage(graph)
                .into_iter()
                .map(|v| v.entity)
                .collect(),
            fail,
        ),
        Stage::Verified => {
            let report = verify_with(graph, config);
            let mut seen = BTreeSet::new();
            let entities: Vec<_> = report
                .violations
                .into_iter()
                .map(|v| v.entity)
                .filter(|id| seen.insert(id.clone()))
                .collect();
            require_none("verification must pass", entities, fail)
        }
        Stage::DocumentGenerated => Ok(()),
    }
}

fn require_none(
    requirement: &str,
    entities: Vec<EntityId>,
    fail: impl Fn(&str, Vec<EntityId>) -> Result<()>,
) -> Result<()> {
    if entities.is_empty() {
        Ok(())
    } else {
        fail(requirement, entities)
    }
}

// =============================================================================
// WORKFLOW
// =============================================================================

/// High-water mark of the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    reached: Stage,
}

impl Workflow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume at a persisted stage.
    #[must_use]
    pub fn at(reached: Stage) -> Self {
        Self { reached }
    }

    #[must_use]
    pub fn reached(&self) -> Stage {
        self.reached
    }

    /// Fail unless the workflow has reached `stage`.
    pub fn require(&self, stage: Stage, operation: &str) -> Result<()> {
        if self.reached >= stage {
            return Ok(());
        }
        Err(FscError::StagePrecondition {
            target: stage,
            requirement: format!("{} is not allowed at {}", operation, self.reached),
            entities: Vec::new(),
        })
    }

    /// Move to `target`.
    ///
    /// Re-entering the current stage is a no-op. Moving backward rewinds the
    /// high-water mark. Moving forward is allowed one stage at a time.
    pub fn transition(
        &mut self,
        target: Stage,
        graph: &TraceGraph,
        config: &VerifierConfig,
    ) -> Result<Stage> {
        if target <= self.reached {
            self.reached = target;
            return Ok(target);
        }
        if Some(target) != self.reached.next() {
            let missing = target.previous().unwrap_or(Stage::Initialized);
            return Err(FscError::StagePrecondition {
                target,
                requirement: format!("{} must be reached first (at {})", missing, self.reached),
                entities: Vec::new(),
            });
        }
        entry_condition(target, graph, config)?;
        self.reached = target;
        Ok(target)
    }

    /// Advance to the next stage, if any.
    pub fn advance(&mut self, graph: &TraceGraph, config: &VerifierConfig) -> Result<Stage> {
        match self.reached.next() {
            Some(next) => self.transition(next, graph, config),
            None => Ok(self.reached),
        }
    }

    /// Record an edit to an entity of `kind`. Additions and refinements pull
    /// the mark back to the owning stage; removals to the stage before it.
    pub fn invalidate(&mut self, kind: EntityKind, removal: bool) {
        let owner = Stage::owner_of(kind);
        let cap = if removal {
            owner.previous().unwrap_or(Stage::Initialized)
        } else {
            owner
        };
        self.reached = self.reached.min(cap);
    }
}

// =============================================================================
// ASSESSMENT
// =============================================================================

/// Read-only view of where the workflow stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAssessment {
    pub reached: Stage,
    /// Highest stage whose entry chain holds on the current graph.
    pub attainable: Stage,
    pub next: Option<Stage>,
    /// Why `next` cannot be entered yet, if it cannot.
    pub blocker: Option<String>,
    pub blocking_entities: Vec<EntityId>,
    pub entity_counts: Vec<(EntityKind, usize)>,
}

/// Assess the workflow against the graph without changing anything.
pub fn assess(workflow: &Workflow, graph: &TraceGraph, config: &VerifierConfig) -> StageAssessment {
    let mut attainable = Stage::Initialized;
    while let Some(next) = attainable.next() {
        if next == Stage::DocumentGenerated || entry_condition(next, graph, config).is_err() {
            break;
        }
        attainable = next;
    }

    let next = workflow.reached().next();
    let (blocker, blocking_entities) = match next.map(|n| entry_condition(n, graph, config)) {
        Some(Err(FscError::StagePrecondition {
            requirement,
            entities,
            ..
        })) => (Some(requirement), entities),
        Some(Err(other)) => (Some(other.to_string()), Vec::new()),
        _ => (None, Vec::new()),
    };

    StageAssessment {
        reached: workflow.reached(),
        attainable,
        next,
        blocker,
        blocking_entities,
        entity_counts: EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, graph.count_of(kind)))
            .filter(|(_, n)| *n > 0)
            .collect(),
    }
}

impl StageAssessment {
    pub fn node_total(&self) -> usize {
        self.entity_counts.iter().map(|(_, n)| n).sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::asil::Asil;
    use crate::entity::{Entity, HazardContext, SafetyGoal, Strategy};
    use crate::graph::GraphStore;
    use crate::types::StrategyKind;

    fn graph_with_goal() -> TraceGraph {
        let mut graph = TraceGraph::new();
        graph
            .add_node(Entity::SafetyGoal(SafetyGoal {
                id: EntityId::from("SG-001"),
                revision: 1,
                description: "Avoid loss of lighting".to_string(),
                asil: Asil::B,
                safe_state: "Low beam on".to_string(),
                ftti: None,
                hazard: HazardContext::default(),
            }))
            .unwrap();
        graph
    }

    #[test]
    fn stage_order_and_neighbours() {
        assert!(Stage::Initialized < Stage::DocumentGenerated);
        assert_eq!(Stage::Initialized.next(), Some(Stage::GoalsLoaded));
        assert_eq!(Stage::DocumentGenerated.next(), None);
        assert_eq!(Stage::Initialized.previous(), None);
        assert_eq!("fsrs-derived".parse::<Stage>().ok(), Some(Stage::FsrsDerived));
    }

    #[test]
    fn goals_loaded_needs_a_goal() {
        let mut workflow = Workflow::new();
        let config = VerifierConfig::default();
        let err = workflow.transition(Stage::GoalsLoaded, &TraceGraph::new(), &config);
        assert!(matches!(err, Err(FscError::StagePrecondition { .. })));
        assert_eq!(workflow.reached(), Stage::Initialized);

        let graph = graph_with_goal();
        assert_eq!(
            workflow.transition(Stage::GoalsLoaded, &graph, &config),
            Ok(Stage::GoalsLoaded)
        );
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let mut workflow = Workflow::new();
        let graph = graph_with_goal();
        let err = workflow
            .transition(Stage::StrategiesDeveloped, &graph, &VerifierConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("GoalsLoaded must be reached first"));
    }

    #[test]
    fn strategies_stage_names_goals_without_strategy() {
        let mut workflow = Workflow::at(Stage::GoalsLoaded);
        let mut graph = graph_with_goal();
        let config = VerifierConfig::default();

        let err = workflow
            .transition(Stage::StrategiesDeveloped, &graph, &config)
            .unwrap_err();
        assert_eq!(
            err,
            FscError::StagePrecondition {
                target: Stage::StrategiesDeveloped,
                requirement: "every safety goal needs a strategy".to_string(),
                entities: vec![EntityId::from("SG-001")],
            }
        );

        graph
            .add_node(Entity::Strategy(Strategy {
                id: EntityId::from("STR-SG001-DET-1"),
                revision: 1,
                goal: EntityId::from("SG-001"),
                kind: StrategyKind::Detection,
                content: "Monitor lamp current".to_string(),
            }))
            .unwrap();
        assert!(workflow.advance(&graph, &config).is_ok());
        assert_eq!(workflow.reached(), Stage::StrategiesDeveloped);
    }

    #[test]
    fn backward_and_same_stage_transitions() {
        let mut workflow = Workflow::at(Stage::DocumentGenerated);
        let graph = TraceGraph::new();
        let config = VerifierConfig::default();
        assert_eq!(
            workflow.transition(Stage::DocumentGenerated, &graph, &config),
            Ok(Stage::DocumentGenerated)
        );
        assert_eq!(
            workflow.transition(Stage::FsrsDerived, &graph, &config),
            Ok(Stage::FsrsDerived)
        );
        assert_eq!(workflow.reached(), Stage::FsrsDerived);
    }

    #[test]
    fn edits_pull_back_the_high_water_mark() {
        let mut workflow = Workflow::at(Stage::Verified);
        workflow.invalidate(EntityKind::Criterion, false);
        assert_eq!(workflow.reached(), Stage::ValidationSpecified);
        workflow.invalidate(EntityKind::Strategy, true);
        assert_eq!(workflow.reached(), Stage::GoalsLoaded);
        workflow.invalidate(EntityKind::Criterion, false);
        assert_eq!(workflow.reached(), Stage::GoalsLoaded);
    }

    #[test]
    fn require_gates_operations() {
        let workflow = Workflow::at(Stage::GoalsLoaded);
        assert!(workflow.require(Stage::GoalsLoaded, "add strategy").is_ok());
        let err = workflow
            .require(Stage::StrategiesDeveloped, "add FSR")
            .unwrap_err();
        assert!(err.to_string().contains("add FSR is not allowed at GoalsLoaded"));
    }

    #[test]
    fn assessment_reports_blocker() {
        let graph = graph_with_goal();
        let assessment = assess(
            &Workflow::at(Stage::GoalsLoaded),
            &graph,
            &VerifierConfig::default(),
        );
        assert_eq!(assessment.attainable, Stage::GoalsLoaded);
        assert_eq!(assessment.next, Some(Stage::StrategiesDeveloped));
        assert_eq!(assessment.blocking_entities, vec![EntityId::from("SG-001")]);
        assert_eq!(assessment.node_total(), graph.node_count());
    }
}
