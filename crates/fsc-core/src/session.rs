//! # Session
//!
//! One in-progress Functional Safety Concept: a trace graph, its id
//! allocator, the workflow high-water mark and the session configuration.
//!
//! Every mutating operation is gated by the workflow, validated in full and
//! then applied atomically. A failed operation leaves the session unchanged.

use crate::asil::{Asil, Coverage, DecompositionPattern, apply_decomposition, inherit};
use crate::collab::{DocumentRenderer, TextGenerator};
use crate::compositor::{Compositor, PromptContext};
use crate::entity::{
    Allocation, ArchitecturalElement, AsilDecomposition, DecomposedPart, Entity, Fsr,
    HazardContext, SafetyGoal, SafetyMechanism, Strategy, ValidationCriterion,
};
use crate::error::{FscError, Result};
use crate::formats::Snapshot;
use crate::graph::{GraphStore, TraceGraph};
use crate::ids::IdAllocator;
use crate::report::ComplianceReport;
use crate::system::{Stage, StageAssessment, Workflow, assess};
use crate::types::{
    DecompositionStatus, ElementKind, EntityId, EntityKind, FsrCategory, FsrStatus,
    MechanismCategory, StrategyKind, ValidationLevel,
};
use crate::verify::{VerifierConfig, verify_with};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Item or system the FSC is written for.
    pub system_name: String,
    pub verifier: VerifierConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_name: "Unnamed system".to_string(),
            verifier: VerifierConfig::default(),
        }
    }
}

// =============================================================================
// INPUTS
// =============================================================================

/// A parsed safety goal record. Ids are assigned by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalInput {
    pub description: String,
    pub asil: Asil,
    /// Filled with a placeholder by the caller when the analysis has none.
    pub safe_state: String,
    pub ftti: Option<String>,
    pub hazard: HazardContext,
}

/// Replacement fields for a safety goal. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRefinement {
    pub description: Option<String>,
    pub safe_state: Option<String>,
    pub ftti: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsrInput {
    pub goal: EntityId,
    pub strategy: Option<EntityId>,
    /// Defaults to the category mirrored by the strategy's kind.
    pub category: Option<FsrCategory>,
    pub requirement: String,
    /// Defaults to the goal's safe state.
    pub safe_state: Option<String>,
    /// Defaults to the goal's FTTI.
    pub ftti: Option<String>,
    pub operating_modes: Vec<String>,
    pub emergency_operation: Option<String>,
    pub functional_redundancy: bool,
}

impl FsrInput {
    pub fn new(goal: EntityId, requirement: impl Into<String>) -> Self {
        Self {
            goal,
            strategy: None,
            category: None,
            requirement: requirement.into(),
            safe_state: None,
            ftti: None,
            operating_modes: Vec::new(),
            emergency_operation: None,
            functional_redundancy: false,
        }
    }
}

/// Replacement fields for an FSR. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsrRefinement {
    pub requirement: Option<String>,
    pub safe_state: Option<String>,
    pub ftti: Option<String>,
    pub operating_modes: Option<Vec<String>>,
    pub emergency_operation: Option<String>,
    pub functional_redundancy: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInput {
    pub fsr: EntityId,
    pub elements: Vec<EntityId>,
    pub interface: String,
    pub ffi_rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MechanismInput {
    pub name: String,
    pub category: MechanismCategory,
    pub coverage: Coverage,
    pub independent: bool,
    pub covers: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationInput {
    pub target: EntityId,
    pub method: String,
    pub environment: String,
    pub pass_criteria: String,
    pub level: ValidationLevel,
}

/// Content for one child requirement when applying a decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompositionChild {
    pub requirement: String,
    /// Required when decomposing a goal; defaults to the parent FSR's.
    pub category: Option<FsrCategory>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FscError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Session {
    config: SessionConfig,
    graph: TraceGraph,
    ids: IdAllocator,
    workflow: Workflow,
}

impl Session {
    pub fn new(system_name: impl Into<String>) -> Self {
        Self::with_config(SessionConfig {
            system_name: system_name.into(),
            ..SessionConfig::default()
        })
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_verifier_config(&mut self, verifier: VerifierConfig) {
        if verifier != self.config.verifier {
            self.config.verifier = verifier;
            self.workflow.invalidate(EntityKind::Criterion, false);
        }
    }

    pub fn graph(&self) -> &TraceGraph {
        &self.graph
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn stage(&self) -> Stage {
        self.workflow.reached()
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn gate(&self, kind: EntityKind, operation: &str) -> Result<()> {
        self.workflow.require(Stage::required_for(kind), operation)
    }

    /// Allocate an id and insert the entity built from it. The allocator
    /// only advances if the insert succeeds.
    fn insert(
        &mut self,
        kind: EntityKind,
        scope: Option<&EntityId>,
        category: Option<&str>,
        build: impl FnOnce(EntityId) -> Entity,
    ) -> Result<EntityId> {
        let mut ids = self.ids.clone();
        let id = ids.next_id(&self.graph, kind, scope, category)?;
        let id = self.graph.add_node(build(id))?;
        self.ids = ids;
        self.workflow.invalidate(kind, false);
        Ok(id)
    }

    /// Run a multi-step edit against copies, committing only on success.
    fn transaction<T>(
        &mut self,
        op: impl FnOnce(&mut TraceGraph, &mut IdAllocator) -> Result<T>,
    ) -> Result<T> {
        let mut graph = self.graph.clone();
        let mut ids = self.ids.clone();
        let out = op(&mut graph, &mut ids)?;
        self.graph = graph;
        self.ids = ids;
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Safety goals
    // -------------------------------------------------------------------------

    pub fn add_goal(&mut self, input: GoalInput) -> Result<EntityId> {
        self.gate(EntityKind::SafetyGoal, "add safety goal")?;
        let description = required("goal description", &input.description)?;
        self.insert(EntityKind::SafetyGoal, None, None, |id| {
            Entity::SafetyGoal(SafetyGoal {
                id,
                revision: 1,
                description,
                asil: input.asil,
                safe_state: input.safe_state,
                ftti: input.ftti,
                hazard: input.hazard,
            })
        })
    }

    pub fn refine_goal(&mut self, goal: &EntityId, refinement: GoalRefinement) -> Result<()> {
        self.graph.goal(goal)?;
        let description = refinement
            .description
            .as_deref()
            .map(|d| required("goal description", d))
            .transpose()?;
        self.graph.revise(goal, |entity| {
            if let Entity::SafetyGoal(g) = entity {
                if let Some(description) = description {
                    g.description = description;
                }
                if let Some(safe_state) = refinement.safe_state {
                    g.safe_state = safe_state;
                }
                if let Some(ftti) = refinement.ftti {
                    g.ftti = Some(ftti);
                }
            }
            Ok(())
        })?;
        self.workflow.invalidate(EntityKind::SafetyGoal, false);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Strategies
    // -------------------------------------------------------------------------

    pub fn add_strategy(
        &mut self,
        goal: &EntityId,
        kind: StrategyKind,
        content: &str,
    ) -> Result<EntityId> {
        self.gate(EntityKind::Strategy, "add strategy")?;
        self.graph.goal(goal)?;
        let content = required("strategy content", content)?;
        self.insert(EntityKind::Strategy, Some(goal), Some(kind.code()), |id| {
            Entity::Strategy(Strategy {
                id,
                revision: 1,
                goal: goal.clone(),
                kind,
                content,
            })
        })
    }

    /// Generate strategy prose with `generator` and add it.
    pub fn derive_strategy(
        &mut self,
        goal: &EntityId,
        kind: StrategyKind,
        generator: &impl TextGenerator,
    ) -> Result<EntityId> {
        self.gate(EntityKind::Strategy, "add strategy")?;
        let context = self.prompt_context(goal, None, None)?;
        let content = generator.strategy_text(&context, kind)?;
        self.add_strategy(goal, kind, &content)
    }

    // -------------------------------------------------------------------------
    // Functional safety requirements
    // -------------------------------------------------------------------------

    /// Add an FSR. Its ASIL is inherited from the goal.
    pub fn add_fsr(&mut self, input: FsrInput) -> Result<EntityId> {
        self.gate(EntityKind::Fsr, "add FSR")?;
        let goal = self.graph.goal(&input.goal)?.clone();
        let strategy_kind = match &input.strategy {
            Some(id) => {
                let s = self.graph.strategy(id)?;
                if s.goal != goal.id {
                    return Err(FscError::InvalidInput(format!(
                        "strategy {} belongs to {}, not {}",
                        s.id, s.goal, goal.id
                    )));
                }
                Some(s.kind)
            }
            None => None,
        };
        let category = input
            .category
            .or_else(|| strategy_kind.map(StrategyKind::fsr_category))
            .ok_or_else(|| {
                FscError::InvalidInput("FSR category is required without a strategy".to_string())
            })?;
        let requirement = required("requirement", &input.requirement)?;

        self.insert(
            EntityKind::Fsr,
            Some(&input.goal),
            Some(category.code()),
            |id| {
                Entity::Fsr(Fsr {
                    id,
                    revision: 1,
                    goal: goal.id,
                    strategy: input.strategy,
                    category,
                    asil: inherit(goal.asil),
                    safe_state: input.safe_state.unwrap_or(goal.safe_state),
                    ftti: input.ftti.or(goal.ftti),
                    operating_modes: input.operating_modes,
                    emergency_operation: input.emergency_operation,
                    functional_redundancy: input.functional_redundancy,
                    requirement,
                    decomposition: None,
                    status: FsrStatus::Active,
                })
            },
        )
    }

    /// Generate a requirement body with `generator` and add the FSR.
    pub fn derive_fsr(
        &mut self,
        goal: &EntityId,
        strategy: Option<&EntityId>,
        category: Option<FsrCategory>,
        generator: &impl TextGenerator,
    ) -> Result<EntityId> {
        self.gate(EntityKind::Fsr, "add FSR")?;
        let context = self.prompt_context(goal, strategy, category)?;
        let requirement = generator.requirement_text(&context)?;
        let mut input = FsrInput::new(goal.clone(), requirement);
        input.strategy = strategy.cloned();
        input.category = context.category;
        self.add_fsr(input)
    }

    pub fn refine_fsr(&mut self, fsr: &EntityId, refinement: FsrRefinement) -> Result<()> {
        self.graph.fsr(fsr)?;
        let requirement = refinement
            .requirement
            .as_deref()
            .map(|r| required("requirement", r))
            .transpose()?;
        self.graph.revise(fsr, |entity| {
            if let Entity::Fsr(f) = entity {
                if let Some(requirement) = requirement {
                    f.requirement = requirement;
                }
                if let Some(safe_state) = refinement.safe_state {
                    f.safe_state = safe_state;
                }
                if let Some(ftti) = refinement.ftti {
                    f.ftti = Some(ftti);
                }
                if let Some(modes) = refinement.operating_modes {
                    f.operating_modes = modes;
                }
                if let Some(eoti) = refinement.emergency_operation {
                    f.emergency_operation = Some(eoti);
                }
                if let Some(redundancy) = refinement.functional_redundancy {
                    f.functional_redundancy = redundancy;
                }
            }
            Ok(())
        })?;
        self.workflow.invalidate(EntityKind::Fsr, false);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Architecture
    // -------------------------------------------------------------------------

    pub fn add_element(&mut self, name: &str, kind: ElementKind, max_asil: Asil) -> Result<EntityId> {
        self.gate(EntityKind::Element, "add element")?;
        let name = required("element name", name)?;
        self.insert(EntityKind::Element, None, Some(kind.code()), |id| {
            Entity::Element(ArchitecturalElement {
                id,
                revision: 1,
                name,
                kind,
                max_asil,
            })
        })
    }

    pub fn allocate(&mut self, input: AllocationInput) -> Result<EntityId> {
        self.gate(EntityKind::Allocation, "allocate FSR")?;
        self.graph.fsr(&input.fsr)?;
        if input.elements.is_empty() {
            return Err(FscError::InvalidInput(
                "allocation needs at least one element".to_string(),
            ));
        }
        for element in &input.elements {
            self.graph.element(element)?;
        }
        let interface = required("interface", &input.interface)?;
        let fsr = input.fsr.clone();
        self.insert(EntityKind::Allocation, Some(&fsr), None, |id| {
            Entity::Allocation(Allocation {
                id,
                revision: 1,
                fsr: input.fsr,
                elements: input.elements,
                interface,
                ffi_rationale: input.ffi_rationale,
            })
        })
    }

    pub fn add_mechanism(&mut self, input: MechanismInput) -> Result<EntityId> {
        self.gate(EntityKind::Mechanism, "add safety mechanism")?;
        let name = required("mechanism name", &input.name)?;
        if input.covers.is_empty() {
            return Err(FscError::InvalidInput(
                "mechanism must cover at least one FSR".to_string(),
            ));
        }
        for fsr in &input.covers {
            self.graph.fsr(fsr)?;
        }
        self.insert(
            EntityKind::Mechanism,
            None,
            Some(input.category.code()),
            |id| {
                Entity::Mechanism(SafetyMechanism {
                    id,
                    revision: 1,
                    name,
                    category: input.category,
                    coverage: input.coverage,
                    independent: input.independent,
                    covers: input.covers.into_iter().collect(),
                })
            },
        )
    }

    /// Extend an existing mechanism to cover more FSRs.
    pub fn extend_coverage(&mut self, mechanism: &EntityId, fsrs: &[EntityId]) -> Result<()> {
        self.gate(EntityKind::Mechanism, "extend mechanism coverage")?;
        self.graph.mechanism(mechanism)?;
        for fsr in fsrs {
            self.graph.fsr(fsr)?;
        }
        self.graph.revise(mechanism, |entity| {
            if let Entity::Mechanism(m) = entity {
                m.covers.extend(fsrs.iter().cloned());
            }
            Ok(())
        })?;
        self.workflow.invalidate(EntityKind::Mechanism, false);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Decomposition
    // -------------------------------------------------------------------------

    /// Propose decomposing an FSR or goal with `pattern`.
    pub fn propose_decomposition(
        &mut self,
        parent: &EntityId,
        pattern: DecompositionPattern,
        justification: &str,
    ) -> Result<EntityId> {
        self.gate(EntityKind::Decomposition, "propose decomposition")?;
        let target = match self.graph.get_node(parent) {
            Some(Entity::Fsr(f)) if !f.is_active() => {
                return Err(FscError::InvalidInput(format!(
                    "{} is already decomposed",
                    f.id
                )));
            }
            Some(Entity::Fsr(f)) => f.asil,
            Some(Entity::SafetyGoal(g)) => g.asil,
            Some(other) => {
                return Err(FscError::KindMismatch {
                    id: parent.clone(),
                    expected: EntityKind::Fsr,
                    actual: other.kind(),
                });
            }
            None => return Err(FscError::UnknownEntity(parent.clone())),
        };
        apply_decomposition(target, &pattern)?;
        let justification = required("independence justification", justification)?;

        self.insert(EntityKind::Decomposition, Some(parent), None, |id| {
            Entity::Decomposition(AsilDecomposition {
                id,
                revision: 1,
                parent: parent.clone(),
                target,
                pattern,
                children: Vec::new(),
                justification,
                status: DecompositionStatus::Proposed,
            })
        })
    }

    /// Apply a proposed decomposition: create one child FSR per pattern part
    /// with the part's ASIL and mark the parent FSR decomposed.
    pub fn apply_decomposition(
        &mut self,
        decomposition: &EntityId,
        children: Vec<DecompositionChild>,
    ) -> Result<Vec<EntityId>> {
        self.gate(EntityKind::Decomposition, "apply decomposition")?;
        let dec = self.graph.decomposition(decomposition)?.clone();
        if dec.status == DecompositionStatus::Applied {
            return Err(FscError::InvalidInput(format!("{} is already applied", dec.id)));
        }
        let parts = apply_decomposition(dec.target, &dec.pattern)?;
        if children.len() != parts.len() {
            return Err(FscError::InvalidInput(format!(
                "{} needs {} child requirements, got {}",
                dec.pattern,
                parts.len(),
                children.len()
            )));
        }

        let parent_fsr = self.graph.fsr(&dec.parent).ok().cloned();
        if let Some(parent) = parent_fsr.as_ref().filter(|f| !f.is_active()) {
            return Err(FscError::InvalidInput(format!(
                "{} is already decomposed",
                parent.id
            )));
        }
        if let Some(other) = self
            .graph
            .decompositions()
            .find(|d| d.parent == dec.parent && d.id != dec.id && d.is_applied())
        {
            return Err(FscError::InvalidInput(format!(
                "{} is already decomposed by {}",
                dec.parent, other.id
            )));
        }
        let goal = match &parent_fsr {
            Some(f) => self.graph.goal(&f.goal)?.clone(),
            None => self.graph.goal(&dec.parent)?.clone(),
        };

        let mut drafts = Vec::with_capacity(parts.len());
        for (child, asil) in children.into_iter().zip(parts) {
            let requirement = required("requirement", &child.requirement)?;
            let category = child
                .category
                .or_else(|| parent_fsr.as_ref().map(|f| f.category))
                .ok_or_else(|| {
                    FscError::InvalidInput(
                        "child category is required when decomposing a goal".to_string(),
                    )
                })?;
            drafts.push((requirement, category, asil));
        }

        let created = self.transaction(|graph, ids| {
            let mut created = Vec::with_capacity(drafts.len());
            for (requirement, category, asil) in drafts {
                let id = ids.next_id(graph, EntityKind::Fsr, Some(&goal.id), Some(category.code()))?;
                let id = graph.add_node(Entity::Fsr(Fsr {
                    id,
                    revision: 1,
                    goal: goal.id.clone(),
                    strategy: None,
                    category,
                    asil,
                    safe_state: parent_fsr
                        .as_ref()
                        .map_or_else(|| goal.safe_state.clone(), |f| f.safe_state.clone()),
                    ftti: parent_fsr
                        .as_ref()
                        .map_or_else(|| goal.ftti.clone(), |f| f.ftti.clone()),
                    operating_modes: parent_fsr
                        .as_ref()
                        .map(|f| f.operating_modes.clone())
                        .unwrap_or_default(),
                    emergency_operation: parent_fsr
                        .as_ref()
                        .and_then(|f| f.emergency_operation.clone()),
                    functional_redundancy: parent_fsr
                        .as_ref()
                        .is_some_and(|f| f.functional_redundancy),
                    requirement,
                    decomposition: Some(dec.id.clone()),
                    status: FsrStatus::Active,
                }))?;
                created.push(DecomposedPart { fsr: id, asil });
            }

            graph.revise(&dec.id, |entity| {
                if let Entity::Decomposition(d) = entity {
                    d.children = created.clone();
                    d.status = DecompositionStatus::Applied;
                }
                Ok(())
            })?;
            if parent_fsr.is_some() {
                graph.revise(&dec.parent, |entity| {
                    if let Entity::Fsr(f) = entity {
                        f.status = FsrStatus::Decomposed;
                    }
                    Ok(())
                })?;
            }
            Ok(created)
        })?;

        self.workflow.invalidate(EntityKind::Decomposition, false);
        Ok(created.into_iter().map(|part| part.fsr).collect())
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    pub fn add_validation(&mut self, input: ValidationInput) -> Result<EntityId> {
        self.gate(EntityKind::Criterion, "add validation criterion")?;
        match self.graph.get_node(&input.target).map(Entity::kind) {
            Some(EntityKind::SafetyGoal | EntityKind::Fsr) => {}
            Some(actual) => {
                return Err(FscError::KindMismatch {
                    id: input.target.clone(),
                    expected: EntityKind::Fsr,
                    actual,
                });
            }
            None => return Err(FscError::UnknownEntity(input.target.clone())),
        }
        let method = required("validation method", &input.method)?;
        let pass_criteria = required("pass criteria", &input.pass_criteria)?;
        let target = input.target.clone();
        self.insert(
            EntityKind::Criterion,
            Some(&target),
            Some(input.level.code()),
            |id| {
                Entity::Criterion(ValidationCriterion {
                    id,
                    revision: 1,
                    target: input.target,
                    method,
                    environment: input.environment,
                    pass_criteria,
                    level: input.level,
                })
            },
        )
    }

    // -------------------------------------------------------------------------
    // Removal, workflow, verification
    // -------------------------------------------------------------------------

    /// Remove an entity and the links touching it. Descendants are kept and
    /// show up as orphans in the next report.
    /// Remove an entity and its links. Removing an applied decomposition
    /// returns its parent FSR to `Active` when the parent's own references
    /// are intact.
    pub fn remove(&mut self, id: &EntityId) -> Result<Entity> {
        let entity = self.transaction(|graph, _| {
            let entity = graph.remove(id)?;
            if let Entity::Decomposition(dec) = &entity {
                let parent_intact = matches!(
                    graph.get_node(&dec.parent),
                    Some(parent @ Entity::Fsr(_))
                        if parent.references().into_iter().all(|r| graph.contains(r))
                );
                if dec.is_applied() && parent_intact {
                    graph.revise(&dec.parent, |parent| {
                        if let Entity::Fsr(f) = parent {
                            f.status = FsrStatus::Active;
                        }
                        Ok(())
                    })?;
                }
            }
            Ok(entity)
        })?;
        self.workflow.invalidate(entity.kind(), true);
        Ok(entity)
    }

    pub fn transition(&mut self, target: Stage) -> Result<Stage> {
        self.workflow
            .transition(target, &self.graph, &self.config.verifier)
    }

    pub fn advance(&mut self) -> Result<Stage> {
        self.workflow.advance(&self.graph, &self.config.verifier)
    }

    pub fn assess(&self) -> StageAssessment {
        assess(&self.workflow, &self.graph, &self.config.verifier)
    }

    pub fn verify(&self) -> ComplianceReport {
        verify_with(&self.graph, &self.config.verifier)
    }

    pub fn prompt_context(
        &self,
        goal: &EntityId,
        strategy: Option<&EntityId>,
        category: Option<FsrCategory>,
    ) -> Result<PromptContext> {
        Compositor::prompt_context(&self.graph, &self.config.system_name, goal, strategy, category)
    }

    /// Render the FSC document. Requires the `Verified` stage and moves the
    /// workflow to `DocumentGenerated`; regenerating is allowed.
    pub fn generate_document<R: DocumentRenderer>(&mut self, renderer: &R) -> Result<R::Output> {
        self.workflow.require(Stage::Verified, "generate document")?;
        let report = self.verify();
        if !report.passed {
            return Err(FscError::StagePrecondition {
                target: Stage::DocumentGenerated,
                requirement: format!(
                    "verification must pass ({} violations)",
                    report.violations.len()
                ),
                entities: report.violations.into_iter().map(|v| v.entity).collect(),
            });
        }
        let output = renderer.render(&self.export_snapshot())?;
        self.transition(Stage::DocumentGenerated)?;
        Ok(output)
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Full export with a freshly computed report.
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.config,
            &self.workflow,
            &self.graph,
            &self.ids,
            self.verify(),
        )
    }

    /// Restore a session. The stored stage is lowered to what the restored
    /// graph actually supports.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        let (graph, ids, workflow) = snapshot.restore()?;
        let mut session = Self {
            config: snapshot.config.clone(),
            graph,
            ids,
            workflow,
        };
        let reached = session.stage();
        let attainable = session.assess().attainable;
        let supported = if reached == Stage::DocumentGenerated && attainable == Stage::Verified {
            Stage::DocumentGenerated
        } else {
            reached.min(attainable)
        };
        session.workflow = Workflow::at(supported);
        Ok(session)
    }

    /// Ids of every entity, for existence checks in callers.
    pub fn entity_ids(&self) -> BTreeSet<EntityId> {
        self.graph.entities().map(|e| e.id().clone()).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
