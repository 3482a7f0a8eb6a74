//! # Compositor Module
//!
//! Assembles raw structure out of the graph for the collaborators.
//!
//! The compositor never produces prose. It gathers what a text generator
//! needs to write a strategy or requirement ([`PromptContext`]) and what a
//! renderer needs to lay out traceability ([`TraceRow`]).

use crate::asil::Asil;
use crate::error::{FscError, Result};
use crate::graph::{GraphStore, TraceGraph};
use crate::types::{EntityId, FsrCategory, Relation, StrategyKind};
use serde::{Deserialize, Serialize};

/// Structured input for the text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContext {
    pub system_name: String,
    pub goal: EntityId,
    pub goal_description: String,
    pub asil: Asil,
    pub safe_state: String,
    pub ftti: Option<String>,
    pub category: Option<FsrCategory>,
    pub strategy: Option<StrategyContext>,
    /// Requirement bodies already derived for this goal, to avoid repeats.
    pub existing_requirements: Vec<String>,
    pub verification_methods: Vec<String>,
}

/// The strategy a requirement is being derived under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyContext {
    pub id: EntityId,
    pub kind: StrategyKind,
    pub content: String,
}

/// One row of the goal-to-validation traceability matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    pub goal: EntityId,
    pub fsr: EntityId,
    pub asil: Asil,
    pub allocations: Vec<EntityId>,
    pub elements: Vec<EntityId>,
    pub mechanisms: Vec<EntityId>,
    pub criteria: Vec<EntityId>,
}

/// Output assembly over a trace graph.
pub struct Compositor;

impl Compositor {
    /// Build the context for generating text under `goal`.
    ///
    /// `strategy`, when given, must belong to `goal`.
    pub fn prompt_context(
        graph: &TraceGraph,
        system_name: &str,
        goal: &EntityId,
        strategy: Option<&EntityId>,
        category: Option<FsrCategory>,
    ) -> Result<PromptContext> {
        let sg = graph.goal(goal)?;
        let strategy = match strategy {
            Some(id) => {
                let s = graph.strategy(id)?;
                if &s.goal != goal {
                    return Err(FscError::InvalidInput(format!(
                        "strategy {} belongs to {}, not {}",
                        s.id, s.goal, goal
                    )));
                }
                Some(StrategyContext {
                    id: s.id.clone(),
                    kind: s.kind,
                    content: s.content.clone(),
                })
            }
            None => None,
        };

        Ok(PromptContext {
            system_name: system_name.to_string(),
            goal: sg.id.clone(),
            goal_description: sg.description.clone(),
            asil: sg.asil,
            safe_state: sg.safe_state.clone(),
            ftti: sg.ftti.clone(),
            category: category.or_else(|| strategy.as_ref().map(|s| s.kind.fsr_category())),
            strategy,
            existing_requirements: graph
                .fsrs()
                .filter(|f| &f.goal == goal)
                .map(|f| f.requirement.clone())
                .collect(),
            verification_methods: sg
                .asil
                .verification_methods()
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        })
    }

    /// Walk upstream from `id` to a root, taking the first parent at each
    /// step. The result starts at the root.
    ///
    /// Returns `None` if `id` is not in the graph.
    pub fn trace_path(graph: &TraceGraph, id: &EntityId) -> Option<Vec<EntityId>> {
        if !graph.contains(id) {
            return None;
        }
        let mut path = vec![id.clone()];
        let mut current = id.clone();
        loop {
            let next = graph.incoming(&current).next().map(|l| l.source.clone());
            let Some(parent) = next else {
                break;
            };
            if path.contains(&parent) {
                break;
            }
            path.push(parent.clone());
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// One row per FSR, grouped by goal in insertion order.
    pub fn trace_matrix(graph: &TraceGraph) -> Vec<TraceRow> {
        let mut rows = Vec::new();
        for goal in graph.goals() {
            for fsr in graph.fsrs().filter(|f| f.goal == goal.id) {
                let allocations = graph.children(&fsr.id, Relation::AllocatedTo);
                let elements = allocations
                    .iter()
                    .flat_map(|a| graph.children(a, Relation::AllocatedTo))
                    .collect();
                rows.push(TraceRow {
                    goal: goal.id.clone(),
                    fsr: fsr.id.clone(),
                    asil: fsr.asil,
                    allocations,
                    elements,
                    mechanisms: graph.children(&fsr.id, Relation::CoveredBy),
                    criteria: graph.children(&fsr.id, Relation::ValidatedBy),
                });
            }
        }
        rows
    }
}

// =============================================================================
// TESTS
// =============================================================================
