//! # Graph Store
//!
//! The single source of truth for an FSC session: every entity plus the
//! directed trace links between them.
//!
//! All data structures use `BTreeMap` for deterministic ordering. Nodes and
//! links are keyed by monotonically increasing insertion indices, so every
//! traversal follows insertion order.

use crate::entity::{
    Allocation, ArchitecturalElement, AsilDecomposition, Entity, Fsr, SafetyGoal,
    SafetyMechanism, Strategy, ValidationCriterion,
};
use crate::error::{FscError, Result};
use crate::types::{EntityId, EntityKind, LinkIndex, NodeIndex, Relation, TraceLink};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// Core trace-graph operations.
///
/// Every mutation is atomic: on error the store is exactly as before.
pub trait GraphStore {
    /// Insert an entity, materializing the links its references imply.
    ///
    /// Fails with `DuplicateEntity` if the id is taken and with
    /// `ReferentialIntegrity` if a referenced id is absent.
    fn add_node(&mut self, entity: Entity) -> Result<EntityId>;

    /// Insert a link. Adding an identical link twice is a no-op.
    ///
    /// Fails with `UnknownEntity` if an endpoint is absent and with `Cycle`
    /// if a derivation link would close a cycle.
    fn add_link(&mut self, source: &EntityId, target: &EntityId, relation: Relation)
    -> Result<()>;

    /// Lookup an entity by id.
    fn get_node(&self, id: &EntityId) -> Option<&Entity>;

    /// Targets of `id`'s outgoing links of `relation`, in insertion order.
    fn children(&self, id: &EntityId, relation: Relation) -> Vec<EntityId>;

    /// Sources of `id`'s incoming links of `relation`, in insertion order.
    fn parents(&self, id: &EntityId, relation: Relation) -> Vec<EntityId>;

    /// Remove a node and every link touching it. Descendants stay in place.
    fn remove(&mut self, id: &EntityId) -> Result<Entity>;

    /// Get the total number of nodes.
    fn node_count(&self) -> usize;

    /// Get the total number of links.
    fn link_count(&self) -> usize;

    /// Acquire a read lock for consistent snapshots.
    fn acquire_read_lock(&self) -> GraphReadGuard<'_>;
}

// =============================================================================
// READ GUARD
// =============================================================================

/// Guard holding an immutable borrow of the graph for a consistent view.
///
/// Cross-thread exclusion is provided one level up by
/// [`SharedSession`](crate::registry::SharedSession).
pub struct GraphReadGuard<'a> {
    graph: &'a TraceGraph,
}

impl<'a> GraphReadGuard<'a> {
    fn new(graph: &'a TraceGraph) -> Self {
        Self { graph }
    }

    #[must_use]
    pub fn graph(&self) -> &TraceGraph {
        self.graph
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.graph.link_count()
    }
}

// =============================================================================
// TRACE GRAPH
// =============================================================================

/// In-memory trace graph.
#[derive(Debug, Clone, Default)]
pub struct TraceGraph {
    /// Node storage: NodeIndex -> Entity
    nodes: BTreeMap<NodeIndex, Entity>,

    /// Reverse lookup: EntityId -> NodeIndex
    index: BTreeMap<EntityId, NodeIndex>,

    /// Link storage: LinkIndex -> TraceLink
    links: BTreeMap<LinkIndex, TraceLink>,

    /// Reverse lookup for idempotent link insertion.
    link_index: BTreeMap<TraceLink, LinkIndex>,

    /// Adjacency: node -> outgoing link indices
    outgoing: BTreeMap<EntityId, BTreeSet<LinkIndex>>,

    /// Adjacency: node -> incoming link indices
    incoming: BTreeMap<EntityId, BTreeSet<LinkIndex>>,

    next_node: u64,
    next_link: u64,
}

impl TraceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the graph contains a node.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Check if the graph contains an exact link.
    #[must_use]
    pub fn contains_link(&self, link: &TraceLink) -> bool {
        self.link_index.contains_key(link)
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.nodes.values()
    }

    /// All links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = &TraceLink> {
        self.links.values()
    }

    /// Outgoing links of `id`, in insertion order.
    pub fn outgoing(&self, id: &EntityId) -> impl Iterator<Item = &TraceLink> {
        self.adjacent(&self.outgoing, id)
    }

    /// Incoming links of `id`, in insertion order.
    pub fn incoming(&self, id: &EntityId) -> impl Iterator<Item = &TraceLink> {
        self.adjacent(&self.incoming, id)
    }

    fn adjacent<'a>(
        &'a self,
        side: &'a BTreeMap<EntityId, BTreeSet<LinkIndex>>,
        id: &EntityId,
    ) -> impl Iterator<Item = &'a TraceLink> {
        side.get(id)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|idx| self.links.get(idx))
    }

    /// Number of entities of one kind.
    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.nodes.values().filter(|e| e.kind() == kind).count()
    }

    // -------------------------------------------------------------------------
    // Typed access
    // -------------------------------------------------------------------------

    /// Lookup `id` and check that it is of `kind`.
    pub fn expect_kind(&self, id: &EntityId, kind: EntityKind) -> Result<&Entity> {
        let entity = self
            .get_node(id)
            .ok_or_else(|| FscError::UnknownEntity(id.clone()))?;
        if entity.kind() != kind {
            return Err(FscError::KindMismatch {
                id: id.clone(),
                expected: kind,
                actual: entity.kind(),
            });
        }
        Ok(entity)
    }

    pub fn goal(&self, id: &EntityId) -> Result<&SafetyGoal> {
        self.typed(id, EntityKind::SafetyGoal, Entity::as_goal)
    }

    pub fn strategy(&self, id: &EntityId) -> Result<&Strategy> {
        self.typed(id, EntityKind::Strategy, Entity::as_strategy)
    }

    pub fn fsr(&self, id: &EntityId) -> Result<&Fsr> {
        self.typed(id, EntityKind::Fsr, Entity::as_fsr)
    }

    pub fn element(&self, id: &EntityId) -> Result<&ArchitecturalElement> {
        self.typed(id, EntityKind::Element, Entity::as_element)
    }

    pub fn mechanism(&self, id: &EntityId) -> Result<&SafetyMechanism> {
        self.typed(id, EntityKind::Mechanism, Entity::as_mechanism)
    }

    pub fn decomposition(&self, id: &EntityId) -> Result<&AsilDecomposition> {
        self.typed(id, EntityKind::Decomposition, Entity::as_decomposition)
    }

    fn typed<'a, T>(
        &'a self,
        id: &EntityId,
        kind: EntityKind,
        project: fn(&'a Entity) -> Option<&'a T>,
    ) -> Result<&'a T> {
        let entity = self.expect_kind(id, kind)?;
        project(entity).ok_or_else(|| FscError::UnknownEntity(id.clone()))
    }

    pub fn goals(&self) -> impl Iterator<Item = &SafetyGoal> {
        self.nodes.values().filter_map(Entity::as_goal)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.nodes.values().filter_map(Entity::as_strategy)
    }

    pub fn fsrs(&self) -> impl Iterator<Item = &Fsr> {
        self.nodes.values().filter_map(Entity::as_fsr)
    }

    pub fn elements(&self) -> impl Iterator<Item = &ArchitecturalElement> {
        self.nodes.values().filter_map(Entity::as_element)
    }

    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.nodes.values().filter_map(Entity::as_allocation)
    }

    pub fn mechanisms(&self) -> impl Iterator<Item = &SafetyMechanism> {
        self.nodes.values().filter_map(Entity::as_mechanism)
    }

    pub fn decompositions(&self) -> impl Iterator<Item = &AsilDecomposition> {
        self.nodes.values().filter_map(Entity::as_decomposition)
    }

    pub fn criteria(&self) -> impl Iterator<Item = &ValidationCriterion> {
        self.nodes.values().filter_map(Entity::as_criterion)
    }

    /// Allocations that assign `fsr`.
    pub fn allocations_of<'a>(&'a self, fsr: &'a EntityId) -> impl Iterator<Item = &'a Allocation> {
        self.allocations().filter(move |a| &a.fsr == fsr)
    }

    /// Mechanisms that cover `fsr`.
    pub fn mechanisms_for<'a>(
        &'a self,
        fsr: &'a EntityId,
    ) -> impl Iterator<Item = &'a SafetyMechanism> {
        self.mechanisms().filter(move |m| m.covers.contains(fsr))
    }

    /// Validation criteria targeting `id`.
    pub fn criteria_for<'a>(
        &'a self,
        id: &'a EntityId,
    ) -> impl Iterator<Item = &'a ValidationCriterion> {
        self.criteria().filter(move |c| &c.target == id)
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Nodes reachable from `roots` (roots included) following links whose
    /// relation satisfies `follow`. Breadth-first, insertion order.
    pub fn reachable<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a EntityId>,
        follow: impl Fn(Relation) -> bool,
    ) -> BTreeSet<EntityId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        for root in roots {
            if self.contains(root) && visited.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(current) = queue.pop_front() {
            for link in self.outgoing(&current) {
                if follow(link.relation) && visited.insert(link.target.clone()) {
                    queue.push_back(link.target.clone());
                }
            }
        }

        visited
    }

    /// Whether `to` is reachable from `from` through derivation links.
    fn derivation_reaches(&self, from: &EntityId, to: &EntityId) -> bool {
        self.reachable([from], Relation::is_derivation).contains(to)
    }

    /// A link that closes a cycle in the derivation subgraph, if any.
    ///
    /// Iterative DFS with white/grey/black colouring, roots in insertion order.
    pub fn find_derivation_cycle(&self) -> Option<TraceLink> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Colour {
            Grey,
            Black,
        }

        let mut colour: BTreeMap<&EntityId, Colour> = BTreeMap::new();
        for root in self.nodes.values().map(Entity::id) {
            if colour.contains_key(root) {
                continue;
            }
            let mut stack: Vec<(&EntityId, Vec<&TraceLink>)> = Vec::new();
            colour.insert(root, Colour::Grey);
            stack.push((root, self.derivation_out(root)));

            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                let Some(link) = pending.pop() else {
                    colour.insert(node, Colour::Black);
                    stack.pop();
                    continue;
                };
                match colour.get(&link.target) {
                    Some(Colour::Grey) => return Some(link.clone()),
                    Some(Colour::Black) => {}
                    None => {
                        colour.insert(&link.target, Colour::Grey);
                        stack.push((&link.target, self.derivation_out(&link.target)));
                    }
                }
            }
        }
        None
    }

    /// Outgoing derivation links, reversed so `pop` yields insertion order.
    fn derivation_out(&self, id: &EntityId) -> Vec<&TraceLink> {
        let mut out: Vec<_> = self
            .outgoing(id)
            .filter(|l| l.relation.is_derivation())
            .collect();
        out.reverse();
        out
    }

    // -------------------------------------------------------------------------
    // Mutation helpers
    // -------------------------------------------------------------------------

    fn check_references(&self, entity: &Entity) -> Result<()> {
        for missing in entity.references() {
            if !self.contains(missing) {
                return Err(FscError::ReferentialIntegrity {
                    entity: entity.id().clone(),
                    missing: missing.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_link(&self, link: &TraceLink) -> Result<()> {
        for endpoint in [&link.source, &link.target] {
            if !self.contains(endpoint) {
                return Err(FscError::UnknownEntity(endpoint.clone()));
            }
        }
        if link.relation.is_derivation()
            && !self.contains_link(link)
            && (link.source == link.target || self.derivation_reaches(&link.target, &link.source))
        {
            return Err(FscError::Cycle {
                from: link.source.clone(),
                to: link.target.clone(),
                relation: link.relation,
            });
        }
        Ok(())
    }

    /// Insert a pre-validated link.
    fn insert_link(&mut self, link: TraceLink) {
        if self.link_index.contains_key(&link) {
            return;
        }
        let idx = LinkIndex(self.next_link);
        self.next_link = self.next_link.saturating_add(1);
        self.outgoing
            .entry(link.source.clone())
            .or_default()
            .insert(idx);
        self.incoming
            .entry(link.target.clone())
            .or_default()
            .insert(idx);
        self.link_index.insert(link.clone(), idx);
        self.links.insert(idx, link);
    }

    /// Insert a node without reference checks.
    fn insert_entity(&mut self, entity: Entity) -> Result<EntityId> {
        let id = entity.id().clone();
        if self.contains(&id) {
            return Err(FscError::DuplicateEntity(id));
        }
        let idx = NodeIndex(self.next_node);
        self.next_node = self.next_node.saturating_add(1);
        self.index.insert(id.clone(), idx);
        self.nodes.insert(idx, entity);
        Ok(id)
    }

    /// Replace an entity through `edit`, bumping its revision.
    ///
    /// The edit may not change the id or kind. New references must exist;
    /// links implied by them are added. Existing links are kept.
    pub fn revise<F>(&mut self, id: &EntityId, edit: F) -> Result<&Entity>
    where
        F: FnOnce(&mut Entity) -> Result<()>,
    {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| FscError::UnknownEntity(id.clone()))?;
        let current = self
            .nodes
            .get(&idx)
            .ok_or_else(|| FscError::UnknownEntity(id.clone()))?;
        let kind = current.kind();
        let mut draft = current.clone();
        edit(&mut draft)?;

        if draft.id() != id || draft.kind() != kind {
            return Err(FscError::InvalidInput(format!(
                "revision of {} may not change its id or kind",
                id
            )));
        }
        self.check_references(&draft)?;
        let new_links: Vec<_> = draft
            .implied_links()
            .into_iter()
            .filter(|l| !self.contains_link(l))
            .collect();
        for link in &new_links {
            self.check_link(link)?;
        }

        draft.bump_revision();
        for link in new_links {
            self.insert_link(link);
        }
        self.nodes.insert(idx, draft);
        self.nodes
            .get(&idx)
            .ok_or_else(|| FscError::UnknownEntity(id.clone()))
    }

    /// Rebuild a graph from exported entities and links.
    ///
    /// Entities are taken as-is; references left dangling by earlier removals
    /// survive the round trip. Links are validated.
    pub fn restore(
        entities: impl IntoIterator<Item = Entity>,
        links: impl IntoIterator<Item = TraceLink>,
    ) -> Result<Self> {
        let mut graph = Self::new();
        for entity in entities {
            graph.insert_entity(entity)?;
        }
        for link in links {
            graph.add_link(&link.source, &link.target, link.relation)?;
        }
        Ok(graph)
    }
}

impl GraphStore for TraceGraph {
    fn add_node(&mut self, entity: Entity) -> Result<EntityId> {
        if self.contains(entity.id()) {
            return Err(FscError::DuplicateEntity(entity.id().clone()));
        }
        self.check_references(&entity)?;

        // Implied links only point into the new node or out to existing
        // non-derivation targets, so they cannot close a cycle.
        let links = entity.implied_links();
        let id = self.insert_entity(entity)?;
        for link in links {
            self.insert_link(link);
        }
        Ok(id)
    }

    fn add_link(
        &mut self,
        source: &EntityId,
        target: &EntityId,
        relation: Relation,
    ) -> Result<()> {
        let link = TraceLink::new(source.clone(), target.clone(), relation);
        self.check_link(&link)?;
        self.insert_link(link);
        Ok(())
    }

    fn get_node(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).and_then(|idx| self.nodes.get(idx))
    }

    fn children(&self, id: &EntityId, relation: Relation) -> Vec<EntityId> {
        self.outgoing(id)
            .filter(|l| l.relation == relation)
            .map(|l| l.target.clone())
            .collect()
    }

    fn parents(&self, id: &EntityId, relation: Relation) -> Vec<EntityId> {
        self.incoming(id)
            .filter(|l| l.relation == relation)
            .map(|l| l.source.clone())
            .collect()
    }

    fn remove(&mut self, id: &EntityId) -> Result<Entity> {
        let idx = self
            .index
            .remove(id)
            .ok_or_else(|| FscError::UnknownEntity(id.clone()))?;
        let entity = self
            .nodes
            .remove(&idx)
            .ok_or_else(|| FscError::UnknownEntity(id.clone()))?;

        let touching: BTreeSet<LinkIndex> = self
            .outgoing
            .remove(id)
            .into_iter()
            .chain(self.incoming.remove(id))
            .flatten()
            .collect();
        for link_idx in touching {
            if let Some(link) = self.links.remove(&link_idx) {
                self.link_index.remove(&link);
                if let Some(set) = self.outgoing.get_mut(&link.source) {
                    set.remove(&link_idx);
                }
                if let Some(set) = self.incoming.get_mut(&link.target) {
                    set.remove(&link_idx);
                }
            }
        }
        Ok(entity)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn link_count(&self) -> usize {
        self.links.len()
    }

    fn acquire_read_lock(&self) -> GraphReadGuard<'_> {
        GraphReadGuard::new(self)
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Flat serializable form of the graph: entities and links in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub entities: Vec<Entity>,
    pub links: Vec<TraceLink>,
}

impl From<&TraceGraph> for SerializableGraph {
    fn from(graph: &TraceGraph) -> Self {
        Self {
            entities: graph.entities().cloned().collect(),
            links: graph.links().cloned().collect(),
        }
    }
}

impl TryFrom<SerializableGraph> for TraceGraph {
    type Error = FscError;

    fn try_from(sg: SerializableGraph) -> Result<Self> {
        TraceGraph::restore(sg.entities, sg.links)
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
    use crate::entity::HazardContext;
    use crate::types::{FsrCategory, FsrStatus, StrategyKind};

    fn goal(id: &str) -> Entity {
        Entity::SafetyGoal(SafetyGoal {
            id: EntityId::from(id),
            revision: 1,
            description: "Avoid unintended acceleration".to_string(),
            asil: Asil::D,
            safe_state: "Torque off".to_string(),
            ftti: Some("50 ms".to_string()),
            hazard: HazardContext::default(),
        })
    }

    fn strategy(id: &str, goal: &str) -> Entity {
        Entity::Strategy(Strategy {
            id: EntityId::from(id),
            revision: 1,
            goal: EntityId::from(goal),
            kind: StrategyKind::Detection,
            content: "Monitor torque request".to_string(),
        })
    }

    fn fsr(id: &str, goal: &str, strategy: Option<&str>) -> Entity {
        Entity::Fsr(Fsr {
            id: EntityId::from(id),
            revision: 1,
            goal: EntityId::from(goal),
            strategy: strategy.map(EntityId::from),
            category: FsrCategory::Detection,
            asil: Asil::D,
            safe_state: "Torque off".to_string(),
            ftti: None,
            operating_modes: Vec::new(),
            emergency_operation: None,
            functional_redundancy: false,
            requirement: "Detect implausible torque".to_string(),
            decomposition: None,
            status: FsrStatus::Active,
        })
    }

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[test]
    fn add_node_materializes_implied_links() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        graph.add_node(strategy("STR-1", "SG-001")).unwrap();
        graph.add_node(fsr("FSR-1", "SG-001", Some("STR-1"))).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.link_count(), 3);
        assert_eq!(
            graph.children(&id("SG-001"), Relation::DerivesFrom),
            vec![id("STR-1"), id("FSR-1")]
        );
        assert_eq!(
            graph.parents(&id("FSR-1"), Relation::DerivesFrom),
            vec![id("SG-001"), id("STR-1")]
        );
    }

    #[test]
    fn dangling_reference_is_rejected_without_side_effects() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();

        let err = graph.add_node(fsr("FSR-1", "SG-001", Some("STR-404")));
        assert_eq!(
            err,
            Err(FscError::ReferentialIntegrity {
                entity: id("FSR-1"),
                missing: id("STR-404"),
            })
        );
        assert_eq!(graph.node_count(), 1);
        assert!(graph.children(&id("SG-001"), Relation::DerivesFrom).is_empty());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        assert_eq!(
            graph.add_node(goal("SG-001")),
            Err(FscError::DuplicateEntity(id("SG-001")))
        );
    }

    #[test]
    fn add_link_rejects_unknown_endpoint() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        assert_eq!(
            graph.add_link(&id("SG-001"), &id("FSR-9"), Relation::DerivesFrom),
            Err(FscError::UnknownEntity(id("FSR-9")))
        );
    }

    #[test]
    fn add_link_rejects_derivation_cycle() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        graph.add_node(strategy("STR-1", "SG-001")).unwrap();
        graph.add_node(fsr("FSR-1", "SG-001", Some("STR-1"))).unwrap();

        let before = graph.link_count();
        let err = graph.add_link(&id("FSR-1"), &id("SG-001"), Relation::DerivesFrom);
        assert!(matches!(err, Err(FscError::Cycle { .. })));
        assert_eq!(graph.link_count(), before);

        let self_loop = graph.add_link(&id("FSR-1"), &id("FSR-1"), Relation::DecomposedInto);
        assert!(matches!(self_loop, Err(FscError::Cycle { .. })));
    }

    #[test]
    fn non_derivation_links_may_point_upstream() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        graph.add_node(fsr("FSR-1", "SG-001", None)).unwrap();
        graph
            .add_link(&id("FSR-1"), &id("SG-001"), Relation::ValidatedBy)
            .unwrap();
        assert!(graph.find_derivation_cycle().is_none());
    }

    #[test]
    fn duplicate_link_is_idempotent() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        graph.add_node(fsr("FSR-1", "SG-001", None)).unwrap();
        let before = graph.link_count();
        graph
            .add_link(&id("SG-001"), &id("FSR-1"), Relation::DerivesFrom)
            .unwrap();
        assert_eq!(graph.link_count(), before);
    }

    #[test]
    fn remove_cascades_links_but_keeps_descendants() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        graph.add_node(strategy("STR-1", "SG-001")).unwrap();
        graph.add_node(fsr("FSR-1", "SG-001", Some("STR-1"))).unwrap();

        graph.remove(&id("STR-1")).unwrap();

        assert!(graph.get_node(&id("FSR-1")).is_some());
        assert_eq!(graph.link_count(), 1);
        assert_eq!(
            graph.parents(&id("FSR-1"), Relation::DerivesFrom),
            vec![id("SG-001")]
        );
        assert_eq!(
            graph.remove(&id("STR-1")),
            Err(FscError::UnknownEntity(id("STR-1")))
        );
    }

    #[test]
    fn revise_bumps_revision_and_keeps_identity() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();

        let revised = graph
            .revise(&id("SG-001"), |entity| {
                if let Entity::SafetyGoal(g) = entity {
                    g.description = "Avoid loss of braking".to_string();
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(revised.revision(), 2);

        let renamed = graph.revise(&id("SG-001"), |entity| {
            if let Entity::SafetyGoal(g) = entity {
                g.id = id("SG-999");
            }
            Ok(())
        });
        assert!(matches!(renamed, Err(FscError::InvalidInput(_))));
        assert_eq!(graph.goal(&id("SG-001")).unwrap().revision, 2);
    }

    #[test]
    fn typed_lookup_reports_kind_mismatch() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        assert_eq!(
            graph.fsr(&id("SG-001")).err(),
            Some(FscError::KindMismatch {
                id: id("SG-001"),
                expected: EntityKind::Fsr,
                actual: EntityKind::SafetyGoal,
            })
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        graph.add_node(strategy("STR-1", "SG-001")).unwrap();
        graph.add_node(fsr("FSR-1", "SG-001", Some("STR-1"))).unwrap();

        let serializable = SerializableGraph::from(&graph);
        let restored = TraceGraph::try_from(serializable.clone()).unwrap();

        assert_eq!(SerializableGraph::from(&restored), serializable);
        assert_eq!(
            restored.children(&id("SG-001"), Relation::DerivesFrom),
            graph.children(&id("SG-001"), Relation::DerivesFrom)
        );
    }

    #[test]
    fn read_guard_reports_counts() {
        let mut graph = TraceGraph::new();
        graph.add_node(goal("SG-001")).unwrap();
        let guard = graph.acquire_read_lock();
        assert_eq!(guard.node_count(), 1);
        assert_eq!(guard.link_count(), 0);
        assert!(guard.graph().contains(&id("SG-001")));
    }
}
