//! # Identifier Allocator
//!
//! Collision-free, human-readable ids of the form
//! `<PREFIX>[-<scope>][-<CATEGORY>]-<sequence>`, e.g. `FSR-SG003-DET-1`.
//!
//! Sequences are kept per `(kind, scope, category)` triple, start at 1 and
//! only ever advance, so ids of removed entities are never handed out again.
//! Root ids with neither scope nor category are zero-padded (`SG-001`).

use crate::error::{FscError, Result};
use crate::graph::TraceGraph;
use crate::primitives::ROOT_SEQUENCE_WIDTH;
use crate::types::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type CounterKey = (EntityKind, String, String);

/// Serializable counter state for one `(kind, scope, category)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounter {
    pub kind: EntityKind,
    pub scope: String,
    pub category: String,
    /// Last sequence number handed out.
    pub last: u64,
}

/// Per-session id allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    counters: BTreeMap<CounterKey, u64>,
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id for `kind` under `scope` and `category`.
    ///
    /// `scope` must name an entity already in `graph`. Ids already present in
    /// the graph (e.g. imported under a hand-written id) are skipped.
    pub fn next_id(
        &mut self,
        graph: &TraceGraph,
        kind: EntityKind,
        scope: Option<&EntityId>,
        category: Option<&str>,
    ) -> Result<EntityId> {
        if let Some(scope) = scope {
            if !graph.contains(scope) {
                return Err(FscError::Allocation(scope.clone()));
            }
        }

        let scope = scope.map(EntityId::compact).unwrap_or_default();
        let category = category.map(str::to_ascii_uppercase).unwrap_or_default();
        let counter = self
            .counters
            .entry((kind, scope.clone(), category.clone()))
            .or_insert(0);

        loop {
            *counter = counter.saturating_add(1);
            let id = format_id(kind, &scope, &category, *counter);
            if !graph.contains(&id) {
                return Ok(id);
            }
        }
    }

    /// Last sequence handed out for a triple, 0 if none.
    pub fn last(&self, kind: EntityKind, scope: &str, category: &str) -> u64 {
        self.counters
            .get(&(kind, scope.to_string(), category.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Counter state in deterministic order.
    pub fn counters(&self) -> Vec<IdCounter> {
        self.counters
            .iter()
            .map(|((kind, scope, category), last)| IdCounter {
                kind: *kind,
                scope: scope.clone(),
                category: category.clone(),
                last: *last,
            })
            .collect()
    }

    pub fn from_counters(counters: impl IntoIterator<Item = IdCounter>) -> Self {
        Self {
            counters: counters
                .into_iter()
                .map(|c| ((c.kind, c.scope, c.category), c.last))
                .collect(),
        }
    }
}

fn format_id(kind: EntityKind, scope: &str, category: &str, sequence: u64) -> EntityId {
    let mut id = kind.prefix().to_string();
    for segment in [scope, category] {
        if !segment.is_empty() {
            id.push('-');
            id.push_str(segment);
        }
    }
    if scope.is_empty() && category.is_empty() {
        id.push_str(&format!("-{:0width$}", sequence, width = ROOT_SEQUENCE_WIDTH));
    } else {
        id.push_str(&format!("-{}", sequence));
    }
    EntityId::new(id)
}
