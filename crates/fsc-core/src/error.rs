//! Error types for the FSC engine.
//!
//! Structural failures are errors; compliance findings are not. An ASIL
//! mismatch, a missing allocation or a coverage shortfall is reported as a
//! [`Violation`](crate::report::Violation) instead.

use crate::asil::Asil;
use crate::system::Stage;
use crate::types::{EntityId, EntityKind, Relation};
use thiserror::Error;

/// Errors raised by engine operations.
///
/// Every error leaves the graph exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FscError {
    /// The entity declares a reference to an id that is not in the store.
    #[error("{entity} references unknown {missing}")]
    ReferentialIntegrity { entity: EntityId, missing: EntityId },

    /// An operation named an id that is not in the store.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// The entity id is already taken.
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),

    /// Adding the link would close a cycle in the derivation relation.
    #[error("link {from} -[{relation}]-> {to} would create a cycle")]
    Cycle {
        from: EntityId,
        to: EntityId,
        relation: Relation,
    },

    /// The identifier allocator was given a scope that does not exist.
    #[error("cannot allocate id in unknown scope {0}")]
    Allocation(EntityId),

    /// The pattern is not in the decomposition table for the target level.
    #[error("decomposition {pattern} is not defined for {target}")]
    InvalidDecomposition { target: Asil, pattern: String },

    /// A stage transition or gated operation was requested before its
    /// prerequisite holds. `target` is the stage that was required.
    #[error("{target} precondition not met: {requirement}{}", format_entities(.entities))]
    StagePrecondition {
        target: Stage,
        requirement: String,
        entities: Vec<EntityId>,
    },

    /// The id names an entity of a different kind than the operation needs.
    #[error("{id} is a {actual}, expected {expected}")]
    KindMismatch {
        id: EntityId,
        expected: EntityKind,
        actual: EntityKind,
    },

    /// Caller input failed a presence or range check.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot encoding or decoding failed.
    #[error("snapshot format error: {0}")]
    Format(String),
}

fn format_entities(entities: &[EntityId]) -> String {
    if entities.is_empty() {
        String::new()
    } else {
        let ids: Vec<_> = entities.iter().map(EntityId::as_str).collect();
        format!(" (missing for {})", ids.join(", "))
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, FscError>;
