//! # FSC Core
//!
//! Deterministic traceability graph and ASIL compliance engine for
//! Functional Safety Concepts (ISO 26262 Part 3).
//!
//! A session holds safety goals, strategies, functional safety requirements,
//! architectural elements, allocations, safety mechanisms, ASIL
//! decompositions and validation criteria, linked by typed trace links.
//! The engine allocates ids, enforces referential integrity and acyclicity,
//! applies the ASIL algebra, verifies completeness and coverage, and gates
//! the authoring workflow by stage.
//!
//! Prose (strategy text, requirement bodies) is opaque content supplied by
//! the caller. No I/O happens here.

pub mod asil;
pub mod collab;
pub mod compositor;
pub mod entity;
pub mod error;
pub mod formats;
pub mod graph;
pub mod ids;
pub mod primitives;
pub mod registry;
pub mod report;
pub mod session;
pub mod system;
pub mod types;
pub mod verify;

pub use asil::{
    Asil, Coverage, CoverageThresholds, DecompositionPattern, aggregate_coverage,
    apply_decomposition, inherit, valid_decompositions,
};
pub use collab::{DocumentRenderer, TextGenerator};
pub use compositor::{Compositor, PromptContext, StrategyContext, TraceRow};
pub use entity::{
    Allocation, ArchitecturalElement, AsilDecomposition, DecomposedPart, Entity, Fsr,
    HazardContext, SafetyGoal, SafetyMechanism, Strategy, ValidationCriterion, is_placeholder,
};
pub use error::{FscError, Result};
pub use formats::{Snapshot, decode_snapshot, encode_snapshot};
pub use graph::{GraphReadGuard, GraphStore, SerializableGraph, TraceGraph};
pub use ids::{IdAllocator, IdCounter};
pub use registry::{SessionRegistry, SharedSession};
pub use report::{
    Advisory, AdvisoryKind, ComplianceReport, ReportStatistics, Violation, ViolationKind,
};
pub use session::{
    AllocationInput, DecompositionChild, FsrInput, FsrRefinement, GoalInput, GoalRefinement,
    MechanismInput, Session, SessionConfig, ValidationInput,
};
pub use system::{Stage, StageAssessment, Workflow};
pub use types::{
    DecompositionStatus, ElementKind, EntityId, EntityKind, FsrCategory, FsrStatus,
    MechanismCategory, Relation, StrategyKind, TraceLink, ValidationLevel,
};
pub use verify::{VerifierConfig, verify, verify_with};
