//! # System Module
//!
//! Workflow stage control and stage assessment.
//!
//! The controller is pure: it reads the graph and the verifier, and keeps
//! only the stage high-water mark as state.

mod stage;

pub use stage::*;
