//! # Collaborator Interfaces
//!
//! Traits for the external collaborators the engine hands work to.
//!
//! The engine treats generated text as opaque: it checks presence only.
//! Implementations live outside the core (the CLI ships a deterministic
//! template generator and a Markdown renderer).

use crate::compositor::PromptContext;
use crate::error::Result;
use crate::formats::Snapshot;
use crate::types::StrategyKind;

/// Produces strategy and requirement prose from a structured context.
pub trait TextGenerator {
    /// Prose for a strategy of `kind` under the context's goal.
    fn strategy_text(&self, context: &PromptContext, kind: StrategyKind) -> Result<String>;

    /// Requirement body for an FSR under the context's goal and strategy.
    fn requirement_text(&self, context: &PromptContext) -> Result<String>;
}

/// Turns a read-only snapshot (entities, links, report) into an artifact.
pub trait DocumentRenderer {
    type Output;

    fn render(&self, snapshot: &Snapshot) -> Result<Self::Output>;
}
