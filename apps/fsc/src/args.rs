//! Command-line arguments.

use crate::storage::Backend;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fsc_core::{
    Asil, Coverage, ElementKind, EntityId, FsrCategory, MechanismCategory, Stage, StrategyKind,
    ValidationLevel,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fsc", version, about = "Functional Safety Concept authoring (ISO 26262-3)")]
pub struct Cli {
    /// Session database path
    #[arg(long, global = true, default_value = "fsc.db")]
    pub db: PathBuf,

    /// Storage backend: file or redb
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Minimum aggregated coverage for ASIL D requirements (e.g. 99%)
    #[arg(long, global = true)]
    pub asil_d_threshold: Option<Coverage>,

    /// Minimum aggregated coverage for ASIL C requirements (e.g. 90%)
    #[arg(long, global = true)]
    pub asil_c_threshold: Option<Coverage>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new, empty session
    Init {
        /// Item or system name
        #[arg(long)]
        name: Option<String>,
        /// Overwrite an existing session
        #[arg(long)]
        force: bool,
    },
    /// Safety goals
    #[command(subcommand)]
    Goal(GoalCommand),
    /// Functional safety strategies
    #[command(subcommand)]
    Strategy(StrategyCommand),
    /// Functional safety requirements
    #[command(subcommand)]
    Fsr(FsrCommand),
    /// Architectural elements
    #[command(subcommand)]
    Element(ElementCommand),
    /// Allocate an FSR to architectural elements
    Allocate(AllocateArgs),
    /// Safety mechanisms
    #[command(subcommand)]
    Mechanism(MechanismCommand),
    /// ASIL decomposition
    #[command(subcommand)]
    Decompose(DecomposeCommand),
    /// Validation criteria
    #[command(subcommand)]
    Validation(ValidationCommand),
    /// Remove an entity and its links
    Remove {
        id: EntityId,
    },
    /// Workflow stage
    #[command(subcommand)]
    Stage(StageCommand),
    /// Run completeness and coverage verification
    Verify,
    /// Show session summary
    Status,
    /// Show the trace path of an entity, or the full matrix
    Trace {
        id: Option<EntityId>,
    },
    /// Export the session
    Export {
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
    /// Import a session export into the database
    Import {
        input: PathBuf,
        /// Overwrite an existing session
        #[arg(long)]
        force: bool,
    },
    /// Generate the FSC document (requires the Verified stage)
    Document {
        /// Output file; stdout if omitted
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Binary,
}

#[derive(Debug, Subcommand)]
pub enum GoalCommand {
    /// Add one safety goal
    Add {
        description: String,
        #[arg(long)]
        asil: Asil,
        #[arg(long)]
        safe_state: Option<String>,
        #[arg(long)]
        ftti: Option<String>,
        #[arg(long)]
        hazard: Option<String>,
    },
    /// Load goal records from a HARA JSON export
    Load {
        file: PathBuf,
        /// Also load QM goals
        #[arg(long)]
        include_qm: bool,
    },
    /// Replace goal fields
    Refine {
        id: EntityId,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        safe_state: Option<String>,
        #[arg(long)]
        ftti: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum StrategyCommand {
    /// Add a strategy; text is generated when --content is omitted
    Add {
        goal: EntityId,
        #[arg(long)]
        kind: StrategyKind,
        #[arg(long)]
        content: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum FsrCommand {
    /// Add an FSR; text is generated when --requirement is omitted
    Add(FsrAddArgs),
    /// Replace FSR fields
    Refine {
        id: EntityId,
        #[arg(long)]
        requirement: Option<String>,
        #[arg(long)]
        safe_state: Option<String>,
        #[arg(long)]
        ftti: Option<String>,
        /// Operating mode (repeatable; replaces the list)
        #[arg(long = "mode")]
        modes: Vec<String>,
        #[arg(long)]
        emergency_operation: Option<String>,
        #[arg(long)]
        redundant: Option<bool>,
    },
}

#[derive(Debug, Args)]
pub struct FsrAddArgs {
    pub goal: EntityId,
    #[arg(long)]
    pub strategy: Option<EntityId>,
    #[arg(long)]
    pub category: Option<FsrCategory>,
    #[arg(long)]
    pub requirement: Option<String>,
    #[arg(long)]
    pub safe_state: Option<String>,
    #[arg(long)]
    pub ftti: Option<String>,
    #[arg(long = "mode")]
    pub modes: Vec<String>,
    #[arg(long)]
    pub emergency_operation: Option<String>,
    #[arg(long)]
    pub redundant: bool,
}

#[derive(Debug, Subcommand)]
pub enum ElementCommand {
    Add {
        name: String,
        #[arg(long)]
        kind: ElementKind,
        /// Highest ASIL the element is developed to
        #[arg(long, default_value = "QM")]
        max_asil: Asil,
    },
}

#[derive(Debug, Args)]
pub struct AllocateArgs {
    pub fsr: EntityId,
    #[arg(long = "element", required = true)]
    pub elements: Vec<EntityId>,
    #[arg(long)]
    pub interface: String,
    /// Freedom-from-interference rationale
    #[arg(long, default_value = "")]
    pub ffi: String,
}

#[derive(Debug, Subcommand)]
pub enum MechanismCommand {
    Add {
        name: String,
        #[arg(long)]
        category: MechanismCategory,
        #[arg(long)]
        coverage: Coverage,
        #[arg(long)]
        independent: bool,
        /// FSR covered (repeatable)
        #[arg(long = "covers", required = true)]
        covers: Vec<EntityId>,
    },
    /// Extend a mechanism to cover more FSRs
    Cover {
        id: EntityId,
        #[arg(long = "fsr", required = true)]
        fsrs: Vec<EntityId>,
    },
}

#[derive(Debug, Subcommand)]
pub enum DecomposeCommand {
    /// Propose a decomposition of an FSR or goal, e.g. --pattern "B(D)+B(D)"
    Propose {
        parent: EntityId,
        #[arg(long)]
        pattern: String,
        #[arg(long)]
        justification: String,
    },
    /// Apply a proposal, creating one child FSR per --child
    Apply {
        id: EntityId,
        #[arg(long = "child", required = true)]
        children: Vec<String>,
        /// Category per child, in order (defaults to the parent FSR's)
        #[arg(long = "category")]
        categories: Vec<FsrCategory>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ValidationCommand {
    Add {
        target: EntityId,
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "")]
        environment: String,
        #[arg(long = "pass")]
        pass_criteria: String,
        #[arg(long, default_value = "system")]
        level: ValidationLevel,
    },
}

#[derive(Debug, Subcommand)]
pub enum StageCommand {
    /// Show where the workflow stands
    Show {
        #[arg(long)]
        detailed: bool,
    },
    /// Advance to the next stage
    Advance,
    /// Move to a stage (backward freely, forward one step)
    Set { stage: Stage },
}
