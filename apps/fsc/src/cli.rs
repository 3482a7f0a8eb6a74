//! # CLI Commands
//!
//! Each command loads the session, applies one engine operation, persists
//! the result and prints either human-readable text or JSON.
//!
//! Functions return their primary result so tests can drive them directly.

use crate::args::{
    AllocateArgs, DecomposeCommand, ElementCommand, ExportFormat, FsrAddArgs, FsrCommand,
    GoalCommand, MechanismCommand, StageCommand, StrategyCommand, ValidationCommand,
};
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::hara;
use crate::render::MarkdownRenderer;
use crate::storage::{self, Backend};
use crate::textgen::TemplateGenerator;
use fsc_core::primitives::SNAPSHOT_MAGIC;
use fsc_core::{
    AllocationInput, ComplianceReport, Compositor, DecompositionChild, DecompositionPattern,
    EntityId, EntityKind, FsrInput, FsrRefinement, GoalInput, GoalRefinement, GraphStore,
    HazardContext, MechanismInput, Session, Snapshot, Stage, StageAssessment, ValidationInput,
    decode_snapshot, encode_snapshot,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// =============================================================================
// CONTEXT
// =============================================================================

/// Where the session lives and how to talk about it.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub db: PathBuf,
    pub config: AppConfig,
    pub json: bool,
}

impl CliContext {
    pub fn new(db: impl Into<PathBuf>, config: AppConfig, json: bool) -> Self {
        Self {
            db: db.into(),
            config,
            json,
        }
    }

    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    fn load(&self) -> CliResult<Session> {
        let mut session = load_or_create_session(&self.db, self.backend())?;
        if self.config.thresholds_set {
            session.set_verifier_config(self.config.verifier);
        }
        Ok(session)
    }

    fn save(&self, session: &Session) -> CliResult<()> {
        save_session(session, &self.db, self.backend())
    }

    /// Print `value` as JSON, or `text` otherwise.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> CliResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    /// Load, apply `op`, save. Rejected operations leave the store untouched.
    fn mutate<T>(
        &self,
        operation: &str,
        op: impl FnOnce(&mut Session) -> fsc_core::Result<T>,
    ) -> CliResult<T> {
        let mut session = self.load()?;
        match op(&mut session) {
            Ok(value) => {
                self.save(&session)?;
                info!(operation, stage = %session.stage(), "applied");
                Ok(value)
            }
            Err(e) => {
                warn!(operation, error = %e, "rejected");
                Err(e.into())
            }
        }
    }

    fn created(&self, id: &EntityId) -> CliResult<()> {
        self.emit(&serde_json::json!({ "id": id }), || format!("Created {}", id))
    }
}

// =============================================================================
// SESSION I/O
// =============================================================================

/// Load the stored session, or start a new one if nothing is stored.
pub fn load_or_create_session(path: &Path, backend: Backend) -> CliResult<Session> {
    match storage::load(path, backend)? {
        Some(session) => Ok(session),
        None => {
            info!(path = %path.display(), "no stored session, starting a new one");
            Ok(Session::new(default_name(path)))
        }
    }
}

pub fn save_session(session: &Session, path: &Path, backend: Backend) -> CliResult<()> {
    storage::save(path, backend, session)
}

fn default_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("FSC")
        .to_string()
}

// =============================================================================
// COMMANDS
// =============================================================================

pub fn cmd_init(ctx: &CliContext, name: Option<&str>, force: bool) -> CliResult<()> {
    if ctx.db.exists() && !force {
        return Err(CliError::usage(format!(
            "{} already exists (use --force to overwrite)",
            ctx.db.display()
        )));
    }
    let fallback = name.map_or_else(|| default_name(&ctx.db), str::to_string);
    let mut config = ctx.config.session_config(&fallback);
    if let Some(name) = name {
        config.system_name = name.to_string();
    }
    let session = Session::with_config(config);
    storage::create(&ctx.db, ctx.backend(), &session)?;
    info!(path = %ctx.db.display(), backend = %ctx.backend(), "initialized session");
    ctx.emit(
        &serde_json::json!({ "system": session.config().system_name, "db": ctx.db }),
        || {
            format!(
                "Initialized FSC session '{}' at {}",
                session.config().system_name,
                ctx.db.display()
            )
        },
    )
}

pub fn cmd_goal(ctx: &CliContext, command: GoalCommand) -> CliResult<Vec<EntityId>> {
    match command {
        GoalCommand::Add {
            description,
            asil,
            safe_state,
            ftti,
            hazard,
        } => {
            let input = GoalInput {
                description,
                asil,
                safe_state: safe_state
                    .unwrap_or_else(|| hara::SAFE_STATE_PLACEHOLDER.to_string()),
                ftti,
                hazard: HazardContext {
                    hazardous_event: hazard,
                    ..HazardContext::default()
                },
            };
            let id = ctx.mutate("add goal", |s| s.add_goal(input))?;
            ctx.created(&id)?;
            Ok(vec![id])
        }
        GoalCommand::Load { file, include_qm } => {
            let text = std::fs::read_to_string(&file)?;
            let import = hara::parse_goal_records(&text, include_qm)?;
            for skipped in &import.skipped {
                warn!(row = skipped.row, reason = %skipped.reason, "skipped HARA row");
            }
            let ids = ctx.mutate("load goals", |s| {
                import
                    .goals
                    .iter()
                    .cloned()
                    .map(|goal| s.add_goal(goal))
                    .collect::<fsc_core::Result<Vec<_>>>()
            })?;
            ctx.emit(
                &serde_json::json!({ "loaded": ids, "skipped": import.skipped.len() }),
                || {
                    format!(
                        "Loaded {} safety goals ({} rows skipped)",
                        ids.len(),
                        import.skipped.len()
                    )
                },
            )?;
            Ok(ids)
        }
        GoalCommand::Refine {
            id,
            description,
            safe_state,
            ftti,
        } => {
            let refinement = GoalRefinement {
                description,
                safe_state,
                ftti,
            };
            ctx.mutate("refine goal", |s| s.refine_goal(&id, refinement))?;
            ctx.emit(&serde_json::json!({ "refined": id }), || format!("Refined {}", id))?;
            Ok(vec![id])
        }
    }
}

pub fn cmd_strategy(ctx: &CliContext, command: StrategyCommand) -> CliResult<EntityId> {
    let StrategyCommand::Add {
        goal,
        kind,
        content,
    } = command;
    let id = ctx.mutate("add strategy", |s| match content {
        Some(content) => s.add_strategy(&goal, kind, &content),
        None => s.derive_strategy(&goal, kind, &TemplateGenerator),
    })?;
    ctx.created(&id)?;
    Ok(id)
}

pub fn cmd_fsr(ctx: &CliContext, command: FsrCommand) -> CliResult<EntityId> {
    match command {
        FsrCommand::Add(FsrAddArgs {
            goal,
            strategy,
            category,
            requirement,
            safe_state,
            ftti,
            modes,
            emergency_operation,
            redundant,
        }) => {
            let id = ctx.mutate("add FSR", |s| {
                let id = match requirement {
                    Some(requirement) => s.add_fsr(FsrInput {
                        goal,
                        strategy,
                        category,
                        requirement,
                        safe_state,
                        ftti,
                        operating_modes: modes,
                        emergency_operation,
                        functional_redundancy: redundant,
                    })?,
                    None => {
                        let id =
                            s.derive_fsr(&goal, strategy.as_ref(), category, &TemplateGenerator)?;
                        s.refine_fsr(
                            &id,
                            FsrRefinement {
                                safe_state,
                                ftti,
                                operating_modes: (!modes.is_empty()).then_some(modes),
                                emergency_operation,
                                functional_redundancy: redundant.then_some(true),
                                ..FsrRefinement::default()
                            },
                        )?;
                        id
                    }
                };
                Ok(id)
            })?;
            ctx.created(&id)?;
            Ok(id)
        }
        FsrCommand::Refine {
            id,
            requirement,
            safe_state,
            ftti,
            modes,
            emergency_operation,
            redundant,
        } => {
            let refinement = FsrRefinement {
                requirement,
                safe_state,
                ftti,
                operating_modes: (!modes.is_empty()).then_some(modes),
                emergency_operation,
                functional_redundancy: redundant,
            };
            ctx.mutate("refine FSR", |s| s.refine_fsr(&id, refinement))?;
            ctx.emit(&serde_json::json!({ "refined": id }), || format!("Refined {}", id))?;
            Ok(id)
        }
    }
}

pub fn cmd_element(ctx: &CliContext, command: ElementCommand) -> CliResult<EntityId> {
    let ElementCommand::Add {
        name,
        kind,
        max_asil,
    } = command;
    let id = ctx.mutate("add element", |s| s.add_element(&name, kind, max_asil))?;
    ctx.created(&id)?;
    Ok(id)
}

pub fn cmd_allocate(ctx: &CliContext, args: AllocateArgs) -> CliResult<EntityId> {
    let input = AllocationInput {
        fsr: args.fsr,
        elements: args.elements,
        interface: args.interface,
        ffi_rationale: args.ffi,
    };
    let id = ctx.mutate("allocate FSR", |s| s.allocate(input))?;
    ctx.created(&id)?;
    Ok(id)
}

pub fn cmd_mechanism(ctx: &CliContext, command: MechanismCommand) -> CliResult<EntityId> {
    match command {
        MechanismCommand::Add {
            name,
            category,
            coverage,
            independent,
            covers,
        } => {
            let input = MechanismInput {
                name,
                category,
                coverage,
                independent,
                covers,
            };
            let id = ctx.mutate("add mechanism", |s| s.add_mechanism(input))?;
            ctx.created(&id)?;
            Ok(id)
        }
        MechanismCommand::Cover { id, fsrs } => {
            ctx.mutate("extend coverage", |s| s.extend_coverage(&id, &fsrs))?;
            ctx.emit(&serde_json::json!({ "mechanism": id, "added": fsrs }), || {
                format!("{} now also covers {}", id, join(&fsrs))
            })?;
            Ok(id)
        }
    }
}

pub fn cmd_decompose(ctx: &CliContext, command: DecomposeCommand) -> CliResult<Vec<EntityId>> {
    match command {
        DecomposeCommand::Propose {
            parent,
            pattern,
            justification,
        } => {
            let pattern: DecompositionPattern = pattern.parse()?;
            let id = ctx.mutate("propose decomposition", |s| {
                s.propose_decomposition(&parent, pattern, &justification)
            })?;
            ctx.created(&id)?;
            Ok(vec![id])
        }
        DecomposeCommand::Apply {
            id,
            children,
            categories,
        } => {
            let children: Vec<_> = children
                .into_iter()
                .enumerate()
                .map(|(i, requirement)| DecompositionChild {
                    requirement,
                    category: categories.get(i).copied(),
                })
                .collect();
            let created = ctx.mutate("apply decomposition", |s| {
                s.apply_decomposition(&id, children)
            })?;
            ctx.emit(&serde_json::json!({ "decomposition": id, "children": created }), || {
                format!("Applied {}: created {}", id, join(&created))
            })?;
            Ok(created)
        }
    }
}

pub fn cmd_validation(ctx: &CliContext, command: ValidationCommand) -> CliResult<EntityId> {
    let ValidationCommand::Add {
        target,
        method,
        environment,
        pass_criteria,
        level,
    } = command;
    let input = ValidationInput {
        target,
        method,
        environment,
        pass_criteria,
        level,
    };
    let id = ctx.mutate("add validation criterion", |s| s.add_validation(input))?;
    ctx.created(&id)?;
    Ok(id)
}

pub fn cmd_remove(ctx: &CliContext, id: &EntityId) -> CliResult<()> {
    let removed = ctx.mutate("remove", |s| s.remove(id))?;
    ctx.emit(&serde_json::json!({ "removed": id, "kind": removed.kind() }), || {
        format!("Removed {} {}", removed.kind(), id)
    })
}

pub fn cmd_stage(ctx: &CliContext, command: StageCommand) -> CliResult<StageAssessment> {
    match command {
        StageCommand::Show { detailed } => {
            let assessment = ctx.load()?.assess();
            ctx.emit(&assessment, || stage_text(&assessment, detailed))?;
            Ok(assessment)
        }
        StageCommand::Advance => {
            let stage = ctx.mutate("advance stage", |s| s.advance())?;
            report_stage(ctx, stage)
        }
        StageCommand::Set { stage } => {
            let stage = ctx.mutate("transition", |s| s.transition(stage))?;
            report_stage(ctx, stage)
        }
    }
}

fn report_stage(ctx: &CliContext, stage: Stage) -> CliResult<StageAssessment> {
    let assessment = ctx.load()?.assess();
    ctx.emit(&assessment, || format!("Stage: {}", stage))?;
    Ok(assessment)
}

fn stage_text(assessment: &StageAssessment, detailed: bool) -> String {
    let mut out = format!("Stage: {}", assessment.reached);
    match (assessment.next, &assessment.blocker) {
        (Some(next), Some(blocker)) => {
            out.push_str(&format!("\nNext: {} (blocked: {})", next, blocker));
            if !assessment.blocking_entities.is_empty() {
                out.push_str(&format!("\nBlocking: {}", join(&assessment.blocking_entities)));
            }
        }
        (Some(next), None) => out.push_str(&format!("\nNext: {} (ready)", next)),
        (None, _) => out.push_str("\nWorkflow complete"),
    }
    if detailed {
        out.push_str(&format!("\nAttainable: {}", assessment.attainable));
        for (kind, count) in &assessment.entity_counts {
            out.push_str(&format!("\n  {:<24} {}", kind.to_string(), count));
        }
        out.push_str(&format!("\n  {:<24} {}", "total", assessment.node_total()));
    }
    out
}

pub fn cmd_verify(ctx: &CliContext) -> CliResult<ComplianceReport> {
    let report = ctx.load()?.verify();
    info!(
        passed = report.passed,
        violations = report.violations.len(),
        "verification finished"
    );
    ctx.emit(&report, || report.to_text())?;
    Ok(report)
}

#[derive(Debug, Serialize)]
struct Status {
    system: String,
    stage: Stage,
    entities: Vec<(EntityKind, usize)>,
    links: usize,
    passed: bool,
    violations: usize,
}

pub fn cmd_status(ctx: &CliContext) -> CliResult<()> {
    let session = ctx.load()?;
    let report = session.verify();
    let status = Status {
        system: session.config().system_name.clone(),
        stage: session.stage(),
        entities: EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, session.graph().count_of(kind)))
            .collect(),
        links: session.graph().link_count(),
        passed: report.passed,
        violations: report.violations.len(),
    };
    ctx.emit(&status, || {
        let mut out = format!(
            "System: {}\nStage: {}\nLinks: {}\nCompliance: {} ({} violations)",
            status.system,
            status.stage,
            status.links,
            if status.passed { "passed" } else { "failed" },
            status.violations
        );
        for (kind, count) in &status.entities {
            out.push_str(&format!("\n  {:<24} {}", kind.to_string(), count));
        }
        out
    })
}

pub fn cmd_trace(ctx: &CliContext, id: Option<&EntityId>) -> CliResult<()> {
    let session = ctx.load()?;
    match id {
        Some(id) => {
            let path = Compositor::trace_path(session.graph(), id)
                .ok_or_else(|| fsc_core::FscError::UnknownEntity(id.clone()))?;
            ctx.emit(&path, || {
                path.iter()
                    .map(EntityId::as_str)
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
        }
        None => {
            let matrix = Compositor::trace_matrix(session.graph());
            ctx.emit(&matrix, || {
                matrix
                    .iter()
                    .map(|row| {
                        format!(
                            "{} -> {} ({}) -> [{}] -> mechanisms [{}] -> criteria [{}]",
                            row.goal,
                            row.fsr,
                            row.asil,
                            join(&row.elements),
                            join(&row.mechanisms),
                            join(&row.criteria)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

pub fn cmd_export(ctx: &CliContext, output: &Path, format: ExportFormat) -> CliResult<()> {
    let snapshot = ctx.load()?.export_snapshot();
    match format {
        ExportFormat::Json => std::fs::write(output, serde_json::to_vec_pretty(&snapshot)?)?,
        ExportFormat::Binary => std::fs::write(output, encode_snapshot(&snapshot)?)?,
    }
    info!(path = %output.display(), entities = snapshot.entity_count(), "exported session");
    ctx.emit(
        &serde_json::json!({ "exported": output, "entities": snapshot.entity_count() }),
        || format!("Exported {} entities to {}", snapshot.entity_count(), output.display()),
    )
}

pub fn cmd_import(ctx: &CliContext, input: &Path, force: bool) -> CliResult<()> {
    if ctx.db.exists() && !force {
        return Err(CliError::usage(format!(
            "{} already exists (use --force to overwrite)",
            ctx.db.display()
        )));
    }
    let bytes = std::fs::read(input)?;
    let snapshot: Snapshot = if bytes.starts_with(&SNAPSHOT_MAGIC) {
        decode_snapshot(&bytes)?
    } else {
        serde_json::from_slice(&bytes)?
    };
    let session = Session::from_snapshot(&snapshot)?;
    storage::create(&ctx.db, ctx.backend(), &session)?;
    info!(path = %input.display(), entities = snapshot.entity_count(), "imported session");
    ctx.emit(
        &serde_json::json!({ "imported": snapshot.entity_count(), "stage": session.stage() }),
        || {
            format!(
                "Imported {} entities at stage {}",
                snapshot.entity_count(),
                session.stage()
            )
        },
    )
}

pub fn cmd_document(ctx: &CliContext, output: Option<&Path>) -> CliResult<String> {
    let document = ctx.mutate("generate document", |s| {
        s.generate_document(&MarkdownRenderer)
    })?;
    match output {
        Some(path) => {
            std::fs::write(path, &document)?;
            ctx.emit(&serde_json::json!({ "document": path }), || {
                format!("Wrote FSC document to {}", path.display())
            })?;
        }
        None => print!("{}", document),
    }
    Ok(document)
}

fn join(ids: &[EntityId]) -> String {
    ids.iter()
        .map(EntityId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
