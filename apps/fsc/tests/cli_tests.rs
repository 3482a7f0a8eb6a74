//! Integration tests for FSC CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use fsc::args::{
    AllocateArgs, DecomposeCommand, ElementCommand, ExportFormat, FsrAddArgs, FsrCommand,
    GoalCommand, MechanismCommand, StageCommand, StrategyCommand, ValidationCommand,
};
use fsc::cli::{
    CliContext, cmd_allocate, cmd_decompose, cmd_document, cmd_element, cmd_export, cmd_fsr,
    cmd_goal, cmd_import, cmd_init, cmd_mechanism, cmd_remove, cmd_stage, cmd_status,
    cmd_strategy, cmd_trace, cmd_validation, cmd_verify, load_or_create_session, save_session,
};
use fsc::config::AppConfig;
use fsc::storage::Backend;
use fsc_core::{
    Asil, Coverage, ElementKind, EntityId, MechanismCategory, Session, Snapshot, Stage,
    StrategyKind, ValidationLevel,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn context(db: &Path, backend: Backend, json: bool) -> CliContext {
    let config = AppConfig {
        backend,
        ..AppConfig::default()
    };
    CliContext::new(db, config, json)
}

/// Create a sample HARA export.
fn create_hara_json(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("hara.json");
    let content = r#"[
        {"Hazard ID": "H-01", "Safety Goal": "Avoid unintended braking", "ASIL": "D",
         "Safe State": "Brake request ignored", "FTTI": "100 ms"},
        {"Hazard ID": "H-02", "Safety Goal": "Avoid loss of brake assist", "ASIL": "B"},
        {"Hazard ID": "H-03", "Safety Goal": "Comfort braking profile", "ASIL": "QM"}
    ]"#;
    std::fs::write(&path, content).unwrap();
    path
}

fn add_goal(ctx: &CliContext, asil: Asil) -> EntityId {
    let ids = cmd_goal(
        ctx,
        GoalCommand::Add {
            description: "Avoid unintended braking".to_string(),
            asil,
            safe_state: Some("Brake request ignored".to_string()),
            ftti: Some("100 ms".to_string()),
            hazard: Some("Rear-end collision".to_string()),
        },
    )
    .unwrap();
    ids.into_iter().next().unwrap()
}

fn advance(ctx: &CliContext) -> Stage {
    cmd_stage(ctx, StageCommand::Advance).unwrap().reached
}

fn fsr_args(goal: &EntityId, strategy: Option<EntityId>) -> FsrAddArgs {
    FsrAddArgs {
        goal: goal.clone(),
        strategy,
        category: None,
        requirement: None,
        safe_state: None,
        ftti: None,
        modes: vec!["Driving".to_string()],
        emergency_operation: None,
        redundant: false,
    }
}

fn add_mechanism(ctx: &CliContext, fsr: &EntityId, percent: u8) -> EntityId {
    cmd_mechanism(
        ctx,
        MechanismCommand::Add {
            name: "Brake request plausibility".to_string(),
            category: MechanismCategory::Diagnostic,
            coverage: Coverage::from_percent(percent).unwrap(),
            independent: true,
            covers: vec![fsr.clone()],
        },
    )
    .unwrap()
}

fn add_criterion(ctx: &CliContext, target: &EntityId) -> EntityId {
    cmd_validation(
        ctx,
        ValidationCommand::Add {
            target: target.clone(),
            method: "Fault injection".to_string(),
            environment: "HIL".to_string(),
            pass_criteria: "No brake request outside FTTI".to_string(),
            level: ValidationLevel::System,
        },
    )
    .unwrap()
}

/// Drive a session to the `ValidationSpecified` stage with one passing
/// ASIL D goal. Returns (goal, fsr).
fn build_complete(ctx: &CliContext) -> (EntityId, EntityId) {
    cmd_init(ctx, Some("Brake-by-wire"), false).unwrap();
    let sg = add_goal(ctx, Asil::D);
    assert_eq!(advance(ctx), Stage::GoalsLoaded);

    let strategy = cmd_strategy(
        ctx,
        StrategyCommand::Add {
            goal: sg.clone(),
            kind: StrategyKind::Detection,
            content: None,
        },
    )
    .unwrap();
    assert_eq!(advance(ctx), Stage::StrategiesDeveloped);

    let fsr = cmd_fsr(ctx, FsrCommand::Add(fsr_args(&sg, Some(strategy)))).unwrap();
    assert_eq!(advance(ctx), Stage::FsrsDerived);

    let ecu = cmd_element(
        ctx,
        ElementCommand::Add {
            name: "Brake ECU".to_string(),
            kind: ElementKind::Hardware,
            max_asil: Asil::D,
        },
    )
    .unwrap();
    cmd_allocate(
        ctx,
        AllocateArgs {
            fsr: fsr.clone(),
            elements: vec![ecu],
            interface: "CAN brake frame".to_string(),
            ffi: "Dedicated core".to_string(),
        },
    )
    .unwrap();
    add_mechanism(ctx, &fsr, 90);
    add_mechanism(ctx, &fsr, 90);
    assert_eq!(advance(ctx), Stage::Allocated);

    add_criterion(ctx, &sg);
    add_criterion(ctx, &fsr);
    assert_eq!(advance(ctx), Stage::ValidationSpecified);
    (sg, fsr)
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_init_creates_file_database() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    let result = cmd_init(&ctx, None, false);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_init_creates_redb_database() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    let ctx = context(&db_path, Backend::Redb, false);

    let result = cmd_init(&ctx, Some("Steering"), false);
    assert!(result.is_ok());
    assert!(db_path.exists());

    let session = load_or_create_session(&db_path, Backend::Redb).unwrap();
    assert_eq!(session.config().system_name, "Steering");
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    let result = cmd_init(&ctx, None, false);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().exit_code(), 2);
}

#[test]
fn test_init_succeeds_with_force() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    add_goal(&ctx, Asil::B);

    let result = cmd_init(&ctx, None, true);
    assert!(result.is_ok());
    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(session.graph().goals().count(), 0);
}

// =============================================================================
// SESSION PERSISTENCE TESTS
// =============================================================================

#[test]
fn test_load_nonexistent_creates_new() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("nonexistent.db");

    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(session.stage(), Stage::Initialized);
    assert_eq!(session.graph().goals().count(), 0);
}

#[test]
fn test_save_and_load_session() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");

    let mut session = Session::new("Wiper");
    session
        .add_element("Wiper ECU", ElementKind::Hardware, Asil::A)
        .unwrap();
    save_session(&session, &db_path, Backend::File).unwrap();

    let loaded = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(loaded.export_snapshot(), session.export_snapshot());
}

#[test]
fn test_load_redb_session() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    let ctx = context(&db_path, Backend::Redb, false);

    cmd_init(&ctx, None, false).unwrap();
    let sg = add_goal(&ctx, Asil::C);
    let loaded = load_or_create_session(&db_path, Backend::Redb).unwrap();
    assert!(loaded.graph().goal(&sg).is_ok());
}

// =============================================================================
// GOAL COMMAND TESTS
// =============================================================================

#[test]
fn test_goal_load_skips_qm_rows() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let hara = create_hara_json(&temp);

    cmd_init(&ctx, None, false).unwrap();
    let ids = cmd_goal(
        &ctx,
        GoalCommand::Load {
            file: hara,
            include_qm: false,
        },
    )
    .unwrap();

    assert_eq!(ids, vec![EntityId::from("SG-001"), EntityId::from("SG-002")]);
    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    let second = session.graph().goal(&ids[1]).unwrap();
    assert_eq!(second.asil, Asil::B);
    assert!(fsc_core::is_placeholder(&second.safe_state));
}

#[test]
fn test_goal_load_with_qm() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, true);
    let hara = create_hara_json(&temp);

    cmd_init(&ctx, None, false).unwrap();
    let ids = cmd_goal(
        &ctx,
        GoalCommand::Load {
            file: hara,
            include_qm: true,
        },
    )
    .unwrap();
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_goal_refine_replaces_fields() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    let sg = add_goal(&ctx, Asil::B);
    cmd_goal(
        &ctx,
        GoalCommand::Refine {
            id: sg.clone(),
            description: None,
            safe_state: Some("Vehicle held at standstill".to_string()),
            ftti: None,
        },
    )
    .unwrap();

    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    let goal = session.graph().goal(&sg).unwrap();
    assert_eq!(goal.safe_state, "Vehicle held at standstill");
    assert_eq!(goal.ftti.as_deref(), Some("100 ms"));
}

// =============================================================================
// STAGE GATING TESTS
// =============================================================================

#[test]
fn test_strategy_rejected_before_goals_loaded() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    let sg = add_goal(&ctx, Asil::B);
    let result = cmd_strategy(
        &ctx,
        StrategyCommand::Add {
            goal: sg,
            kind: StrategyKind::Detection,
            content: Some("Detect stuck pedal".to_string()),
        },
    );

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().exit_code(), 3);
    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(session.graph().strategies().count(), 0);
}

#[test]
fn test_advance_blocked_names_missing_entities() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    let sg = add_goal(&ctx, Asil::B);
    advance(&ctx);

    assert!(cmd_stage(&ctx, StageCommand::Advance).is_err());
    let assessment = cmd_stage(&ctx, StageCommand::Show { detailed: true }).unwrap();
    assert_eq!(assessment.reached, Stage::GoalsLoaded);
    assert_eq!(assessment.next, Some(Stage::StrategiesDeveloped));
    assert_eq!(assessment.blocking_entities, vec![sg]);
}

#[test]
fn test_stage_set_moves_backward() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    build_complete(&ctx);
    let assessment = cmd_stage(
        &ctx,
        StageCommand::Set {
            stage: Stage::FsrsDerived,
        },
    )
    .unwrap();
    assert_eq!(assessment.reached, Stage::FsrsDerived);
}

// =============================================================================
// WORKFLOW TESTS
// =============================================================================

#[test]
fn test_full_workflow_generates_document() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let (sg, fsr) = build_complete(&ctx);

    let report = cmd_verify(&ctx).unwrap();
    assert!(report.passed, "{}", report.to_text());

    // Document requires the Verified stage
    assert!(cmd_document(&ctx, None).is_err());
    assert_eq!(advance(&ctx), Stage::Verified);

    let output = temp.path().join("fsc.md");
    let document = cmd_document(&ctx, Some(&output)).unwrap();
    assert!(document.starts_with("# Functional Safety Concept: Brake-by-wire"));
    assert!(document.contains(sg.as_str()));
    assert!(document.contains(fsr.as_str()));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), document);

    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(session.stage(), Stage::DocumentGenerated);
}

#[test]
fn test_full_workflow_redb_backend() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.redb");
    let ctx = context(&db_path, Backend::Redb, true);
    build_complete(&ctx);

    assert!(cmd_verify(&ctx).unwrap().passed);
    assert!(cmd_status(&ctx).is_ok());
    assert!(cmd_trace(&ctx, None).is_ok());
}

#[test]
fn test_single_mechanism_fails_verification() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    let sg = add_goal(&ctx, Asil::D);
    advance(&ctx);
    let strategy = cmd_strategy(
        &ctx,
        StrategyCommand::Add {
            goal: sg.clone(),
            kind: StrategyKind::Detection,
            content: Some("Detect implausible brake requests".to_string()),
        },
    )
    .unwrap();
    advance(&ctx);
    let fsr = cmd_fsr(&ctx, FsrCommand::Add(fsr_args(&sg, Some(strategy)))).unwrap();
    advance(&ctx);
    add_mechanism(&ctx, &fsr, 95);

    let report = cmd_verify(&ctx).unwrap();
    assert!(!report.passed);
    assert!(report.to_text().contains("COMPLIANCE: FAILED"));
}

#[test]
fn test_decompose_propose_and_apply() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let (_, fsr) = build_complete(&ctx);

    let proposed = cmd_decompose(
        &ctx,
        DecomposeCommand::Propose {
            parent: fsr.clone(),
            pattern: "B(D)+B(D)".to_string(),
            justification: "Diverse sensor channels".to_string(),
        },
    )
    .unwrap();
    let children = cmd_decompose(
        &ctx,
        DecomposeCommand::Apply {
            id: proposed[0].clone(),
            children: vec![
                "Channel A plausibility".to_string(),
                "Channel B plausibility".to_string(),
            ],
            categories: Vec::new(),
        },
    )
    .unwrap();

    assert_eq!(children.len(), 2);
    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert!(!session.graph().fsr(&fsr).unwrap().is_active());
    for child in &children {
        assert_eq!(session.graph().fsr(child).unwrap().asil, Asil::B);
    }
}

#[test]
fn test_invalid_decomposition_pattern_is_rejected() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let (_, fsr) = build_complete(&ctx);

    let result = cmd_decompose(
        &ctx,
        DecomposeCommand::Propose {
            parent: fsr,
            pattern: "A(D)+A(D)".to_string(),
            justification: "Not enough".to_string(),
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_remove_rewinds_stage() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let (_, fsr) = build_complete(&ctx);

    cmd_remove(&ctx, &fsr).unwrap();
    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(session.stage(), Stage::StrategiesDeveloped);
    assert!(session.graph().fsr(&fsr).is_err());
    assert!(!cmd_verify(&ctx).unwrap().passed);
}

#[test]
fn test_mechanism_cover_extends_coverage() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let (_, fsr) = build_complete(&ctx);

    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    let mechanism = session.graph().mechanisms().next().unwrap().id.clone();
    let result = cmd_mechanism(
        &ctx,
        MechanismCommand::Cover {
            id: mechanism.clone(),
            fsrs: vec![fsr.clone()],
        },
    );
    assert_eq!(result.unwrap(), mechanism);

    // Editing coverage pulls the workflow back to the allocation stage
    let session = load_or_create_session(&db_path, Backend::File).unwrap();
    assert_eq!(session.stage(), Stage::Allocated);
    assert!(session.graph().mechanism(&mechanism).unwrap().covers.contains(&fsr));
}

#[test]
fn test_generated_fsr_needs_strategy_or_category() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    cmd_init(&ctx, None, false).unwrap();
    let sg = add_goal(&ctx, Asil::B);
    advance(&ctx);
    cmd_strategy(
        &ctx,
        StrategyCommand::Add {
            goal: sg.clone(),
            kind: StrategyKind::SafeStateTransition,
            content: None,
        },
    )
    .unwrap();
    advance(&ctx);

    let err = cmd_fsr(&ctx, FsrCommand::Add(fsr_args(&sg, None))).unwrap_err();
    assert_eq!(err.exit_code(), 1);

    let mut args = fsr_args(&sg, None);
    args.category = Some(fsc_core::FsrCategory::SafeState);
    assert!(cmd_fsr(&ctx, FsrCommand::Add(args)).is_ok());
}

// =============================================================================
// EXPORT / IMPORT TESTS
// =============================================================================

#[test]
fn test_export_import_json_round_trip() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    build_complete(&ctx);

    let export_path = temp.path().join("export.json");
    cmd_export(&ctx, &export_path, ExportFormat::Json).unwrap();

    let imported_db = temp.path().join("imported.redb");
    let imported = context(&imported_db, Backend::Redb, false);
    cmd_import(&imported, &export_path, false).unwrap();

    let original = load_or_create_session(&db_path, Backend::File).unwrap();
    let restored = load_or_create_session(&imported_db, Backend::Redb).unwrap();
    assert_eq!(restored.export_snapshot(), original.export_snapshot());
    assert_eq!(restored.stage(), Stage::ValidationSpecified);
}

#[test]
fn test_export_import_binary_round_trip() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    build_complete(&ctx);

    let export_path = temp.path().join("export.fsc");
    cmd_export(&ctx, &export_path, ExportFormat::Binary).unwrap();
    assert!(std::fs::read(&export_path).unwrap().starts_with(b"FSC\0"));

    let imported_db = temp.path().join("imported.db");
    let imported = context(&imported_db, Backend::File, false);
    cmd_import(&imported, &export_path, false).unwrap();

    let restored = load_or_create_session(&imported_db, Backend::File).unwrap();
    assert!(restored.verify().passed);
}

#[test]
fn test_import_refuses_to_overwrite() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    cmd_init(&ctx, None, false).unwrap();

    let export_path = temp.path().join("export.json");
    cmd_export(&ctx, &export_path, ExportFormat::Json).unwrap();

    assert!(cmd_import(&ctx, &export_path, false).is_err());
    assert!(cmd_import(&ctx, &export_path, true).is_ok());
}

#[test]
fn test_import_rejects_corrupt_binary() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);

    let bad = temp.path().join("bad.fsc");
    std::fs::write(&bad, b"FSC\0garbage").unwrap();
    assert!(cmd_import(&ctx, &bad, false).is_err());
    assert!(!db_path.exists());
}

#[test]
fn test_import_lowers_an_unsupported_stage() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    add_goal(&ctx, Asil::D);

    let export_path = temp.path().join("export.json");
    cmd_export(&ctx, &export_path, ExportFormat::Json).unwrap();
    let mut snapshot: Snapshot =
        serde_json::from_slice(&std::fs::read(&export_path).unwrap()).unwrap();
    snapshot.stage = Stage::DocumentGenerated;
    std::fs::write(&export_path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let imported_db = temp.path().join("imported.db");
    let imported = context(&imported_db, Backend::File, false);
    cmd_import(&imported, &export_path, false).unwrap();

    let restored = load_or_create_session(&imported_db, Backend::File).unwrap();
    assert_eq!(restored.stage(), Stage::GoalsLoaded);
    assert!(cmd_document(&imported, None).is_err());
}

// =============================================================================
// STATUS / TRACE TESTS
// =============================================================================

#[test]
fn test_status_empty_graph() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    cmd_init(&ctx, None, false).unwrap();

    assert!(cmd_status(&ctx).is_ok());
}

#[test]
fn test_status_json_mode() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, true);
    cmd_init(&ctx, None, false).unwrap();

    assert!(cmd_status(&ctx).is_ok());
}

#[test]
fn test_trace_unknown_entity_fails() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("test.db");
    let ctx = context(&db_path, Backend::File, false);
    let (_, fsr) = build_complete(&ctx);

    assert!(cmd_trace(&ctx, Some(&fsr)).is_ok());
    assert!(cmd_trace(&ctx, Some(&EntityId::from("FSR-SG009-DET-1"))).is_err());
}
