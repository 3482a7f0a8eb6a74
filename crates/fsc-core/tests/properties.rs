//! Property tests for the ASIL algebra, the verifier and session atomicity.

#![allow(clippy::unwrap_used)]

use fsc_core::{
    AllocationInput, Asil, Coverage, DecompositionChild, DecompositionPattern, ElementKind,
    Entity, EntityId, FsrCategory, FsrInput, GoalInput, GraphStore, HazardContext,
    MechanismCategory, MechanismInput, Relation, Session, Strategy as StrategyRecord,
    StrategyKind, ValidationInput, ValidationLevel, ViolationKind, apply_decomposition,
    decode_snapshot, encode_snapshot, valid_decompositions,
};
use proptest::prelude::*;

// =============================================================================
// GENERATORS
// =============================================================================

fn asil() -> impl Strategy<Value = Asil> {
    prop::sample::select(Asil::ALL.to_vec())
}

fn pattern() -> impl Strategy<Value = DecompositionPattern> {
    prop::collection::vec(asil(), 1..4).prop_map(|parts| DecompositionPattern::new(parts).unwrap())
}

/// One session operation, addressed by indices into what exists.
#[derive(Debug, Clone)]
enum Op {
    Goal(Asil),
    Strategy(usize, usize),
    Fsr(usize, usize),
    Element(usize, Asil),
    Allocate(usize, usize),
    Mechanism(usize, u8, bool),
    Validation(usize, usize),
    Propose(usize, usize),
    ApplyDecomposition(usize),
    Advance,
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => asil().prop_map(Op::Goal),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(g, k)| Op::Strategy(g, k)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(g, c)| Op::Fsr(g, c)),
        1 => (any::<usize>(), asil()).prop_map(|(k, a)| Op::Element(k, a)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(f, e)| Op::Allocate(f, e)),
        2 => (any::<usize>(), 0u8..=100, any::<bool>()).prop_map(|(f, p, i)| Op::Mechanism(f, p, i)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(t, l)| Op::Validation(t, l)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(f, p)| Op::Propose(f, p)),
        2 => any::<usize>().prop_map(Op::ApplyDecomposition),
        3 => Just(Op::Advance),
        2 => any::<usize>().prop_map(Op::Remove),
    ]
}

fn nth<T: Clone>(items: &[T], i: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        items.get(i % items.len()).cloned()
    }
}

fn ids(session: &Session, kind: fsc_core::EntityKind) -> Vec<EntityId> {
    session
        .graph()
        .entities()
        .filter(|e| e.kind() == kind)
        .map(|e| e.id().clone())
        .collect()
}

/// Apply `op`, returning whether it succeeded. Unresolvable indices count as
/// a rejected operation.
fn apply(session: &mut Session, op: &Op) -> bool {
    use fsc_core::EntityKind as K;

    let goals = ids(session, K::SafetyGoal);
    let fsrs = ids(session, K::Fsr);
    let elements = ids(session, K::Element);
    let decompositions = ids(session, K::Decomposition);
    let result = match op {
        Op::Goal(asil) => session
            .add_goal(GoalInput {
                description: "Generated goal".to_string(),
                asil: *asil,
                safe_state: "Safe stop".to_string(),
                ftti: None,
                hazard: HazardContext::default(),
            })
            .map(|_| ()),
        Op::Strategy(g, k) => match nth(&goals, *g) {
            Some(goal) => {
                let kind = StrategyKind::ALL[k % StrategyKind::ALL.len()];
                session.add_strategy(&goal, kind, "Generated strategy").map(|_| ())
            }
            None => return false,
        },
        Op::Fsr(g, c) => match nth(&goals, *g) {
            Some(goal) => {
                let mut input = FsrInput::new(goal, "Generated requirement");
                input.category = Some(FsrCategory::ALL[c % FsrCategory::ALL.len()]);
                session.add_fsr(input).map(|_| ())
            }
            None => return false,
        },
        Op::Element(k, asil) => session
            .add_element(
                "Generated element",
                ElementKind::ALL[k % ElementKind::ALL.len()],
                *asil,
            )
            .map(|_| ()),
        Op::Allocate(f, e) => match (nth(&fsrs, *f), nth(&elements, *e)) {
            (Some(fsr), Some(element)) => session
                .allocate(AllocationInput {
                    fsr,
                    elements: vec![element],
                    interface: "Generated interface".to_string(),
                    ffi_rationale: String::new(),
                })
                .map(|_| ()),
            _ => return false,
        },
        Op::Mechanism(f, percent, independent) => match nth(&fsrs, *f) {
            Some(fsr) => session
                .add_mechanism(MechanismInput {
                    name: "Generated mechanism".to_string(),
                    category: MechanismCategory::Diagnostic,
                    coverage: Coverage::from_percent(*percent).unwrap(),
                    independent: *independent,
                    covers: vec![fsr],
                })
                .map(|_| ()),
            None => return false,
        },
        Op::Validation(t, l) => {
            let targets: Vec<_> = goals.iter().chain(fsrs.iter()).cloned().collect();
            match nth(&targets, *t) {
                Some(target) => session
                    .add_validation(ValidationInput {
                        target,
                        method: "Test".to_string(),
                        environment: "Bench".to_string(),
                        pass_criteria: "Pass".to_string(),
                        level: ValidationLevel::ALL[l % ValidationLevel::ALL.len()],
                    })
                    .map(|_| ()),
                None => return false,
            }
        }
        Op::Propose(f, p) => {
            let Some(fsr) = nth(&fsrs, *f) else {
                return false;
            };
            let target = session.graph().fsr(&fsr).unwrap().asil;
            let patterns: Vec<_> = valid_decompositions(target).into_iter().collect();
            match nth(&patterns, *p) {
                Some(pattern) => session
                    .propose_decomposition(&fsr, pattern, "Generated justification")
                    .map(|_| ()),
                None => return false,
            }
        }
        Op::ApplyDecomposition(d) => match nth(&decompositions, *d) {
            Some(dec) => {
                let parts = session.graph().decomposition(&dec).unwrap().pattern.parts().len();
                let children = (0..parts)
                    .map(|_| DecompositionChild {
                        requirement: "Generated channel".to_string(),
                        category: Some(FsrCategory::Detection),
                    })
                    .collect();
                session.apply_decomposition(&dec, children).map(|_| ())
            }
            None => return false,
        },
        Op::Advance => session.advance().map(|_| ()),
        Op::Remove(i) => {
            let all: Vec<_> = session.graph().entities().map(|e| e.id().clone()).collect();
            match nth(&all, *i) {
                Some(id) => session.remove(&id).map(|_| ()),
                None => return false,
            }
        }
    };
    result.is_ok()
}

fn build(ops: &[Op]) -> Session {
    let mut session = Session::new("Generated");
    for op in ops {
        apply(&mut session, op);
    }
    session
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn decomposed_parts_never_exceed_the_target(target in asil(), pattern in pattern()) {
        if let Ok(parts) = apply_decomposition(target, &pattern) {
            prop_assert!(!parts.is_empty());
            prop_assert!(parts.iter().all(|p| *p <= target));
            if parts.len() > 1 {
                prop_assert!(parts.iter().all(|p| *p < target));
            }
        }
    }

    #[test]
    fn a_and_qm_cannot_be_decomposed(pattern in pattern()) {
        prop_assert!(apply_decomposition(Asil::A, &pattern).is_err());
        prop_assert!(apply_decomposition(Asil::QM, &pattern).is_err());
    }

    #[test]
    fn every_listed_pattern_applies(target in asil()) {
        for pattern in valid_decompositions(target) {
            prop_assert_eq!(apply_decomposition(target, &pattern).unwrap(), pattern.parts().to_vec());
        }
    }

    #[test]
    fn verify_is_idempotent(ops in prop::collection::vec(op(), 0..40)) {
        let session = build(&ops);
        prop_assert_eq!(session.verify(), session.verify());
    }

    #[test]
    fn rejected_operations_leave_the_session_unchanged(ops in prop::collection::vec(op(), 0..40)) {
        let mut session = Session::new("Generated");
        for op in &ops {
            let before = session.export_snapshot();
            if !apply(&mut session, op) {
                prop_assert_eq!(session.export_snapshot(), before);
            }
        }
    }

    #[test]
    fn failed_insert_leaves_links_unchanged(ops in prop::collection::vec(op(), 0..30)) {
        let session = build(&ops);
        let mut graph = session.graph().clone();
        let all: Vec<_> = graph.entities().map(|e| e.id().clone()).collect();
        let children_before: Vec<_> = all
            .iter()
            .map(|id| graph.outgoing(id).cloned().collect::<Vec<_>>())
            .collect();

        let dangling = Entity::Strategy(StrategyRecord {
            id: EntityId::from("STR-X"),
            revision: 1,
            goal: EntityId::from("SG-999"),
            kind: StrategyKind::Avoidance,
            content: "x".to_string(),
        });
        prop_assert!(graph.add_node(dangling).is_err());

        prop_assert_eq!(graph.node_count(), session.graph().node_count());
        prop_assert_eq!(graph.link_count(), session.graph().link_count());
        for (id, before) in all.iter().zip(children_before) {
            prop_assert_eq!(graph.outgoing(id).cloned().collect::<Vec<_>>(), before);
        }
    }

    #[test]
    fn an_fsr_has_at_most_one_applied_decomposition(ops in prop::collection::vec(op(), 0..60)) {
        let session = build(&ops);
        let graph = session.graph();
        for fsr in graph.fsrs() {
            let applied = graph
                .decompositions()
                .filter(|d| d.parent == fsr.id && d.is_applied())
                .count();
            prop_assert!(applied <= 1, "{} has {} applied decompositions", fsr.id, applied);
        }
    }

    #[test]
    fn unallocated_fsrs_are_reported_unless_intact_children_realize_them(
        ops in prop::collection::vec(op(), 0..60)
    ) {
        let session = build(&ops);
        let graph = session.graph();
        let unallocated = session.verify().entities_with(ViolationKind::UnallocatedFsr);
        for fsr in graph.fsrs() {
            let realized = graph.decompositions().any(|d| {
                d.parent == fsr.id
                    && d.is_applied()
                    && d.children.iter().all(|part| graph.fsr(&part.fsr).is_ok())
            });
            if !realized && graph.children(&fsr.id, Relation::AllocatedTo).is_empty() {
                prop_assert!(unallocated.contains(&fsr.id), "{} escaped rule 2", fsr.id);
            }
        }
    }

    #[test]
    fn snapshot_round_trip(ops in prop::collection::vec(op(), 0..40)) {
        let session = build(&ops);
        let snapshot = session.export_snapshot();
        let restored = Session::from_snapshot(&decode_snapshot(&encode_snapshot(&snapshot).unwrap()).unwrap()).unwrap();
        prop_assert_eq!(restored.export_snapshot(), snapshot);
    }
}
