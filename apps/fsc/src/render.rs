//! # Markdown Renderer
//!
//! Lays out a snapshot as a Functional Safety Concept document. Pure
//! formatting: every fact comes from the snapshot and its report.

use fsc_core::{Asil, Compositor, DocumentRenderer, EntityId, Result, Snapshot, is_placeholder};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

/// Escape table-cell content.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn join(ids: &[EntityId]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.iter().map(EntityId::as_str).collect::<Vec<_>>().join(", ")
    }
}

fn flag(text: &str) -> String {
    if is_placeholder(text) {
        format!("{} ⚠", cell(text))
    } else {
        cell(text)
    }
}

impl DocumentRenderer for MarkdownRenderer {
    type Output = String;

    fn render(&self, snapshot: &Snapshot) -> Result<String> {
        let (graph, _, _) = snapshot.restore()?;
        let report = &snapshot.report;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# Functional Safety Concept: {}\n",
            snapshot.config.system_name
        );
        let _ = writeln!(
            out,
            "Workflow stage: {}. Compliance: {}.\n",
            snapshot.stage,
            if report.passed { "PASSED" } else { "FAILED" }
        );

        // 1. Safety goals
        out.push_str("## 1. Safety Goals\n\n");
        out.push_str("| ID | Safety goal | ASIL | Safe state | FTTI | Hazard |\n");
        out.push_str("|----|-------------|------|------------|------|--------|\n");
        for goal in &snapshot.goals {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                goal.id,
                cell(&goal.description),
                goal.asil,
                flag(&goal.safe_state),
                goal.ftti.as_deref().map_or_else(|| "-".to_string(), flag),
                goal.hazard
                    .hazardous_event
                    .as_deref()
                    .map_or_else(|| "-".to_string(), cell),
            );
        }
        out.push('\n');

        // 2. Strategies
        out.push_str("## 2. Functional Safety Strategies\n\n");
        for goal in &snapshot.goals {
            let strategies: Vec<_> = snapshot
                .strategies
                .iter()
                .filter(|s| s.goal == goal.id)
                .collect();
            if strategies.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {}\n", goal.id);
            for s in strategies {
                let _ = writeln!(out, "- **{}** ({}): {}", s.id, s.kind, s.content);
            }
            out.push('\n');
        }

        // 3. Requirements
        out.push_str("## 3. Functional Safety Requirements\n\n");
        out.push_str("| ID | Goal | Category | ASIL | Requirement | Status |\n");
        out.push_str("|----|------|----------|------|-------------|--------|\n");
        for fsr in &snapshot.fsrs {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                fsr.id,
                fsr.goal,
                fsr.category,
                fsr.asil,
                cell(&fsr.requirement),
                if fsr.is_active() { "active" } else { "decomposed" },
            );
        }
        out.push('\n');

        if !snapshot.decompositions.is_empty() {
            out.push_str("### ASIL Decompositions\n\n");
            for dec in &snapshot.decompositions {
                let children: Vec<_> = dec.children.iter().map(|c| c.fsr.clone()).collect();
                let _ = writeln!(
                    out,
                    "- **{}**: {} {} into {} ({}). Independence: {}",
                    dec.id,
                    dec.parent,
                    dec.pattern.notation(dec.target),
                    join(&children),
                    if dec.is_applied() { "applied" } else { "proposed" },
                    cell(&dec.justification),
                );
            }
            out.push('\n');
        }

        // 4. Architecture
        out.push_str("## 4. Allocation to Architectural Elements\n\n");
        out.push_str("| Element | Name | Kind | Max ASIL |\n");
        out.push_str("|---------|------|------|----------|\n");
        for element in &snapshot.elements {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                element.id,
                cell(&element.name),
                element.kind,
                element.max_asil
            );
        }
        out.push('\n');
        for allocation in &snapshot.allocations {
            let _ = writeln!(
                out,
                "- {} -> {} via {}{}",
                allocation.fsr,
                join(&allocation.elements),
                cell(&allocation.interface),
                if allocation.ffi_rationale.is_empty() {
                    String::new()
                } else {
                    format!(" (FFI: {})", cell(&allocation.ffi_rationale))
                }
            );
        }
        out.push('\n');

        // 5. Mechanisms
        out.push_str("## 5. Safety Mechanisms\n\n");
        out.push_str("| ID | Name | Category | Coverage | Independent | Covers |\n");
        out.push_str("|----|------|----------|----------|-------------|--------|\n");
        for m in &snapshot.mechanisms {
            let covers: Vec<_> = m.covers.iter().cloned().collect();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                m.id,
                cell(&m.name),
                m.category,
                m.coverage,
                if m.independent { "yes" } else { "no" },
                join(&covers),
            );
        }
        out.push('\n');

        // 6. Validation
        out.push_str("## 6. Validation Criteria\n\n");
        for c in &snapshot.criteria {
            let _ = writeln!(
                out,
                "- **{}** ({}, {}): {} in {}. Pass: {}",
                c.id,
                c.target,
                c.level,
                cell(&c.method),
                cell(&c.environment),
                cell(&c.pass_criteria),
            );
        }
        out.push('\n');

        out.push_str("### Recommended Verification Methods\n\n");
        for asil in Asil::ALL.into_iter().filter(|a| report.statistics.goals_by_asil.contains_key(a)) {
            let _ = writeln!(out, "- {}: {}", asil, asil.verification_methods().join(", "));
        }
        out.push('\n');

        // 7. Traceability
        out.push_str("## 7. Traceability Matrix\n\n");
        out.push_str("| Goal | FSR | ASIL | Elements | Mechanisms | Criteria |\n");
        out.push_str("|------|-----|------|----------|------------|----------|\n");
        for row in Compositor::trace_matrix(&graph) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                row.goal,
                row.fsr,
                row.asil,
                join(&row.elements),
                join(&row.mechanisms),
                join(&row.criteria),
            );
        }
        out.push('\n');

        // 8. Report
        out.push_str("## 8. Verification Report\n\n```text\n");
        out.push_str(&report.to_text());
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::hara::SAFE_STATE_PLACEHOLDER;
    use fsc_core::{GoalInput, HazardContext, Session};

    #[test]
    fn renders_goals_and_report() {
        let mut session = Session::new("Seat heater");
        session
            .add_goal(GoalInput {
                description: "Avoid burns | overheating".to_string(),
                asil: Asil::A,
                safe_state: SAFE_STATE_PLACEHOLDER.to_string(),
                ftti: None,
                hazard: HazardContext::default(),
            })
            .unwrap();

        let text = MarkdownRenderer.render(&session.export_snapshot()).unwrap();
        assert!(text.starts_with("# Functional Safety Concept: Seat heater"));
        assert!(text.contains("| SG-001 | Avoid burns \\| overheating | ASIL A |"));
        assert!(text.contains("⚠"));
        assert!(text.contains("COMPLIANCE: FAILED"));
        assert!(text.contains("- ASIL A: Requirements review"));
    }
}
