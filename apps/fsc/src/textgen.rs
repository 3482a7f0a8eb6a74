//! Deterministic template text generator.
//!
//! Stands in for a language-model collaborator: the same context always
//! yields the same text, so CLI runs and tests are reproducible.

use fsc_core::{FscError, FsrCategory, PromptContext, Result, StrategyKind, TextGenerator};

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

fn ftti(context: &PromptContext) -> &str {
    context.ftti.as_deref().unwrap_or("the fault tolerant time interval")
}

fn action(kind: StrategyKind) -> &'static str {
    match kind {
        StrategyKind::Avoidance => "prevent the occurrence of faults that violate",
        StrategyKind::Detection => "detect faults that could violate",
        StrategyKind::Control => "control detected faults so they cannot violate",
        StrategyKind::SafeStateTransition => "transition to the safe state before violating",
        StrategyKind::Tolerance => "tolerate single faults without violating",
        StrategyKind::Degradation => "degrade functionality gracefully rather than violate",
        StrategyKind::WarningExposure => "warn the driver to reduce exposure to situations violating",
        StrategyKind::WarningControllability => {
            "warn the driver so the hazard remains controllable when violating"
        }
        StrategyKind::Timing => "meet the timing constraints of",
        StrategyKind::Arbitration => "arbitrate conflicting requests that could violate",
    }
}

fn verb(category: FsrCategory) -> &'static str {
    match category {
        FsrCategory::Avoidance => "shall prevent",
        FsrCategory::Detection => "shall detect",
        FsrCategory::Control => "shall control",
        FsrCategory::SafeState => "shall transition to the safe state upon",
        FsrCategory::Tolerance => "shall tolerate",
        FsrCategory::Warning => "shall warn the driver of",
        FsrCategory::Timing => "shall bound the reaction time to",
        FsrCategory::Arbitration => "shall arbitrate",
    }
}

impl TextGenerator for TemplateGenerator {
    fn strategy_text(&self, context: &PromptContext, kind: StrategyKind) -> Result<String> {
        Ok(format!(
            "The {} shall {} {} \"{}\" ({}). The safe state \"{}\" shall be reached within {}.",
            context.system_name,
            action(kind),
            context.goal,
            context.goal_description,
            context.asil,
            context.safe_state,
            ftti(context),
        ))
    }

    fn requirement_text(&self, context: &PromptContext) -> Result<String> {
        let category = context.category.ok_or_else(|| {
            FscError::InvalidInput("a category or strategy is required".to_string())
        })?;
        let basis = context
            .strategy
            .as_ref()
            .map(|s| format!(" per {}", s.id))
            .unwrap_or_default();
        let ordinal = context.existing_requirements.len().saturating_add(1);
        Ok(format!(
            "The {} {} faults violating {}{} within {} (requirement {} for this goal).",
            context.system_name,
            verb(category),
            context.goal,
            basis,
            ftti(context),
            ordinal,
        ))
    }
}
