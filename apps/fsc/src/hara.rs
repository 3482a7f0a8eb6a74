//! # HARA Goal Records
//!
//! Reads safety goals exported from a hazard analysis as JSON. Accepts a
//! top-level array of row objects, or an object with a `safety_goals` or
//! `goals` array. Column names are matched loosely (`Safety Goal`,
//! `safety_goal` and `safetygoal` are the same column).
//!
//! Missing safe states and FTTIs are filled with fixed placeholders, which
//! the verifier reports as advisories.

use crate::error::{CliError, CliResult};
use fsc_core::{Asil, GoalInput, HazardContext};
use serde_json::{Map, Value};

pub const SAFE_STATE_PLACEHOLDER: &str = "To be specified in HARA refinement";
pub const FTTI_PLACEHOLDER: &str = "To be determined based on hazard analysis";

const GOAL_COLUMNS: &[&str] = &["safetygoal", "goal", "description"];
const ASIL_COLUMNS: &[&str] = &["asil", "asillevel"];
const HAZARD_ID_COLUMNS: &[&str] = &["hazardid", "hazid"];
const EVENT_COLUMNS: &[&str] = &["hazardousevent", "hazard"];
const SITUATION_COLUMNS: &[&str] = &["operationalsituation", "situation"];
const SAFE_STATE_COLUMNS: &[&str] = &["safestate"];
const FTTI_COLUMNS: &[&str] = &["ftti", "faulttoleranttimeinterval"];
const SEVERITY_COLUMNS: &[&str] = &["severity", "s"];
const EXPOSURE_COLUMNS: &[&str] = &["exposure", "e"];
const CONTROLLABILITY_COLUMNS: &[&str] = &["controllability", "c"];

/// A row that did not produce a goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based row number in the input.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaraImport {
    pub goals: Vec<GoalInput>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse goal records. QM rows are skipped unless `include_qm` is set.
pub fn parse_goal_records(json: &str, include_qm: bool) -> CliResult<HaraImport> {
    let value: Value = serde_json::from_str(json)?;
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object
            .remove("safety_goals")
            .or_else(|| object.remove("goals"))
        {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(CliError::usage(
                    "expected an array of goal records or a `safety_goals` array",
                ));
            }
        },
        _ => return Err(CliError::usage("expected an array of goal records")),
    };

    let mut import = HaraImport::default();
    for (i, row) in rows.into_iter().enumerate() {
        let row_number = i.saturating_add(1);
        let Value::Object(row) = row else {
            import.skipped.push(SkippedRow {
                row: row_number,
                reason: "not an object".to_string(),
            });
            continue;
        };
        match goal_from_row(&normalize(row), include_qm) {
            Ok(goal) => import.goals.push(goal),
            Err(reason) => import.skipped.push(SkippedRow {
                row: row_number,
                reason,
            }),
        }
    }
    Ok(import)
}

/// Lower-case keys and drop separators so column variants compare equal.
fn normalize(row: Map<String, Value>) -> Map<String, Value> {
    row.into_iter()
        .map(|(key, value)| {
            let key: String = key
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            (key, value)
        })
        .collect()
}

fn text(row: &Map<String, Value>, columns: &[&str]) -> Option<String> {
    columns.iter().find_map(|column| {
        let value = match row.get(*column)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    })
}

fn goal_from_row(row: &Map<String, Value>, include_qm: bool) -> Result<GoalInput, String> {
    let description = text(row, GOAL_COLUMNS).ok_or_else(|| "no safety goal text".to_string())?;
    let asil: Asil = match text(row, ASIL_COLUMNS) {
        Some(raw) => raw.parse().map_err(|e| format!("{}", e))?,
        None => Asil::QM,
    };
    if !asil.is_safety_relevant() && !include_qm {
        return Err("QM goal".to_string());
    }

    Ok(GoalInput {
        description,
        asil,
        safe_state: text(row, SAFE_STATE_COLUMNS)
            .unwrap_or_else(|| SAFE_STATE_PLACEHOLDER.to_string()),
        ftti: Some(text(row, FTTI_COLUMNS).unwrap_or_else(|| FTTI_PLACEHOLDER.to_string())),
        hazard: HazardContext {
            hazard_id: text(row, HAZARD_ID_COLUMNS),
            hazardous_event: text(row, EVENT_COLUMNS),
            operational_situation: text(row, SITUATION_COLUMNS),
            severity: text(row, SEVERITY_COLUMNS),
            exposure: text(row, EXPOSURE_COLUMNS),
            controllability: text(row, CONTROLLABILITY_COLUMNS),
        },
    })
}
