//! # Core Types
//!
//! Identifiers, closed category enumerations and trace links.
//!
//! Every category set here is closed so that validation can be exhaustive.

use crate::error::{FscError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Human-readable entity identifier, e.g. `SG-001` or `FSR-SG001-DET-1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id with separators removed, used as a scope segment in child ids.
    pub fn compact(&self) -> String {
        self.0.chars().filter(|c| *c != '-').collect()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Internal insertion-order index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub u64);

/// Internal insertion-order index of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkIndex(pub u64);

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// Kind of node in the trace graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    SafetyGoal,
    Strategy,
    Fsr,
    Element,
    Allocation,
    Mechanism,
    Decomposition,
    Criterion,
}

impl EntityKind {
    /// Kinds in the fixed order used for reports and snapshots.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::SafetyGoal,
        EntityKind::Strategy,
        EntityKind::Fsr,
        EntityKind::Element,
        EntityKind::Allocation,
        EntityKind::Mechanism,
        EntityKind::Decomposition,
        EntityKind::Criterion,
    ];

    /// Id prefix for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::SafetyGoal => "SG",
            EntityKind::Strategy => "STR",
            EntityKind::Fsr => "FSR",
            EntityKind::Element => "AE",
            EntityKind::Allocation => "AL",
            EntityKind::Mechanism => "SM",
            EntityKind::Decomposition => "DEC",
            EntityKind::Criterion => "VC",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::SafetyGoal => "safety goal",
            EntityKind::Strategy => "strategy",
            EntityKind::Fsr => "functional safety requirement",
            EntityKind::Element => "architectural element",
            EntityKind::Allocation => "allocation",
            EntityKind::Mechanism => "safety mechanism",
            EntityKind::Decomposition => "ASIL decomposition",
            EntityKind::Criterion => "validation criterion",
        };
        f.write_str(name)
    }
}

// =============================================================================
// TRACE LINKS
// =============================================================================

/// Relation carried by a trace link. Links point downstream, from the
/// upstream artifact to the one that traces back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    DerivesFrom,
    AllocatedTo,
    CoveredBy,
    ValidatedBy,
    DecomposedInto,
}

impl Relation {
    pub const ALL: [Relation; 5] = [
        Relation::DerivesFrom,
        Relation::AllocatedTo,
        Relation::CoveredBy,
        Relation::ValidatedBy,
        Relation::DecomposedInto,
    ];

    /// Relations that express derivation and must stay acyclic.
    pub fn is_derivation(self) -> bool {
        matches!(self, Relation::DerivesFrom | Relation::DecomposedInto)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Relation::DerivesFrom => "derives-from",
            Relation::AllocatedTo => "allocated-to",
            Relation::CoveredBy => "covered-by",
            Relation::ValidatedBy => "validated-by",
            Relation::DecomposedInto => "decomposed-into",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = FscError;

    fn from_str(s: &str) -> Result<Self> {
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_ascii_lowercase().replace('_', "-"))
            .ok_or_else(|| FscError::InvalidInput(format!("unknown relation '{}'", s)))
    }
}

/// Directed trace edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceLink {
    pub source: EntityId,
    pub target: EntityId,
    pub relation: Relation,
}

impl TraceLink {
    pub fn new(source: EntityId, target: EntityId, relation: Relation) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }

    pub fn touches(&self, id: &EntityId) -> bool {
        &self.source == id || &self.target == id
    }
}

// =============================================================================
// CATEGORY ENUMERATIONS
// =============================================================================

/// Declares a closed, code-carrying enumeration with `FromStr` accepting
/// either the code or the kebab-case name.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident => ($code:literal, $label:literal) ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Short code used inside identifiers.
            pub fn code(self) -> &'static str {
                match self { $( $name::$variant => $code ),+ }
            }

            /// Kebab-case name.
            pub fn label(self) -> &'static str {
                match self { $( $name::$variant => $label ),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = FscError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label() == wanted || v.code().eq_ignore_ascii_case(&wanted))
                    .ok_or_else(|| FscError::InvalidInput(format!(
                        "unknown {} '{}'", stringify!($name), s
                    )))
            }
        }
    };
}

coded_enum! {
    /// Safety strategy kinds for achieving a safety goal.
    StrategyKind {
        Avoidance => ("AVD", "avoidance"),
        Detection => ("DET", "detection"),
        Control => ("CTL", "control"),
        SafeStateTransition => ("SST", "safe-state-transition"),
        Tolerance => ("TOL", "tolerance"),
        Degradation => ("DEG", "degradation"),
        WarningExposure => ("WEX", "warning-exposure"),
        WarningControllability => ("WCT", "warning-controllability"),
        Timing => ("TIM", "timing"),
        Arbitration => ("ARB", "arbitration"),
    }
}

coded_enum! {
    /// Functional safety requirement categories.
    FsrCategory {
        Avoidance => ("AVD", "avoidance"),
        Detection => ("DET", "detection"),
        Control => ("CTL", "control"),
        SafeState => ("SST", "safe-state"),
        Tolerance => ("TOL", "tolerance"),
        Warning => ("WRN", "warning"),
        Timing => ("TIM", "timing"),
        Arbitration => ("ARB", "arbitration"),
    }
}

coded_enum! {
    /// Technology class of an architectural element.
    ElementKind {
        Hardware => ("HW", "hardware"),
        Software => ("SW", "software"),
        Mechanical => ("MECH", "mechanical"),
        OtherTechnology => ("OT", "other-technology"),
        ExternalMeasure => ("EXT", "external-measure"),
    }
}

coded_enum! {
    /// Safety mechanism categories.
    MechanismCategory {
        Diagnostic => ("DIAG", "diagnostic"),
        Redundancy => ("RED", "redundancy"),
        SafeStateManagement => ("SSM", "safe-state-management"),
    }
}

coded_enum! {
    /// Level at which a validation criterion is exercised.
    ValidationLevel {
        Unit => ("UNIT", "unit"),
        Integration => ("INT", "integration"),
        System => ("SYS", "system"),
        Vehicle => ("VEH", "vehicle"),
    }
}

impl StrategyKind {
    /// The FSR category a requirement derived from this strategy mirrors.
    pub fn fsr_category(self) -> FsrCategory {
        match self {
            StrategyKind::Avoidance => FsrCategory::Avoidance,
            StrategyKind::Detection => FsrCategory::Detection,
            StrategyKind::Control => FsrCategory::Control,
            StrategyKind::SafeStateTransition => FsrCategory::SafeState,
            StrategyKind::Tolerance | StrategyKind::Degradation => FsrCategory::Tolerance,
            StrategyKind::WarningExposure | StrategyKind::WarningControllability => {
                FsrCategory::Warning
            }
            StrategyKind::Timing => FsrCategory::Timing,
            StrategyKind::Arbitration => FsrCategory::Arbitration,
        }
    }
}

/// Lifecycle of an FSR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsrStatus {
    #[default]
    Active,
    /// Realized by the children of an applied decomposition.
    Decomposed,
}

/// Lifecycle of an ASIL decomposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionStatus {
    #[default]
    Proposed,
    Applied,
}
