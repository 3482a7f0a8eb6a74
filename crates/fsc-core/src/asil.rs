//! # ASIL Algebra
//!
//! Pure functions over ASIL values, decomposition patterns and diagnostic
//! coverage. Nothing in this module touches the graph.
//!
//! Coverage is held as integer basis points (hundredths of a percent) so
//! that aggregation stays exact and deterministic.

use crate::error::{FscError, Result};
use crate::primitives::{
    BASIS_POINTS_PER_PERCENT, DEFAULT_ASIL_C_THRESHOLD_BP, DEFAULT_ASIL_D_THRESHOLD_BP,
    FULL_COVERAGE_BP,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ASIL
// =============================================================================

/// Automotive Safety Integrity Level.
///
/// Variant order gives the total ordering `QM < A < B < C < D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asil {
    /// Quality Management - no safety requirement.
    QM,
    A,
    B,
    C,
    D,
}

impl Asil {
    /// All levels in ascending order.
    pub const ALL: [Asil; 5] = [Asil::QM, Asil::A, Asil::B, Asil::C, Asil::D];

    /// Single-letter code (`QM`, `A` .. `D`).
    pub fn code(self) -> &'static str {
        match self {
            Asil::QM => "QM",
            Asil::A => "A",
            Asil::B => "B",
            Asil::C => "C",
            Asil::D => "D",
        }
    }

    /// Whether this level carries safety requirements at all.
    pub fn is_safety_relevant(self) -> bool {
        self != Asil::QM
    }

    /// Recommended minimum number of FSRs for a goal of this level.
    pub fn recommended_min_fsrs(self) -> usize {
        match self {
            Asil::QM => 0,
            Asil::A => 2,
            Asil::B => 3,
            Asil::C => 4,
            Asil::D => 5,
        }
    }

    /// Verification methods recommended for requirements of this level.
    pub fn verification_methods(self) -> &'static [&'static str] {
        const QM: &[&str] = &["Requirements review", "Design review"];
        const A: &[&str] = &[
            "Requirements review",
            "Design review",
            "Test specification review",
            "Walk-through",
        ];
        const B: &[&str] = &[
            "Requirements review",
            "Design review",
            "Test specification review",
            "Walk-through",
            "Inspection",
            "Simulation",
        ];
        const C: &[&str] = &[
            "Requirements review",
            "Design review",
            "Test specification review",
            "Walk-through",
            "Inspection",
            "Simulation",
            "Formal verification",
            "Fault injection testing",
        ];
        const D: &[&str] = &[
            "Requirements review",
            "Design review",
            "Test specification review",
            "Walk-through",
            "Inspection",
            "Simulation",
            "Formal verification",
            "Fault injection testing",
            "Back-to-back comparison",
            "Proven in use argument",
        ];
        match self {
            Asil::QM => QM,
            Asil::A => A,
            Asil::B => B,
            Asil::C => C,
            Asil::D => D,
        }
    }
}

impl fmt::Display for Asil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asil::QM => write!(f, "QM"),
            other => write!(f, "ASIL {}", other.code()),
        }
    }
}

impl FromStr for Asil {
    type Err = FscError;

    /// Accepts `D`, `ASIL D`, `asil-d`, `QM` (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let stripped = upper
            .strip_prefix("ASIL")
            .map(|rest| rest.trim_start_matches([' ', '-', '_']))
            .unwrap_or(upper.as_str());
        match stripped.trim() {
            "QM" => Ok(Asil::QM),
            "A" => Ok(Asil::A),
            "B" => Ok(Asil::B),
            "C" => Ok(Asil::C),
            "D" => Ok(Asil::D),
            _ => Err(FscError::InvalidInput(format!("unknown ASIL level '{}'", s))),
        }
    }
}

/// ASIL an FSR inherits from its originating safety goal.
///
/// Identity: without a decomposition the requirement carries the goal's level.
pub fn inherit(goal_asil: Asil) -> Asil {
    goal_asil
}

// =============================================================================
// COVERAGE
// =============================================================================

/// Diagnostic coverage in basis points (0..=10_000, i.e. 0.00 %..=100.00 %).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coverage(u16);

impl Coverage {
    pub const ZERO: Coverage = Coverage(0);
    pub const FULL: Coverage = Coverage(FULL_COVERAGE_BP);

    /// Build from basis points, rejecting values above 100 %.
    pub fn from_basis_points(bp: u16) -> Result<Self> {
        if bp > FULL_COVERAGE_BP {
            return Err(FscError::InvalidInput(format!(
                "coverage {} bp exceeds 100%",
                bp
            )));
        }
        Ok(Self(bp))
    }

    /// Build from a whole percentage.
    pub fn from_percent(percent: u8) -> Result<Self> {
        Self::from_basis_points(u16::from(percent).saturating_mul(BASIS_POINTS_PER_PERCENT))
    }

    #[must_use]
    pub fn basis_points(self) -> u16 {
        self.0
    }

    /// Remaining undetected fraction, in basis points.
    fn residual(self) -> u64 {
        u64::from(FULL_COVERAGE_BP.saturating_sub(self.0))
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASIS_POINTS_PER_PERCENT;
        let frac = self.0 % BASIS_POINTS_PER_PERCENT;
        write!(f, "{}.{:02}%", whole, frac)
    }
}

impl FromStr for Coverage {
    type Err = FscError;

    /// Parses `95`, `95%`, `99.5` or `99.25%` without floating point.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FscError::InvalidInput(format!("invalid coverage '{}'", s));
        let text = s.trim().trim_end_matches('%').trim();
        let (whole, frac) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        let whole: u16 = whole.parse().map_err(|_| invalid())?;
        let frac: u16 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u16>().map_err(|_| invalid())?.saturating_mul(10),
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let bp = whole
            .checked_mul(BASIS_POINTS_PER_PERCENT)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(invalid)?;
        Self::from_basis_points(bp)
    }
}

/// Combine the diagnostic coverage of the mechanisms covering one requirement.
///
/// Independent mechanisms combine as `1 - Π(1 - c_i)`; the residual is rounded
/// up at every step so the result never overstates coverage. Without an
/// independence claim only the best single mechanism counts.
pub fn aggregate_coverage(coverages: &[Coverage], independent: bool) -> Coverage {
    if coverages.is_empty() {
        return Coverage::ZERO;
    }
    if !independent {
        return coverages.iter().copied().max().unwrap_or(Coverage::ZERO);
    }

    let full = u64::from(FULL_COVERAGE_BP);
    let residual = coverages.iter().fold(full, |residual, c| {
        residual
            .saturating_mul(c.residual())
            .saturating_add(full.saturating_sub(1))
            / full
    });
    Coverage(FULL_COVERAGE_BP.saturating_sub(residual.min(full) as u16))
}

/// Threshold configuration for high-ASIL mechanism coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageThresholds {
    pub asil_d: Coverage,
    pub asil_c: Coverage,
}

impl Default for CoverageThresholds {
    fn default() -> Self {
        Self {
            asil_d: Coverage(DEFAULT_ASIL_D_THRESHOLD_BP),
            asil_c: Coverage(DEFAULT_ASIL_C_THRESHOLD_BP),
        }
    }
}

impl CoverageThresholds {
    /// Required aggregate coverage, if this level is subject to the check.
    pub fn for_asil(&self, asil: Asil) -> Option<Coverage> {
        match asil {
            Asil::D => Some(self.asil_d),
            Asil::C => Some(self.asil_c),
            Asil::QM | Asil::A | Asil::B => None,
        }
    }
}

// =============================================================================
// DECOMPOSITION
// =============================================================================

/// The part levels of an ASIL decomposition, highest first.
///
/// `B+B` applied to a `D` target is written `B(D)+B(D)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DecompositionPattern {
    parts: Vec<Asil>,
}

impl DecompositionPattern {
    /// Create a pattern; parts are normalized to descending order.
    pub fn new(mut parts: Vec<Asil>) -> Result<Self> {
        if parts.is_empty() {
            return Err(FscError::InvalidInput(
                "decomposition pattern needs at least one part".to_string(),
            ));
        }
        parts.sort_unstable_by(|a, b| b.cmp(a));
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Asil] {
        &self.parts
    }

    /// ISO notation relative to the decomposed level, e.g. `B(D)+A(D)`.
    pub fn notation(&self, target: Asil) -> String {
        self.parts
            .iter()
            .map(|p| format!("{}({})", p.code(), target.code()))
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl fmt::Display for DecompositionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.parts.iter().map(|p| p.code()).collect();
        write!(f, "{}", parts.join("+"))
    }
}

impl FromStr for DecompositionPattern {
    type Err = FscError;

    /// Accepts `B(D)+B(D)`, `B + B`, `ASIL B(D) + ASIL A(D)`.
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split('+')
            .map(|part| {
                let level = part.split('(').next().unwrap_or(part);
                level.parse::<Asil>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(parts)
    }
}

/// The fixed decomposition table.
///
/// | target | patterns              |
/// |--------|-----------------------|
/// | D      | D(D), B(D)+B(D)       |
/// | C      | C(D), B(D)+A(D)       |
/// | B      | B(D), A(D)+A(D)       |
/// | A, QM  | none                  |
pub fn valid_decompositions(target: Asil) -> BTreeSet<DecompositionPattern> {
    let table: &[&[Asil]] = match target {
        Asil::D => &[&[Asil::D], &[Asil::B, Asil::B]],
        Asil::C => &[&[Asil::C], &[Asil::B, Asil::A]],
        Asil::B => &[&[Asil::B], &[Asil::A, Asil::A]],
        Asil::A | Asil::QM => &[],
    };
    table
        .iter()
        .map(|parts| DecompositionPattern {
            parts: parts.to_vec(),
        })
        .collect()
}

/// Child ASILs for `pattern` applied to `target`.
pub fn apply_decomposition(target: Asil, pattern: &DecompositionPattern) -> Result<Vec<Asil>> {
    if !valid_decompositions(target).contains(pattern) {
        return Err(FscError::InvalidDecomposition {
            target,
            pattern: pattern.to_string(),
        });
    }
    Ok(pattern.parts.clone())
}

// =============================================================================
// TESTS
// =============================================================================
