//! # Primitives
//!
//! Fixed constants shared across the engine.

/// Basis points in one percent.
pub const BASIS_POINTS_PER_PERCENT: u16 = 100;

/// 100.00 % expressed in basis points.
pub const FULL_COVERAGE_BP: u16 = 10_000;

/// Default aggregate coverage required for ASIL D requirements (99 %).
pub const DEFAULT_ASIL_D_THRESHOLD_BP: u16 = 9_900;

/// Default aggregate coverage required for ASIL C requirements (90 %).
pub const DEFAULT_ASIL_C_THRESHOLD_BP: u16 = 9_000;

/// Zero-padded width of root sequence numbers (`SG-001`).
pub const ROOT_SEQUENCE_WIDTH: usize = 3;

/// Lower-case markers identifying caller-supplied placeholder text.
pub const PLACEHOLDER_MARKERS: [&str; 3] = ["to be determined", "to be specified", "tbd"];

/// Magic bytes at the start of a binary snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"FSC\0";

/// Current binary snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;
