//! # Formats Module
//!
//! Serialization and format handling for FSC sessions.
//!
//! This module contains:
//! - The structured snapshot (one array per entity kind, links, stage, report)
//! - Binary persistence format (postcard + header)
//!
//! File I/O stays in the app layer (apps/fsc). This module only handles
//! format conversion.

mod persistence;
mod snapshot;

pub use persistence::*;
pub use snapshot::*;
