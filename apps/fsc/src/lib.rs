//! # FSC Library
//!
//! This library exposes the FSC application modules for testing and
//! integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod args;
pub mod cli;
pub mod config;
pub mod error;
pub mod hara;
pub mod render;
pub mod storage;
pub mod textgen;

// Re-export fsc_core for convenience
pub use fsc_core;
