//! TriStack Common Utilities
//!
//! Shared infrastructure for all TriStack crates:
//! - Error types, stable error kinds, and result aliases
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
