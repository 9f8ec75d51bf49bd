//! Clipmark Common Utilities
//!
//! Shared infrastructure for all Clipmark crates:
//! - Error types and result aliases
//! - Export clock for elapsed-time reporting
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
