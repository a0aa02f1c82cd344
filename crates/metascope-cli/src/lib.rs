//! metascope CLI library.
//!
//! This module exposes internal types for testing purposes.
//! The main entry point is the `metascope` binary.

pub mod cli;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod output;

// Re-export commonly used types
pub use cli::Args;
pub use error::ConfigError;
