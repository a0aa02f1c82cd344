//! Errors the binary reports as configuration problems.

use thiserror::Error;

/// A problem with the command line rather than with the database.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported database URL scheme: {0}")]
    UnsupportedUrl(String),

    #[error("live introspection is not available for backend '{0}' (supported: postgresql, mysql, sqlite)")]
    UnsupportedBackend(String),
}
