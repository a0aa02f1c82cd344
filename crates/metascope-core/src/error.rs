//! Error types for metadata introspection.
//!
//! # Error Handling Strategy
//!
//! Two error types cover the whole crate:
//!
//! - [`TransportError`]: produced by the collaborators that actually talk to the
//!   database ([`crate::MetadataSource`], [`crate::StatementExecutor`]). The caching
//!   layer never inspects or retries these; they are handed back to the caller as-is.
//!
//! - [`MetadataError`]: what every public operation returns. It either carries a
//!   transport failure verbatim or reports a dialect-mapping gap, i.e. a backend for
//!   which no statement text exists for the requested capability.
//!
//! A failed fetch does not invalidate rows cached by earlier, successful fetches.

use crate::dialect::Backend;
use std::error::Error;
use std::fmt;

/// Failure reported by a metadata or statement collaborator.
///
/// Carries a human-readable message and, when available, the driver error that
/// caused it.
#[derive(Debug)]
pub struct TransportError {
    /// Human-readable error message.
    pub message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a driver error, using its display output as the message.
    pub fn from_driver(err: impl Error + Send + Sync + 'static) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Adds context to the message while keeping the original cause.
    pub fn with_context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

/// Error returned by the caching metadata operations.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The underlying metadata call or statement failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No statement text is known for this backend and capability.
    #[error("{capability} is not supported for backend '{backend}'")]
    UnsupportedBackend {
        backend: Backend,
        capability: &'static str,
    },
}
