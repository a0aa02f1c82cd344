//! Live database metadata sources for schema introspection.
//!
//! This module answers the standard metadata calls by querying each backend's
//! system catalogs through SQLx. The caching layer in `metascope-core` decides
//! which of these calls to make.

mod queries;
mod sqlx_provider;

pub use sqlx_provider::SqlxMetadataSource;
