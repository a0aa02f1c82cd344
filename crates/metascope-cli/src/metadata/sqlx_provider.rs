//! SQLx-based metadata source for live database introspection.
//!
//! Supports PostgreSQL, MySQL, and SQLite databases. The core metadata traits are
//! synchronous, so every query is driven to completion on a private Tokio runtime.

use anyhow::Result;
use metascope_core::{
    Backend, DatabaseDialect, MetadataSource, RawRecord, StandardDialect, StatementExecutor,
    TransportError, Value,
};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Column, Row};
use tokio::runtime::Runtime;

use super::queries::SystemCatalog;
use crate::error::ConfigError;

/// A metadata source that answers the standard metadata calls by querying the
/// system catalogs of a live database through SQLx.
pub struct SqlxMetadataSource {
    pool: AnyPool,
    runtime: Runtime,
    catalog: SystemCatalog,
    dialect: StandardDialect,
}

impl SqlxMetadataSource {
    /// Connect to the database at the given URL.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the URL names a backend without live support,
    /// or the driver error if the connection fails.
    pub fn connect(url: &str) -> Result<Self> {
        let backend = Backend::from_url(url)
            .ok_or_else(|| ConfigError::UnsupportedUrl(redact_url(url)))?;
        let catalog = SystemCatalog::for_backend(&backend)
            .ok_or_else(|| ConfigError::UnsupportedBackend(backend.to_string()))?;

        sqlx::any::install_default_drivers();

        let runtime = Runtime::new()?;
        let pool = runtime.block_on(AnyPool::connect(url))?;

        tracing::debug!(backend = %backend, "connected");

        Ok(Self {
            pool,
            runtime,
            catalog,
            dialect: StandardDialect::new(backend),
        })
    }

    pub fn backend(&self) -> Backend {
        self.dialect.backend()
    }

    pub fn dialect(&self) -> &StandardDialect {
        &self.dialect
    }

    /// Run `sql`; a failure names the metadata `call` it was issued for.
    fn fetch(&self, call: &str, sql: &str) -> Result<Vec<RawRecord>, TransportError> {
        tracing::trace!(call, sql, "running metadata query");
        let rows = self
            .runtime
            .block_on(sqlx::query(sql).fetch_all(&self.pool))
            .map_err(|err| failed_call(call, err))?;
        Ok(rows.iter().map(row_to_record).collect())
    }
}

impl MetadataSource for SqlxMetadataSource {
    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        types: &[String],
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.fetch(
            "getTables",
            &self
                .catalog
                .tables(&self.dialect, catalog, schema, table, types),
        )
    }

    fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.fetch(
            "getColumns",
            &self
                .catalog
                .columns(&self.dialect, catalog, schema, table, column),
        )
    }

    fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.fetch(
            "getPrimaryKeys",
            &self
                .catalog
                .primary_keys(&self.dialect, catalog, schema, table),
        )
    }

    fn index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.fetch(
            "getIndexInfo",
            &self.catalog.index_info(&self.dialect, catalog, schema, table),
        )
    }

    fn imported_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.fetch(
            "getImportedKeys",
            &self
                .catalog
                .imported_keys(&self.dialect, catalog, schema, table),
        )
    }
}

impl StatementExecutor for SqlxMetadataSource {
    fn query(&self, sql: &str) -> Result<Vec<RawRecord>, TransportError> {
        self.fetch("query", sql)
    }
}

fn failed_call(call: &str, err: sqlx::Error) -> TransportError {
    TransportError::from_driver(err).with_context(format!("{call} failed"))
}

/// Copy every column of a driver row into an owned record.
fn row_to_record(row: &AnyRow) -> RawRecord {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            (column.name().to_string(), decode_value(row, index))
        })
        .collect()
}

// The Any driver only decodes into a Rust type compatible with the column's
// runtime type, so probe the supported types in turn.
fn decode_value(row: &AnyRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.into();
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return value.into();
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.into();
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.into();
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.into();
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        };
    }
    Value::Null
}

/// Strip credentials from a URL before it appears in a message.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
