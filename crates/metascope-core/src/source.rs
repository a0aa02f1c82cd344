//! Collaborator traits consumed by the caching layer.
//!
//! Implementations connect to a database and return raw metadata records; the
//! caching layer decides *which* of these calls to make and how often.

use crate::dialect::{Backend, ObjectKind};
use crate::error::TransportError;
use crate::row::RawRecord;

/// A provider of standard metadata introspection calls.
///
/// Every argument is an optional filter; `None` means unconstrained. Records use the
/// conventional metadata column names (`TABLE_CAT`, `TABLE_SCHEM`, `TABLE_NAME`,
/// `COLUMN_NAME`, ...), matched case-insensitively.
pub trait MetadataSource {
    /// List tables of the given `types` (e.g. `TABLE`, `VIEW`).
    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        types: &[String],
    ) -> Result<Vec<RawRecord>, TransportError>;

    /// List columns, one record per column.
    fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError>;

    /// List primary key columns (`COLUMN_NAME`, `KEY_SEQ`, `PK_NAME`).
    fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError>;

    /// List index columns (`INDEX_NAME`, `NON_UNIQUE`, `COLUMN_NAME`, `ORDINAL_POSITION`).
    fn index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError>;

    /// List foreign key columns declared on `table` (the referencing side).
    fn imported_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<RawRecord>, TransportError>;
}

/// Executes literal statement text and returns its rows.
pub trait StatementExecutor {
    fn query(&self, sql: &str) -> Result<Vec<RawRecord>, TransportError>;
}

/// Backend identity plus the identifier rules that go with it.
pub trait DatabaseDialect {
    /// The backend family this connection belongs to.
    fn backend(&self) -> Backend;

    /// Whether two identifiers name the same object.
    fn identifiers_equal(&self, left: &str, right: &str) -> bool;

    /// Adjust a user-supplied name to the form stored in the catalog.
    fn correct_object_name(&self, name: &str, kind: ObjectKind) -> String;

    /// Render `value` as a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}
