pub mod cache;
pub mod dialect;
pub mod error;
pub mod facade;
pub mod identity;
pub mod plan;
pub mod row;
pub mod snapshot;
pub mod source;

// Re-export main types and functions
pub use cache::{FetchStats, QueryCache, QueryKind};
pub use dialect::{
    oracle_index_sql, unique_constraint_sql_for, Backend, NormalizationStrategy, ObjectKind,
    StandardDialect, UniqueConstraintSql,
};
pub use error::{MetadataError, TransportError};
pub use facade::CachingMetadata;
pub use identity::{matches, RowIdentity};
pub use plan::{FetchPlan, PlanKind, BULK_FETCH_THRESHOLD};
pub use row::{CachedRow, FromValue, RawRecord, Value};
pub use snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot, ReferentialAction,
    SchemaSnapshot, SnapshotBuilder, SnapshotScope, TableSnapshot, DEFAULT_TABLE_TYPES,
};
pub use source::{DatabaseDialect, MetadataSource, StatementExecutor};
