//! The caching metadata facade.
//!
//! [`CachingMetadata`] offers one operation per metadata kind. Each operation builds
//! the [`FetchPlan`] for its kind and hands it to the [`QueryCache`] for that kind,
//! creating the cache on first use. Backend-specific behaviour (Oracle's index
//! statement, the unique-constraint statements) is chosen here, when the plan is
//! built, so the cache itself never branches on the backend.
//!
//! # Thread Safety
//!
//! A facade serves one snapshot operation driven by a single logical flow. It uses
//! interior mutability (`RefCell`) and is therefore neither `Sync` nor meant to be
//! shared; independent snapshots each create their own facade.

use crate::cache::{FetchStats, QueryCache, QueryKind};
use crate::dialect::{oracle_index_sql, unique_constraint_sql_for, Backend, ObjectKind, UniqueConstraintSql};
use crate::error::MetadataError;
use crate::identity::RowIdentity;
use crate::plan::{identity_from_fields, FetchPlan};
use crate::row::{CachedRow, RawRecord};
use crate::source::{DatabaseDialect, MetadataSource, StatementExecutor};
use std::cell::RefCell;
use std::collections::HashMap;

/// Table type used when foreign keys have to be collected table by table.
const BASE_TABLE_TYPE: &str = "TABLE";

/// Metadata operations backed by one [`QueryCache`] per query kind.
pub struct CachingMetadata<'c> {
    source: &'c dyn MetadataSource,
    executor: &'c dyn StatementExecutor,
    dialect: &'c dyn DatabaseDialect,
    backend: Backend,
    unique_constraint_sql: Option<UniqueConstraintSql>,
    caches: RefCell<HashMap<QueryKind, QueryCache>>,
}

impl<'c> CachingMetadata<'c> {
    /// Create a facade over the given collaborators.
    ///
    /// The unique-constraint statement builder is resolved once here from the
    /// backend reported by `dialect`.
    pub fn new(
        source: &'c dyn MetadataSource,
        executor: &'c dyn StatementExecutor,
        dialect: &'c dyn DatabaseDialect,
    ) -> Self {
        let backend = dialect.backend();
        let unique_constraint_sql = unique_constraint_sql_for(&backend);
        Self {
            source,
            executor,
            dialect,
            backend,
            unique_constraint_sql,
            caches: RefCell::new(HashMap::new()),
        }
    }

    /// Replace the unique-constraint statement builder.
    pub fn with_unique_constraint_sql(mut self, builder: UniqueConstraintSql) -> Self {
        self.unique_constraint_sql = Some(builder);
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn dialect(&self) -> &dyn DatabaseDialect {
        self.dialect
    }

    /// Whether [`Self::unique_constraints`] can run for this backend.
    pub fn supports_unique_constraints(&self) -> bool {
        self.unique_constraint_sql.is_some()
    }

    /// Backend call counters for one query kind.
    pub fn fetch_stats(&self, kind: &QueryKind) -> FetchStats {
        self.caches
            .borrow()
            .get(kind)
            .map(QueryCache::stats)
            .unwrap_or_default()
    }

    /// Backend call counters for every query kind used so far, ordered by kind name.
    pub fn fetch_report(&self) -> Vec<(QueryKind, FetchStats)> {
        let mut report: Vec<_> = self
            .caches
            .borrow()
            .iter()
            .map(|(kind, cache)| (kind.clone(), cache.stats()))
            .collect();
        report.sort_by_key(|(kind, _)| kind.to_string());
        report
    }

    /// Tables (or views, ...) of the given types.
    ///
    /// Each distinct list of `types` is its own query kind.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        types: &[&str],
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let types: Vec<String> = types.iter().map(|kind| kind.to_string()).collect();
        let source = self.source;
        let dialect = self.dialect;

        let plan = FetchPlan::exclusive(
            RowIdentity::new(catalog, schema, table, None),
            table_identity,
            Box::new(|wanted: &RowIdentity| {
                let table = wanted
                    .container
                    .as_deref()
                    .map(|name| dialect.correct_object_name(name, ObjectKind::Table));
                Ok(source.tables(
                    wanted.catalog.as_deref(),
                    wanted.schema.as_deref(),
                    table.as_deref(),
                    &types,
                )?)
            }),
            Some(Box::new(|catalog: Option<&str>, schema: Option<&str>| {
                Ok(source.tables(catalog, schema, None, &types)?)
            })),
        );
        self.run(QueryKind::Tables { types: types.clone() }, &plan)
    }

    /// Columns of a table, or one column when `column` is given.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let source = self.source;
        let plan = FetchPlan::exclusive(
            RowIdentity::new(catalog, schema, table, column),
            column_identity,
            Box::new(|wanted: &RowIdentity| {
                Ok(source.columns(
                    wanted.catalog.as_deref(),
                    wanted.schema.as_deref(),
                    wanted.container.as_deref(),
                    wanted.item.as_deref(),
                )?)
            }),
            Some(Box::new(|catalog: Option<&str>, schema: Option<&str>| {
                Ok(source.columns(catalog, schema, None, None)?)
            })),
        );
        self.run(QueryKind::Columns, &plan)
    }

    /// Primary key columns of a table; `pk_name` narrows to one named key.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        pk_name: Option<&str>,
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let source = self.source;
        let plan = FetchPlan::exclusive(
            RowIdentity::new(catalog, schema, table, pk_name),
            primary_key_identity,
            Box::new(|wanted: &RowIdentity| {
                Ok(source.primary_keys(
                    wanted.catalog.as_deref(),
                    wanted.schema.as_deref(),
                    wanted.container.as_deref(),
                )?)
            }),
            Some(Box::new(|catalog: Option<&str>, schema: Option<&str>| {
                Ok(source.primary_keys(catalog, schema, None)?)
            })),
        );
        self.run(QueryKind::PrimaryKeys, &plan)
    }

    /// Index columns of a table; `index` narrows to one index.
    ///
    /// Oracle is served from `ALL_IND_COLUMNS` instead of the standard index call.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        index: Option<&str>,
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let wanted = RowIdentity::new(catalog, schema, table, index);
        let plan = match self.backend {
            Backend::Oracle => {
                let executor = self.executor;
                let dialect = self.dialect;
                FetchPlan::exclusive(
                    wanted,
                    index_identity,
                    Box::new(move |wanted: &RowIdentity| {
                        let owner = wanted.catalog.as_deref().or(wanted.schema.as_deref());
                        let sql = oracle_index_sql(
                            dialect,
                            owner,
                            wanted.container.as_deref(),
                            wanted.item.as_deref(),
                        );
                        Ok(executor.query(&sql)?)
                    }),
                    Some(Box::new(move |catalog: Option<&str>, schema: Option<&str>| {
                        let sql = oracle_index_sql(dialect, catalog.or(schema), None, None);
                        Ok(executor.query(&sql)?)
                    })),
                )
            }
            _ => {
                let source = self.source;
                FetchPlan::exclusive(
                    wanted,
                    index_identity,
                    Box::new(move |wanted: &RowIdentity| {
                        Ok(source.index_info(
                            wanted.catalog.as_deref(),
                            wanted.schema.as_deref(),
                            wanted.container.as_deref(),
                        )?)
                    }),
                    Some(Box::new(move |catalog: Option<&str>, schema: Option<&str>| {
                        Ok(source.index_info(catalog, schema, None)?)
                    })),
                )
            }
        };
        self.run(QueryKind::IndexInfo, &plan)
    }

    /// Unique constraints of a table; `name` narrows to one constraint.
    ///
    /// Runs backend-specific statement text. Fails with
    /// [`MetadataError::UnsupportedBackend`] when no statement is known.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn unique_constraints(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let build_sql = self
            .unique_constraint_sql
            .ok_or_else(|| MetadataError::UnsupportedBackend {
                backend: self.backend.clone(),
                capability: "unique constraint listing",
            })?;
        let executor = self.executor;
        let dialect = self.dialect;

        let plan = FetchPlan::exclusive(
            RowIdentity::new(catalog, schema, table, name),
            unique_constraint_identity,
            Box::new(move |wanted: &RowIdentity| {
                let sql = build_sql(
                    dialect,
                    wanted.catalog.as_deref(),
                    wanted.schema.as_deref(),
                    wanted.container.as_deref(),
                );
                Ok(executor.query(&sql)?)
            }),
            Some(Box::new(move |catalog: Option<&str>, schema: Option<&str>| {
                Ok(executor.query(&build_sql(dialect, catalog, schema, None))?)
            })),
        );
        self.run(QueryKind::UniqueConstraints, &plan)
    }

    /// Foreign keys declared on a table; `fk_name` narrows to one key.
    ///
    /// Without a table, every base table in the scope is listed and its foreign
    /// keys are collected one table at a time.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn foreign_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        fk_name: Option<&str>,
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let plan = FetchPlan::accumulating(
            RowIdentity::new(catalog, schema, table, fk_name),
            foreign_key_identity,
            Box::new(|wanted: &RowIdentity| self.imported_keys_for(wanted)),
        );
        self.run(QueryKind::ForeignKeys, &plan)
    }

    fn imported_keys_for(&self, wanted: &RowIdentity) -> Result<Vec<RawRecord>, MetadataError> {
        let catalog = wanted.catalog.as_deref();
        let schema = wanted.schema.as_deref();
        let tables = match wanted.container.as_deref() {
            Some(table) => vec![table.to_string()],
            None => self
                .tables(catalog, schema, None, &[BASE_TABLE_TYPE])?
                .iter()
                .filter_map(|row| row.get_string("TABLE_NAME"))
                .collect(),
        };

        let mut records = Vec::new();
        for table in &tables {
            records.extend(self.source.imported_keys(catalog, schema, table)?);
        }
        Ok(records)
    }

    /// Runs `plan` against the cache for `kind`.
    ///
    /// The cache is taken out of the map while the plan runs so plans may call back
    /// into the facade for other kinds.
    fn run(&self, kind: QueryKind, plan: &FetchPlan<'_>) -> Result<Vec<CachedRow>, MetadataError> {
        let mut cache = self
            .caches
            .borrow_mut()
            .remove(&kind)
            .unwrap_or_else(|| QueryCache::new(kind.clone()));
        let result = cache.get(plan, self.dialect);
        self.caches.borrow_mut().insert(kind, cache);
        result
    }
}

fn table_identity(row: &CachedRow) -> RowIdentity {
    identity_from_fields(row, "TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", None)
}

fn column_identity(row: &CachedRow) -> RowIdentity {
    identity_from_fields(row, "TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", Some("COLUMN_NAME"))
}

fn primary_key_identity(row: &CachedRow) -> RowIdentity {
    identity_from_fields(row, "TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", Some("PK_NAME"))
}

fn index_identity(row: &CachedRow) -> RowIdentity {
    identity_from_fields(row, "TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", Some("INDEX_NAME"))
}

fn unique_constraint_identity(row: &CachedRow) -> RowIdentity {
    identity_from_fields(
        row,
        "TABLE_CAT",
        "TABLE_SCHEM",
        "TABLE_NAME",
        Some("CONSTRAINT_NAME"),
    )
}

fn foreign_key_identity(row: &CachedRow) -> RowIdentity {
    identity_from_fields(
        row,
        "FKTABLE_CAT",
        "FKTABLE_SCHEM",
        "FKTABLE_NAME",
        Some("FK_NAME"),
    )
}
