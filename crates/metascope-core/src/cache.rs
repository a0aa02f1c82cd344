//! Per-query-kind row cache and fast/bulk dispatcher.
//!
//! # Architecture
//!
//! One [`QueryCache`] exists per [`QueryKind`] for the lifetime of one snapshot. It
//! keeps every row fetched so far, in insertion order, together with the bookkeeping
//! needed to decide how to answer the next request:
//!
//! - the distinct `(catalog, schema, container)` triples requested so far, which
//!   drive the switch from narrow to bulk fetching;
//! - the scopes already bulk-fetched (a bulk fetch is never repeated for a scope);
//! - the requests already answered by a narrow fetch.
//!
//! Whatever strategy was used, the rows returned for a request are the stored rows
//! whose identity matches it, so bulk fetching only ever changes the number of
//! backend calls.
//!
//! # Thread Safety
//!
//! `QueryCache` is designed for single-threaded use within one snapshot.

use crate::error::MetadataError;
use crate::identity::{matches, ContainerKey, RowIdentity, ScopeKey};
use crate::plan::FetchPlan;
use crate::row::{CachedRow, RawRecord};
use crate::source::DatabaseDialect;
use std::collections::HashSet;
use std::fmt;
#[cfg(feature = "tracing")]
use tracing::debug;

/// A metadata query kind; each kind gets its own cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Tables restricted to the given table types. Different type lists never
    /// share rows.
    Tables { types: Vec<String> },
    Columns,
    PrimaryKeys,
    IndexInfo,
    UniqueConstraints,
    ForeignKeys,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Tables { types } => write!(f, "getTables.{}", types.join(":")),
            QueryKind::Columns => f.write_str("getColumns"),
            QueryKind::PrimaryKeys => f.write_str("getPrimaryKeys"),
            QueryKind::IndexInfo => f.write_str("getIndexInfo"),
            QueryKind::UniqueConstraints => f.write_str("getUniqueConstraints"),
            QueryKind::ForeignKeys => f.write_str("getImportedKeys"),
        }
    }
}

/// Backend call counters for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Narrow fetches issued.
    pub fast_fetches: usize,
    /// Bulk fetches issued.
    pub bulk_fetches: usize,
    /// Requests answered without any backend call.
    pub cache_hits: usize,
}

impl FetchStats {
    /// Total number of backend calls.
    pub fn backend_calls(&self) -> usize {
        self.fast_fetches + self.bulk_fetches
    }
}

/// Cached rows and fetch bookkeeping for one query kind.
#[derive(Debug)]
pub struct QueryCache {
    kind: QueryKind,
    rows: Vec<CachedRow>,
    seen_containers: HashSet<ContainerKey>,
    bulk_scopes: Vec<ScopeKey>,
    answered: Vec<RowIdentity>,
    stats: FetchStats,
}

impl QueryCache {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            seen_containers: HashSet::new(),
            bulk_scopes: Vec::new(),
            answered: Vec::new(),
            stats: FetchStats::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_seen_containers(count: usize) -> Self {
        let mut cache = Self::new(QueryKind::Columns);
        for index in 0..count {
            let container = format!("t{index}");
            cache
                .seen_containers
                .insert(RowIdentity::new(None, None, Some(&container), None).container_key());
        }
        cache
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Every row stored so far, in insertion order.
    pub fn rows(&self) -> &[CachedRow] {
        &self.rows
    }

    /// Number of distinct `(catalog, schema, container)` triples requested so far.
    pub fn seen_container_count(&self) -> usize {
        self.seen_containers.len()
    }

    /// Whether a bulk fetch has been performed for any scope.
    pub fn bulk_done(&self) -> bool {
        !self.bulk_scopes.is_empty()
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Answer a request described by `plan`.
    ///
    /// Runs at most one fetch (bulk or narrow) and returns the stored rows whose
    /// identity matches the plan's wanted identity, in insertion order. Fetch errors
    /// are returned unchanged and leave previously stored rows in place.
    pub fn get(
        &mut self,
        plan: &FetchPlan<'_>,
        dialect: &dyn DatabaseDialect,
    ) -> Result<Vec<CachedRow>, MetadataError> {
        let wanted = plan.wanted();

        if self.is_answered(wanted, dialect) {
            self.stats.cache_hits += 1;
            #[cfg(feature = "tracing")]
            debug!(kind = %self.kind, wanted = %wanted, "served from cache");
        } else {
            self.seen_containers.insert(wanted.container_key());
            let bulk = if plan.prefers_bulk(self) {
                plan.bulk_fetch()
            } else {
                None
            };

            match bulk {
                Some(result) => {
                    self.stats.bulk_fetches += 1;
                    let _added = self.store(result?);
                    self.bulk_scopes.push(wanted.scope());
                    #[cfg(feature = "tracing")]
                    debug!(
                        kind = %self.kind,
                        catalog = ?wanted.catalog,
                        schema = ?wanted.schema,
                        rows = _added,
                        "bulk fetch"
                    );
                }
                None => {
                    self.stats.fast_fetches += 1;
                    let _added = self.store(plan.fast_fetch()?);
                    self.answered.push(wanted.clone());
                    #[cfg(feature = "tracing")]
                    debug!(kind = %self.kind, wanted = %wanted, rows = _added, "fast fetch");
                }
            }
        }

        Ok(self
            .rows
            .iter()
            .filter(|row| matches(wanted, &plan.row_identity(row), dialect))
            .cloned()
            .collect())
    }

    fn is_answered(&self, wanted: &RowIdentity, dialect: &dyn DatabaseDialect) -> bool {
        let same = |left: &Option<String>, right: &Option<String>| match (left, right) {
            (None, None) => true,
            (Some(left), Some(right)) => dialect.identifiers_equal(left, right),
            _ => false,
        };
        self.bulk_scopes
            .iter()
            .any(|scope| same(&scope.catalog, &wanted.catalog) && same(&scope.schema, &wanted.schema))
            || self
                .answered
                .iter()
                .any(|previous| previous.covers(wanted, dialect))
    }

    /// Stores rows not already present from an earlier fetch; returns how many were added.
    fn store(&mut self, records: Vec<RawRecord>) -> usize {
        let known: HashSet<&CachedRow> = self.rows.iter().collect();
        let fresh: Vec<CachedRow> = records
            .into_iter()
            .map(CachedRow::from_record)
            .filter(|row| !known.contains(row))
            .collect();
        let added = fresh.len();
        self.rows.extend(fresh);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Backend, StandardDialect};
    use crate::error::TransportError;
    use crate::plan::identity_from_fields;
    use crate::record;
    use std::cell::Cell;

    fn column_identity(row: &CachedRow) -> RowIdentity {
        identity_from_fields(
            row,
            "TABLE_CAT",
            "TABLE_SCHEM",
            "TABLE_NAME",
            Some("COLUMN_NAME"),
        )
    }

    fn column(table: &str, column: &str) -> RawRecord {
        record! {
            "TABLE_CAT" => "C",
            "TABLE_SCHEM" => "S",
            "TABLE_NAME" => table,
            "COLUMN_NAME" => column,
        }
    }

    #[test]
    fn test_query_kind_display() {
        let tables = QueryKind::Tables {
            types: vec!["TABLE".to_string(), "VIEW".to_string()],
        };
        assert_eq!(tables.to_string(), "getTables.TABLE:VIEW");
        assert_eq!(QueryKind::ForeignKeys.to_string(), "getImportedKeys");
    }

    #[test]
    fn test_repeated_request_is_served_from_cache() {
        let dialect = StandardDialect::new(Backend::Postgres);
        let calls = Cell::new(0);
        let mut cache = QueryCache::new(QueryKind::Columns);
        let wanted = RowIdentity::new(Some("C"), Some("S"), Some("orders"), None);

        for _ in 0..3 {
            let plan = FetchPlan::exclusive(
                wanted.clone(),
                column_identity,
                Box::new(|_: &RowIdentity| {
                    calls.set(calls.get() + 1);
                    Ok(vec![column("orders", "id"), column("orders", "total")])
                }),
                None,
            );
            let rows = cache.get(&plan, &dialect).expect("fetch");
            assert_eq!(rows.len(), 2);
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats().cache_hits, 2);
    }

    #[test]
    fn test_narrower_request_reuses_wider_fetch() {
        let dialect = StandardDialect::new(Backend::Postgres);
        let calls = Cell::new(0);
        let mut cache = QueryCache::new(QueryKind::Columns);
        let fast = |_: &RowIdentity| {
            calls.set(calls.get() + 1);
            Ok(vec![column("orders", "id"), column("orders", "total")])
        };

        let table = FetchPlan::exclusive(
            RowIdentity::new(Some("C"), Some("S"), Some("orders"), None),
            column_identity,
            Box::new(fast),
            None,
        );
        cache.get(&table, &dialect).expect("fetch table");

        let single = FetchPlan::exclusive(
            RowIdentity::new(Some("C"), Some("S"), Some("orders"), Some("total")),
            column_identity,
            Box::new(fast),
            None,
        );
        let rows = cache.get(&single, &dialect).expect("fetch column");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_string("COLUMN_NAME").as_deref(), Some("total"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_overlapping_fetches_do_not_duplicate_rows() {
        let dialect = StandardDialect::new(Backend::Postgres);
        let mut cache = QueryCache::new(QueryKind::Columns);

        let single = FetchPlan::exclusive(
            RowIdentity::new(Some("C"), Some("S"), Some("orders"), Some("id")),
            column_identity,
            Box::new(|_: &RowIdentity| Ok(vec![column("orders", "id")])),
            None,
        );
        cache.get(&single, &dialect).expect("fetch column");

        let table = FetchPlan::exclusive(
            RowIdentity::new(Some("C"), Some("S"), Some("orders"), None),
            column_identity,
            Box::new(|_: &RowIdentity| Ok(vec![column("orders", "id"), column("orders", "total")])),
            None,
        );
        let rows = cache.get(&table, &dialect).expect("fetch table");
        assert_eq!(rows.len(), 2);
        assert_eq!(cache.rows().len(), 2);
    }

    #[test]
    fn test_failed_fetch_keeps_earlier_rows() {
        let dialect = StandardDialect::new(Backend::Postgres);
        let mut cache = QueryCache::new(QueryKind::Columns);

        let ok = FetchPlan::exclusive(
            RowIdentity::new(Some("C"), Some("S"), Some("orders"), None),
            column_identity,
            Box::new(|_: &RowIdentity| Ok(vec![column("orders", "id")])),
            None,
        );
        cache.get(&ok, &dialect).expect("first fetch");

        let failing = FetchPlan::exclusive(
            RowIdentity::new(Some("C"), Some("S"), Some("payments"), None),
            column_identity,
            Box::new(|_: &RowIdentity| {
                Err(MetadataError::from(TransportError::new("connection lost")))
            }),
            None,
        );
        let err = cache.get(&failing, &dialect).expect_err("second fetch fails");
        assert_eq!(err.to_string(), "connection lost");

        assert_eq!(cache.rows().len(), 1);
        let again = cache.get(&ok, &dialect).expect("cached");
        assert_eq!(again.len(), 1);
        assert_eq!(cache.stats().fast_fetches, 2);
    }

    #[test]
    fn test_bulk_switch_after_threshold() {
        let dialect = StandardDialect::new(Backend::Postgres);
        let fast_calls = Cell::new(0);
        let bulk_calls = Cell::new(0);
        let mut cache = QueryCache::new(QueryKind::Columns);
        let tables = ["orders", "customers", "payments", "invoices", "refunds"];

        for table in tables {
            let plan = FetchPlan::exclusive(
                RowIdentity::new(Some("C"), Some("S"), Some(table), None),
                column_identity,
                Box::new(|wanted: &RowIdentity| {
                    fast_calls.set(fast_calls.get() + 1);
                    let table = wanted.container.as_deref().unwrap_or_default();
                    Ok(vec![column(table, "id")])
                }),
                Some(Box::new(|_: Option<&str>, _: Option<&str>| {
                    bulk_calls.set(bulk_calls.get() + 1);
                    Ok(tables.iter().map(|table| column(table, "id")).collect())
                })),
            );
            let rows = cache.get(&plan, &dialect).expect("fetch");
            assert_eq!(rows.len(), 1, "{table}");
        }

        assert_eq!(fast_calls.get(), 3);
        assert_eq!(bulk_calls.get(), 1);
        assert!(cache.bulk_done());
        assert_eq!(cache.rows().len(), tables.len());
    }
}
