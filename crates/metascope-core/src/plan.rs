//! Fetch plans: how to run one metadata query kind.
//!
//! A [`FetchPlan`] is built per request and describes, without holding any state of
//! its own, how to derive row identities, how to fetch narrowly for the wanted
//! identity and (for exclusive plans) how to fetch a whole catalog/schema at once.
//! The [`crate::QueryCache`] decides which of the two fetches to run.

use crate::cache::QueryCache;
use crate::error::MetadataError;
use crate::identity::RowIdentity;
use crate::row::{CachedRow, RawRecord};

/// Number of distinct `(catalog, schema, container)` triples a cache must have seen
/// before an exclusive plan switches to a bulk fetch.
///
/// Observed behaviour rather than a measured optimum; treat it as a tunable.
pub const BULK_FETCH_THRESHOLD: usize = 3;

/// Derives the identity of a fetched row.
pub type RowIdentityFn = fn(&CachedRow) -> RowIdentity;

/// Narrow fetch for the wanted identity.
pub type FastFetch<'a> = Box<dyn Fn(&RowIdentity) -> Result<Vec<RawRecord>, MetadataError> + 'a>;

/// Wide fetch for an entire `(catalog, schema)` scope.
pub type BulkFetch<'a> =
    Box<dyn Fn(Option<&str>, Option<&str>) -> Result<Vec<RawRecord>, MetadataError> + 'a>;

/// Which answering discipline a plan follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// At most one fetch answers a given identity; bulk fallback allowed.
    Exclusive,
    /// One request may union rows from several underlying queries; never bulk.
    Accumulating,
}

/// Description of how to execute one metadata query kind.
pub struct FetchPlan<'a> {
    kind: PlanKind,
    wanted: RowIdentity,
    row_identity: RowIdentityFn,
    fast_fetch: FastFetch<'a>,
    bulk_fetch: Option<BulkFetch<'a>>,
}

impl<'a> FetchPlan<'a> {
    /// An exclusive plan; pass `None` for `bulk` when the kind has no wide fetch.
    pub fn exclusive(
        wanted: RowIdentity,
        row_identity: RowIdentityFn,
        fast_fetch: FastFetch<'a>,
        bulk_fetch: Option<BulkFetch<'a>>,
    ) -> Self {
        Self {
            kind: PlanKind::Exclusive,
            wanted,
            row_identity,
            fast_fetch,
            bulk_fetch,
        }
    }

    /// An accumulating plan. The fast fetch is responsible for enumerating and
    /// unioning whatever underlying queries the request needs.
    pub fn accumulating(
        wanted: RowIdentity,
        row_identity: RowIdentityFn,
        fast_fetch: FastFetch<'a>,
    ) -> Self {
        Self {
            kind: PlanKind::Accumulating,
            wanted,
            row_identity,
            fast_fetch,
            bulk_fetch: None,
        }
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn wanted(&self) -> &RowIdentity {
        &self.wanted
    }

    pub fn row_identity(&self, row: &CachedRow) -> RowIdentity {
        (self.row_identity)(row)
    }

    pub fn supports_bulk(&self) -> bool {
        self.bulk_fetch.is_some()
    }

    /// Whether the cache should switch to a bulk fetch for this request.
    pub fn prefers_bulk(&self, cache: &QueryCache) -> bool {
        match self.kind {
            PlanKind::Exclusive => {
                self.supports_bulk() && cache.seen_container_count() > BULK_FETCH_THRESHOLD
            }
            PlanKind::Accumulating => false,
        }
    }

    pub(crate) fn fast_fetch(&self) -> Result<Vec<RawRecord>, MetadataError> {
        (self.fast_fetch)(&self.wanted)
    }

    /// Runs the bulk fetch for the wanted scope; `None` when the plan has none.
    pub(crate) fn bulk_fetch(&self) -> Option<Result<Vec<RawRecord>, MetadataError>> {
        self.bulk_fetch.as_ref().map(|bulk| {
            bulk(
                self.wanted.catalog.as_deref(),
                self.wanted.schema.as_deref(),
            )
        })
    }
}

/// Identity of a row from the four named fields, any of which may be absent.
pub(crate) fn identity_from_fields(
    row: &CachedRow,
    catalog: &str,
    schema: &str,
    container: &str,
    item: Option<&str>,
) -> RowIdentity {
    RowIdentity {
        catalog: row.get_string(catalog),
        schema: row.get_string(schema),
        container: row.get_string(container),
        item: item.and_then(|field| row.get_string(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    fn table_identity(row: &CachedRow) -> RowIdentity {
        identity_from_fields(row, "TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", None)
    }

    #[test]
    fn test_accumulating_plan_never_prefers_bulk() {
        let plan = FetchPlan::accumulating(
            RowIdentity::default(),
            table_identity,
            Box::new(|_: &RowIdentity| Ok(Vec::new())),
        );
        let cache = QueryCache::with_seen_containers(10);
        assert_eq!(plan.kind(), PlanKind::Accumulating);
        assert!(!plan.supports_bulk());
        assert!(!plan.prefers_bulk(&cache));
        assert!(plan.bulk_fetch().is_none());
    }

    #[test]
    fn test_exclusive_plan_prefers_bulk_past_threshold() {
        let plan = FetchPlan::exclusive(
            RowIdentity::default(),
            table_identity,
            Box::new(|_: &RowIdentity| Ok(Vec::new())),
            Some(Box::new(|_: Option<&str>, _: Option<&str>| Ok(Vec::new()))),
        );
        assert!(!plan.prefers_bulk(&QueryCache::with_seen_containers(BULK_FETCH_THRESHOLD)));
        assert!(plan.prefers_bulk(&QueryCache::with_seen_containers(BULK_FETCH_THRESHOLD + 1)));
    }

    #[test]
    fn test_exclusive_plan_without_bulk() {
        let plan = FetchPlan::exclusive(
            RowIdentity::default(),
            table_identity,
            Box::new(|_: &RowIdentity| Ok(Vec::new())),
            None,
        );
        assert!(!plan.prefers_bulk(&QueryCache::with_seen_containers(10)));
    }

    #[test]
    fn test_bulk_fetch_receives_wanted_scope() {
        let wanted = RowIdentity::new(Some("C"), Some("S"), Some("ORDERS"), None);
        let plan = FetchPlan::exclusive(
            wanted,
            table_identity,
            Box::new(|_: &RowIdentity| Ok(Vec::new())),
            Some(Box::new(|catalog: Option<&str>, schema: Option<&str>| {
                Ok(vec![record! {
                    "TABLE_CAT" => catalog,
                    "TABLE_SCHEM" => schema,
                }])
            })),
        );
        let rows = plan.bulk_fetch().expect("bulk supported").expect("bulk ok");
        let row = CachedRow::from_record(rows.into_iter().next().expect("one row"));
        assert_eq!(row.get_string("TABLE_CAT").as_deref(), Some("C"));
        assert_eq!(row.get_string("TABLE_SCHEM").as_deref(), Some("S"));
    }

    #[test]
    fn test_identity_from_fields() {
        let row = CachedRow::from_record(record! {
            "TABLE_CAT" => "C",
            "TABLE_SCHEM" => "S",
            "TABLE_NAME" => "ORDERS",
            "COLUMN_NAME" => "ID",
        });
        let identity = identity_from_fields(
            &row,
            "TABLE_CAT",
            "TABLE_SCHEM",
            "TABLE_NAME",
            Some("COLUMN_NAME"),
        );
        assert_eq!(identity, RowIdentity::new(Some("C"), Some("S"), Some("ORDERS"), Some("ID")));
    }
}
