//! Row identities and request matching.
//!
//! A [`RowIdentity`] answers two questions with the same shape: "which object does
//! this row describe" and "which object was the caller asking about". A cached row
//! answers a request when [`matches`] holds for the pair.
//!
//! # Catalog/schema merging
//!
//! Some backends model a database as a catalog (MySQL), others as a schema
//! (Oracle, PostgreSQL rows without `TABLE_CAT`). When one side of a comparison
//! only carries one of the two levels, the two levels are treated as one
//! namespace:
//!
//! - wanted `(None, "shop")` matches row `("shop", None)` and vice versa;
//! - wanted `("db", "public")` matches row `(None, "public")`: the row has no
//!   catalog, so the schema decides.
//!
//! A row that carries both levels is compared slot to slot: wanted
//! `(None, "app")` does not match row `("app", "public")`. A row with neither
//! level never satisfies a namespaced request.

use crate::source::DatabaseDialect;
use std::fmt;

/// The `(catalog, schema, container, item)` tuple identifying a database object.
///
/// `container` is typically a table; `item` a column, index, key or constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RowIdentity {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub container: Option<String>,
    pub item: Option<String>,
}

impl RowIdentity {
    pub fn new(
        catalog: Option<&str>,
        schema: Option<&str>,
        container: Option<&str>,
        item: Option<&str>,
    ) -> Self {
        Self {
            catalog: catalog.map(str::to_string),
            schema: schema.map(str::to_string),
            container: container.map(str::to_string),
            item: item.map(str::to_string),
        }
    }

    /// Whether a fetch made for `self` already returned everything `narrower` can match.
    ///
    /// Unlike [`matches`] no catalog/schema merging applies: every slot `self`
    /// constrains must be constrained identically in `narrower`.
    pub fn covers(&self, narrower: &RowIdentity, dialect: &dyn DatabaseDialect) -> bool {
        let covered = |broad: &Option<String>, narrow: &Option<String>| match (broad, narrow) {
            (None, _) => true,
            (Some(broad), Some(narrow)) => dialect.identifiers_equal(broad, narrow),
            (Some(_), None) => false,
        };
        covered(&self.catalog, &narrower.catalog)
            && covered(&self.schema, &narrower.schema)
            && covered(&self.container, &narrower.container)
            && covered(&self.item, &narrower.item)
    }

    /// The `(catalog, schema)` scope this identity lives in.
    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
        }
    }

    /// The `(catalog, schema, container)` triple, used to count distinct containers.
    pub fn container_key(&self) -> ContainerKey {
        ContainerKey {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            container: self.container.clone(),
        }
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = |value: &Option<String>| value.clone().unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "{}.{}.{}.{}",
            slot(&self.catalog),
            slot(&self.schema),
            slot(&self.container),
            slot(&self.item)
        )
    }
}

/// A `(catalog, schema)` pair a bulk fetch was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

/// A `(catalog, schema, container)` triple a narrow fetch was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub container: Option<String>,
}

/// Whether `row` answers a request for `wanted`.
///
/// Every non-null slot of `wanted` must be equal to the row's slot under the
/// dialect's identifier equivalence, with catalog and schema merged as described
/// in the module docs. Null slots on `wanted` are always satisfied.
pub fn matches(wanted: &RowIdentity, row: &RowIdentity, dialect: &dyn DatabaseDialect) -> bool {
    namespace_matches(wanted, row, dialect)
        && slot_matches(wanted.container.as_deref(), row.container.as_deref(), dialect)
        && slot_matches(wanted.item.as_deref(), row.item.as_deref(), dialect)
}

fn slot_matches(wanted: Option<&str>, row: Option<&str>, dialect: &dyn DatabaseDialect) -> bool {
    match (wanted, row) {
        (None, _) => true,
        (Some(wanted), Some(row)) => dialect.identifiers_equal(wanted, row),
        (Some(_), None) => false,
    }
}

fn namespace_matches(wanted: &RowIdentity, row: &RowIdentity, dialect: &dyn DatabaseDialect) -> bool {
    level_matches(
        wanted.catalog.as_deref(),
        wanted.schema.as_deref(),
        row.catalog.as_deref(),
        row.schema.as_deref(),
        dialect,
    ) && level_matches(
        wanted.schema.as_deref(),
        wanted.catalog.as_deref(),
        row.schema.as_deref(),
        row.catalog.as_deref(),
        dialect,
    )
}

/// Checks one namespace level (`wanted`/`row`) given the other level on each side.
fn level_matches(
    wanted: Option<&str>,
    wanted_other: Option<&str>,
    row: Option<&str>,
    row_other: Option<&str>,
    dialect: &dyn DatabaseDialect,
) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    match (row, row_other) {
        // A row that names this level is compared slot to slot, never merged.
        (Some(row), _) => dialect.identifiers_equal(wanted, row),
        // The row lacks this level: a lone wanted namespace may sit in its other slot.
        (None, Some(row_other)) => match wanted_other {
            None => dialect.identifiers_equal(wanted, row_other),
            Some(_) => true,
        },
        (None, None) => false,
    }
}
