//! Schema snapshot assembly.
//!
//! [`SnapshotBuilder`] walks a [`CachingMetadata`] facade table by table and folds
//! the raw metadata rows into serializable structures. Because every per-table
//! request goes through the facade, large schemas automatically switch to bulk
//! fetching after the first few tables.

use crate::error::MetadataError;
use crate::facade::CachingMetadata;
use crate::row::CachedRow;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Table types listed when a scope names none.
pub const DEFAULT_TABLE_TYPES: &[&str] = &["TABLE", "VIEW"];

/// What to capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotScope {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    /// Restrict the snapshot to these tables; empty captures every table.
    pub tables: Vec<String>,
    /// Table types to list; empty means [`DEFAULT_TABLE_TYPES`].
    pub types: Vec<String>,
}

impl SnapshotScope {
    pub fn new(catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self {
            catalog: catalog.map(str::to_string),
            schema: schema.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    fn table_types(&self) -> Vec<&str> {
        if self.types.is_empty() {
            DEFAULT_TABLE_TYPES.to_vec()
        } else {
            self.types.iter().map(String::as_str).collect()
        }
    }
}

/// Structural metadata for a set of tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    /// Backend the snapshot was taken from, e.g. `postgresql`.
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub tables: Vec<TableSnapshot>,
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|table| table.columns.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    /// Table type as reported by the backend (`TABLE`, `VIEW`, ...).
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub columns: Vec<ColumnSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKeySnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeySnapshot>,
}

impl TableSnapshot {
    pub fn column(&self, name: &str) -> Option<&ColumnSnapshot> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKeySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Key columns in `KEY_SEQ` order.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub name: String,
    pub unique: bool,
    /// Indexed columns in `ORDINAL_POSITION` order.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Referencing columns in `KEY_SEQ` order.
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
}

/// Action taken on the referencing rows when the referenced key changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    NoAction,
    SetDefault,
}

impl ReferentialAction {
    /// Decode the numeric `UPDATE_RULE`/`DELETE_RULE` codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Cascade),
            1 => Some(Self::Restrict),
            2 => Some(Self::SetNull),
            3 => Some(Self::NoAction),
            4 => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// Builds a [`SchemaSnapshot`] through a caching facade.
pub struct SnapshotBuilder<'m, 'c> {
    metadata: &'m CachingMetadata<'c>,
}

impl<'m, 'c> SnapshotBuilder<'m, 'c> {
    pub fn new(metadata: &'m CachingMetadata<'c>) -> Self {
        Self { metadata }
    }

    /// Capture every table in `scope`.
    ///
    /// Unique constraints are left empty when the backend cannot list them; any
    /// other failure aborts the snapshot.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub fn capture(&self, scope: &SnapshotScope) -> Result<SchemaSnapshot, MetadataError> {
        let types = scope.table_types();
        let catalog = scope.catalog.as_deref();
        let schema = scope.schema.as_deref();

        let table_rows = if scope.tables.is_empty() {
            self.metadata.tables(catalog, schema, None, &types)?
        } else {
            let mut rows = Vec::new();
            for name in &scope.tables {
                rows.extend(self.metadata.tables(catalog, schema, Some(name), &types)?);
            }
            rows
        };

        #[cfg(feature = "tracing")]
        self.note_capabilities();

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            if let Some(table) = self.capture_table(row)? {
                tables.push(table);
            }
        }

        Ok(SchemaSnapshot {
            backend: self.metadata.backend().to_string(),
            catalog: scope.catalog.clone(),
            schema: scope.schema.clone(),
            tables,
        })
    }

    #[cfg(feature = "tracing")]
    fn note_capabilities(&self) {
        if !self.metadata.supports_unique_constraints() {
            tracing::info!(
                backend = %self.metadata.backend(),
                "unique constraints are not listed for this backend"
            );
        }
    }

    fn capture_table(&self, row: &CachedRow) -> Result<Option<TableSnapshot>, MetadataError> {
        let Some(name) = row.get_string("TABLE_NAME") else {
            return Ok(None);
        };
        let catalog = row.get_string("TABLE_CAT");
        let schema = row.get_string("TABLE_SCHEM");
        let (cat, sch, table) = (catalog.as_deref(), schema.as_deref(), Some(name.as_str()));

        let columns = self.metadata.columns(cat, sch, table, None)?;
        let primary_key = self.metadata.primary_keys(cat, sch, table, None)?;
        let indexes = self.metadata.index_info(cat, sch, table, None)?;
        let unique_constraints = if self.metadata.supports_unique_constraints() {
            self.metadata.unique_constraints(cat, sch, table, None)?
        } else {
            Vec::new()
        };
        let foreign_keys = self.metadata.foreign_keys(cat, sch, table, None)?;

        Ok(Some(TableSnapshot {
            kind: row
                .get_string("TABLE_TYPE")
                .unwrap_or_else(|| "TABLE".to_string()),
            remarks: row.get_string("REMARKS").filter(|remarks| !remarks.is_empty()),
            columns: fold_columns(&columns),
            primary_key: fold_primary_key(&primary_key),
            indexes: fold_indexes(&indexes),
            unique_constraints: fold_unique_constraints(&unique_constraints),
            foreign_keys: fold_foreign_keys(&foreign_keys),
            catalog,
            schema,
            name,
        }))
    }
}

fn fold_columns(rows: &[CachedRow]) -> Vec<ColumnSnapshot> {
    let mut columns: Vec<ColumnSnapshot> = rows
        .iter()
        .filter_map(|row| {
            let name = row.get_string("COLUMN_NAME")?;
            let nullable = match row.get::<i64>("NULLABLE") {
                Some(flag) => flag != 0,
                None => row.get::<bool>("IS_NULLABLE").unwrap_or(true),
            };
            Some(ColumnSnapshot {
                name,
                data_type: row.get_string("TYPE_NAME"),
                size: row.get("COLUMN_SIZE"),
                nullable,
                default_value: row.get_string("COLUMN_DEF"),
                auto_increment: row.get("IS_AUTOINCREMENT").unwrap_or(false),
                position: row.get("ORDINAL_POSITION"),
            })
        })
        .collect();
    columns.sort_by_key(|column| column.position.unwrap_or(i64::MAX));
    columns
}

fn fold_primary_key(rows: &[CachedRow]) -> Option<PrimaryKeySnapshot> {
    let mut keyed: Vec<(i64, String)> = rows
        .iter()
        .filter_map(|row| Some((row.get("KEY_SEQ").unwrap_or(0), row.get_string("COLUMN_NAME")?)))
        .collect();
    if keyed.is_empty() {
        return None;
    }
    keyed.sort_by_key(|(seq, _)| *seq);
    Some(PrimaryKeySnapshot {
        name: rows.iter().find_map(|row| row.get_string("PK_NAME")),
        columns: keyed.into_iter().map(|(_, column)| column).collect(),
    })
}

fn fold_indexes(rows: &[CachedRow]) -> Vec<IndexSnapshot> {
    let mut grouped: IndexMap<String, (bool, Vec<(i64, String)>)> = IndexMap::new();
    for row in rows {
        // Table statistics rows carry no index name.
        let Some(name) = row.get_string("INDEX_NAME") else {
            continue;
        };
        let unique = !row.get::<bool>("NON_UNIQUE").unwrap_or(false);
        let entry = grouped.entry(name).or_insert_with(|| (unique, Vec::new()));
        if let Some(column) = row.get_string("COLUMN_NAME") {
            entry
                .1
                .push((row.get("ORDINAL_POSITION").unwrap_or(0), column));
        }
    }
    grouped
        .into_iter()
        .map(|(name, (unique, mut columns))| {
            columns.sort_by_key(|(position, _)| *position);
            IndexSnapshot {
                name,
                unique,
                columns: columns.into_iter().map(|(_, column)| column).collect(),
            }
        })
        .collect()
}

fn fold_unique_constraints(rows: &[CachedRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in rows.iter().filter_map(|row| row.get_string("CONSTRAINT_NAME")) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn fold_foreign_keys(rows: &[CachedRow]) -> Vec<ForeignKeySnapshot> {
    struct Pending {
        key: ForeignKeySnapshot,
        pairs: Vec<(i64, String, String)>,
    }

    let mut grouped: IndexMap<(Option<String>, String), Pending> = IndexMap::new();
    for row in rows {
        let Some(referenced_table) = row.get_string("PKTABLE_NAME") else {
            continue;
        };
        let name = row.get_string("FK_NAME");
        let pending = grouped
            .entry((name.clone(), referenced_table.clone()))
            .or_insert_with(|| Pending {
                key: ForeignKeySnapshot {
                    name,
                    columns: Vec::new(),
                    referenced_catalog: row.get_string("PKTABLE_CAT"),
                    referenced_schema: row.get_string("PKTABLE_SCHEM"),
                    referenced_table,
                    referenced_columns: Vec::new(),
                    on_update: row.get("UPDATE_RULE").and_then(ReferentialAction::from_code),
                    on_delete: row.get("DELETE_RULE").and_then(ReferentialAction::from_code),
                },
                pairs: Vec::new(),
            });
        if let (Some(column), Some(referenced)) =
            (row.get_string("FKCOLUMN_NAME"), row.get_string("PKCOLUMN_NAME"))
        {
            pending
                .pairs
                .push((row.get("KEY_SEQ").unwrap_or(0), column, referenced));
        }
    }

    grouped
        .into_values()
        .map(|mut pending| {
            pending.pairs.sort_by_key(|(seq, _, _)| *seq);
            for (_, column, referenced) in pending.pairs {
                pending.key.columns.push(column);
                pending.key.referenced_columns.push(referenced);
            }
            pending.key
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    fn rows(records: Vec<crate::RawRecord>) -> Vec<CachedRow> {
        records.into_iter().map(CachedRow::from_record).collect()
    }

    #[test]
    fn test_indexes_grouped_by_name_in_ordinal_order() {
        let indexes = fold_indexes(&rows(vec![
            record! { "INDEX_NAME" => "IX_NAME", "NON_UNIQUE" => true, "COLUMN_NAME" => "LAST", "ORDINAL_POSITION" => 2 },
            record! { "INDEX_NAME" => None::<String>, "TYPE" => 0 },
            record! { "INDEX_NAME" => "PK_ORDERS", "NON_UNIQUE" => false, "COLUMN_NAME" => "ID", "ORDINAL_POSITION" => 1 },
            record! { "INDEX_NAME" => "IX_NAME", "NON_UNIQUE" => true, "COLUMN_NAME" => "FIRST", "ORDINAL_POSITION" => 1 },
        ]));
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].name, "IX_NAME");
        assert!(!indexes[0].unique);
        assert_eq!(indexes[0].columns, vec!["FIRST", "LAST"]);
        assert_eq!(indexes[1].name, "PK_ORDERS");
        assert!(indexes[1].unique);
    }

    #[test]
    fn test_foreign_keys_grouped_in_key_sequence() {
        let keys = fold_foreign_keys(&rows(vec![
            record! {
                "FK_NAME" => "FK_LINE_ORDER",
                "FKCOLUMN_NAME" => "ORDER_REGION",
                "PKTABLE_NAME" => "ORDERS",
                "PKCOLUMN_NAME" => "REGION",
                "KEY_SEQ" => 2,
                "DELETE_RULE" => 0,
            },
            record! {
                "FK_NAME" => "FK_LINE_ORDER",
                "FKCOLUMN_NAME" => "ORDER_ID",
                "PKTABLE_NAME" => "ORDERS",
                "PKCOLUMN_NAME" => "ID",
                "KEY_SEQ" => 1,
                "DELETE_RULE" => 0,
            },
        ]));
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].columns, vec!["ORDER_ID", "ORDER_REGION"]);
        assert_eq!(keys[0].referenced_columns, vec!["ID", "REGION"]);
        assert_eq!(keys[0].on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(keys[0].on_update, None);
    }

    #[test]
    fn test_primary_key_ordered_by_key_seq() {
        let key = fold_primary_key(&rows(vec![
            record! { "COLUMN_NAME" => "B", "KEY_SEQ" => 2, "PK_NAME" => "PK_T" },
            record! { "COLUMN_NAME" => "A", "KEY_SEQ" => 1, "PK_NAME" => "PK_T" },
        ]))
        .expect("primary key");
        assert_eq!(key.name.as_deref(), Some("PK_T"));
        assert_eq!(key.columns, vec!["A", "B"]);
        assert!(fold_primary_key(&[]).is_none());
    }

    #[test]
    fn test_columns_follow_ordinal_position() {
        let columns = fold_columns(&rows(vec![
            record! { "COLUMN_NAME" => "NAME", "TYPE_NAME" => "VARCHAR", "NULLABLE" => 1, "ORDINAL_POSITION" => 2 },
            record! { "COLUMN_NAME" => "ID", "TYPE_NAME" => "INTEGER", "NULLABLE" => 0, "ORDINAL_POSITION" => 1, "IS_AUTOINCREMENT" => "YES" },
        ]));
        assert_eq!(columns[0].name, "ID");
        assert!(!columns[0].nullable);
        assert!(columns[0].auto_increment);
        assert_eq!(columns[1].data_type.as_deref(), Some("VARCHAR"));
        assert!(columns[1].nullable);
    }

    #[test]
    fn test_scope_defaults_to_tables_and_views() {
        let scope = SnapshotScope::new(None, Some("public"));
        assert_eq!(scope.table_types(), vec!["TABLE", "VIEW"]);
        let scope = scope.with_types(["VIEW"]);
        assert_eq!(scope.table_types(), vec!["VIEW"]);
    }
}
