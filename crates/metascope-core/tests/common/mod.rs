#![allow(dead_code)]

use metascope_core::{
    record, MetadataSource, RawRecord, StatementExecutor, TransportError, Value,
};
use std::cell::RefCell;

/// A backend call observed by [`FakeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Tables {
        table: Option<String>,
        types: Vec<String>,
    },
    Columns {
        table: Option<String>,
        column: Option<String>,
    },
    PrimaryKeys {
        table: Option<String>,
    },
    IndexInfo {
        table: Option<String>,
    },
    ImportedKeys {
        table: String,
    },
    Query(String),
}

/// In-memory metadata source that records every call it receives.
///
/// Filters compare names exactly, like a catalog storing folded identifiers.
/// A null namespace field on a record passes any namespace filter.
#[derive(Debug, Default)]
pub struct FakeSource {
    pub tables: Vec<RawRecord>,
    pub columns: Vec<RawRecord>,
    pub primary_keys: Vec<RawRecord>,
    pub index_info: Vec<RawRecord>,
    pub imported_keys: Vec<RawRecord>,
    /// Rows returned by every literal statement.
    pub statement_rows: Vec<RawRecord>,
    calls: RefCell<Vec<Call>>,
}

impl FakeSource {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

fn text<'r>(record: &'r RawRecord, field: &str) -> Option<&'r str> {
    record.iter().find_map(|(name, value)| match value {
        Value::Text(text) if name.eq_ignore_ascii_case(field) => Some(text.as_str()),
        _ => None,
    })
}

fn passes(record: &RawRecord, field: &str, wanted: Option<&str>) -> bool {
    match (wanted, text(record, field)) {
        (None, _) | (Some(_), None) => true,
        (Some(wanted), Some(actual)) => wanted == actual,
    }
}

fn strict(record: &RawRecord, field: &str, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => text(record, field) == Some(wanted),
    }
}

fn select(
    records: &[RawRecord],
    prefix: &str,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> Vec<RawRecord> {
    records
        .iter()
        .filter(|record| {
            passes(record, &format!("{prefix}TABLE_CAT"), catalog)
                && passes(record, &format!("{prefix}TABLE_SCHEM"), schema)
                && strict(record, &format!("{prefix}TABLE_NAME"), table)
        })
        .cloned()
        .collect()
}

impl MetadataSource for FakeSource {
    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        types: &[String],
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.record(Call::Tables {
            table: table.map(str::to_string),
            types: types.to_vec(),
        });
        Ok(select(&self.tables, "", catalog, schema, table)
            .into_iter()
            .filter(|record| {
                types.is_empty()
                    || text(record, "TABLE_TYPE").is_some_and(|kind| types.iter().any(|t| t == kind))
            })
            .collect())
    }

    fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.record(Call::Columns {
            table: table.map(str::to_string),
            column: column.map(str::to_string),
        });
        Ok(select(&self.columns, "", catalog, schema, table)
            .into_iter()
            .filter(|record| strict(record, "COLUMN_NAME", column))
            .collect())
    }

    fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.record(Call::PrimaryKeys {
            table: table.map(str::to_string),
        });
        Ok(select(&self.primary_keys, "", catalog, schema, table))
    }

    fn index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.record(Call::IndexInfo {
            table: table.map(str::to_string),
        });
        Ok(select(&self.index_info, "", catalog, schema, table))
    }

    fn imported_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<RawRecord>, TransportError> {
        self.record(Call::ImportedKeys {
            table: table.to_string(),
        });
        Ok(select(&self.imported_keys, "FK", catalog, schema, Some(table)))
    }
}

impl StatementExecutor for FakeSource {
    fn query(&self, sql: &str) -> Result<Vec<RawRecord>, TransportError> {
        self.record(Call::Query(sql.to_string()));
        Ok(self.statement_rows.clone())
    }
}

pub fn table(catalog: Option<&str>, schema: Option<&str>, name: &str, kind: &str) -> RawRecord {
    record! {
        "TABLE_CAT" => catalog,
        "TABLE_SCHEM" => schema,
        "TABLE_NAME" => name,
        "TABLE_TYPE" => kind,
        "REMARKS" => None::<String>,
    }
}

pub fn column(
    catalog: Option<&str>,
    schema: Option<&str>,
    table: &str,
    name: &str,
    position: i64,
) -> RawRecord {
    record! {
        "TABLE_CAT" => catalog,
        "TABLE_SCHEM" => schema,
        "TABLE_NAME" => table,
        "COLUMN_NAME" => name,
        "TYPE_NAME" => "INTEGER",
        "NULLABLE" => 1,
        "ORDINAL_POSITION" => position,
    }
}

pub fn primary_key(schema: Option<&str>, table: &str, column: &str, name: &str) -> RawRecord {
    record! {
        "TABLE_CAT" => None::<String>,
        "TABLE_SCHEM" => schema,
        "TABLE_NAME" => table,
        "COLUMN_NAME" => column,
        "KEY_SEQ" => 1,
        "PK_NAME" => name,
    }
}

pub fn index_column(
    schema: Option<&str>,
    table: &str,
    index: &str,
    column: &str,
    position: i64,
    unique: bool,
) -> RawRecord {
    record! {
        "TABLE_CAT" => None::<String>,
        "TABLE_SCHEM" => schema,
        "TABLE_NAME" => table,
        "INDEX_NAME" => index,
        "NON_UNIQUE" => !unique,
        "COLUMN_NAME" => column,
        "ORDINAL_POSITION" => position,
    }
}

pub fn foreign_key(
    schema: Option<&str>,
    table: &str,
    name: &str,
    column: &str,
    referenced_table: &str,
    referenced_column: &str,
) -> RawRecord {
    record! {
        "PKTABLE_CAT" => None::<String>,
        "PKTABLE_SCHEM" => schema,
        "PKTABLE_NAME" => referenced_table,
        "PKCOLUMN_NAME" => referenced_column,
        "FKTABLE_CAT" => None::<String>,
        "FKTABLE_SCHEM" => schema,
        "FKTABLE_NAME" => table,
        "FKCOLUMN_NAME" => column,
        "KEY_SEQ" => 1,
        "UPDATE_RULE" => 3,
        "DELETE_RULE" => 0,
        "FK_NAME" => name,
    }
}

/// Number of calls of one shape.
pub fn count(calls: &[Call], predicate: impl Fn(&Call) -> bool) -> usize {
    calls.iter().filter(|call| predicate(call)).count()
}
