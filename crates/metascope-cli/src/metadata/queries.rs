//! System catalog queries shaped like the standard metadata result sets.
//!
//! Every statement projects the conventional column names (`TABLE_CAT`,
//! `TABLE_SCHEM`, `TABLE_NAME`, ...) and casts values to types the SQLx `Any`
//! driver can decode (text and 64-bit integers).

use metascope_core::{Backend, DatabaseDialect};

/// Backends whose system catalogs can be queried directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCatalog {
    Postgres,
    Mysql,
    Sqlite,
}

impl SystemCatalog {
    pub fn for_backend(backend: &Backend) -> Option<Self> {
        match backend {
            Backend::Postgres => Some(Self::Postgres),
            Backend::Mysql => Some(Self::Mysql),
            Backend::Sqlite => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn tables(
        self,
        dialect: &dyn DatabaseDialect,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        types: &[String],
    ) -> String {
        match self {
            Self::Postgres => {
                let table_type =
                    "CAST(CASE table_type WHEN 'BASE TABLE' THEN 'TABLE' ELSE table_type END AS TEXT)";
                let filter = Filter::new(dialect)
                    .raw(PG_USER_SCHEMAS)
                    .eq("table_catalog", catalog)
                    .eq("table_schema", schema)
                    .eq("table_name", table)
                    .one_of(table_type, types);
                format!(
                    "SELECT table_catalog::text AS table_cat, table_schema::text AS table_schem, \
                     table_name::text AS table_name, {table_type} AS table_type, \
                     obj_description((quote_ident(table_schema) || '.' || quote_ident(table_name))::regclass, 'pg_class') AS remarks \
                     FROM information_schema.tables{} \
                     ORDER BY table_schema, table_name",
                    filter.where_clause()
                )
            }
            Self::Mysql => {
                let table_type =
                    "CASE table_type WHEN 'BASE TABLE' THEN 'TABLE' ELSE table_type END";
                let filter = Filter::new(dialect)
                    .database("table_schema", catalog.or(schema))
                    .eq("table_name", table)
                    .one_of(table_type, types);
                format!(
                    "SELECT table_schema AS TABLE_CAT, NULL AS TABLE_SCHEM, table_name AS TABLE_NAME, \
                     {table_type} AS TABLE_TYPE, table_comment AS REMARKS \
                     FROM information_schema.tables{} \
                     ORDER BY table_schema, table_name",
                    filter.where_clause()
                )
            }
            Self::Sqlite => {
                let schema = schema.unwrap_or(SQLITE_MAIN);
                let table_type = "CASE m.type WHEN 'table' THEN 'TABLE' ELSE 'VIEW' END";
                let filter = Filter::new(dialect)
                    .raw(SQLITE_USER_OBJECTS)
                    .eq("m.name", table)
                    .one_of(table_type, types);
                format!(
                    "SELECT NULL AS TABLE_CAT, {} AS TABLE_SCHEM, m.name AS TABLE_NAME, \
                     {table_type} AS TABLE_TYPE, NULL AS REMARKS \
                     FROM {}.sqlite_master m{} ORDER BY m.name",
                    dialect.quote_literal(schema),
                    quote_ident(schema),
                    filter.where_clause()
                )
            }
        }
    }

    pub fn columns(
        self,
        dialect: &dyn DatabaseDialect,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> String {
        match self {
            Self::Postgres => {
                let filter = Filter::new(dialect)
                    .raw(PG_USER_SCHEMAS)
                    .eq("table_catalog", catalog)
                    .eq("table_schema", schema)
                    .eq("table_name", table)
                    .eq("column_name", column);
                format!(
                    "SELECT table_catalog::text AS table_cat, table_schema::text AS table_schem, \
                     table_name::text AS table_name, column_name::text AS column_name, \
                     data_type::text AS type_name, character_maximum_length::bigint AS column_size, \
                     CASE is_nullable WHEN 'YES' THEN 1 ELSE 0 END::bigint AS nullable, \
                     column_default::text AS column_def, ordinal_position::bigint AS ordinal_position, \
                     CASE WHEN is_identity = 'YES' OR column_default LIKE 'nextval(%' \
                     THEN 'YES' ELSE 'NO' END AS is_autoincrement \
                     FROM information_schema.columns{} \
                     ORDER BY table_schema, table_name, ordinal_position",
                    filter.where_clause()
                )
            }
            Self::Mysql => {
                let filter = Filter::new(dialect)
                    .database("table_schema", catalog.or(schema))
                    .eq("table_name", table)
                    .eq("column_name", column);
                format!(
                    "SELECT table_schema AS TABLE_CAT, NULL AS TABLE_SCHEM, table_name AS TABLE_NAME, \
                     column_name AS COLUMN_NAME, data_type AS TYPE_NAME, \
                     CAST(character_maximum_length AS SIGNED) AS COLUMN_SIZE, \
                     CAST(CASE is_nullable WHEN 'YES' THEN 1 ELSE 0 END AS SIGNED) AS NULLABLE, \
                     column_default AS COLUMN_DEF, CAST(ordinal_position AS SIGNED) AS ORDINAL_POSITION, \
                     CASE WHEN extra LIKE '%auto_increment%' THEN 'YES' ELSE 'NO' END AS IS_AUTOINCREMENT \
                     FROM information_schema.columns{} \
                     ORDER BY table_schema, table_name, ordinal_position",
                    filter.where_clause()
                )
            }
            Self::Sqlite => {
                let schema = schema.unwrap_or(SQLITE_MAIN);
                let filter = Filter::new(dialect)
                    .raw(SQLITE_USER_OBJECTS)
                    .eq("m.name", table)
                    .eq("p.name", column);
                format!(
                    "SELECT NULL AS TABLE_CAT, {} AS TABLE_SCHEM, m.name AS TABLE_NAME, \
                     p.name AS COLUMN_NAME, p.type AS TYPE_NAME, NULL AS COLUMN_SIZE, \
                     CASE WHEN p.\"notnull\" = 0 THEN 1 ELSE 0 END AS NULLABLE, \
                     p.dflt_value AS COLUMN_DEF, p.cid + 1 AS ORDINAL_POSITION, \
                     CASE WHEN p.pk = 1 AND upper(p.type) = 'INTEGER' THEN 'YES' ELSE 'NO' END AS IS_AUTOINCREMENT \
                     FROM {}.sqlite_master m JOIN pragma_table_info(m.name, {}) p{} \
                     ORDER BY m.name, p.cid",
                    dialect.quote_literal(schema),
                    quote_ident(schema),
                    dialect.quote_literal(schema),
                    filter.where_clause()
                )
            }
        }
    }

    pub fn primary_keys(
        self,
        dialect: &dyn DatabaseDialect,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> String {
        match self {
            Self::Postgres => {
                let filter = Filter::new(dialect)
                    .raw("tc.constraint_type = 'PRIMARY KEY'")
                    .eq("kcu.table_catalog", catalog)
                    .eq("kcu.table_schema", schema)
                    .eq("kcu.table_name", table);
                format!(
                    "SELECT kcu.table_catalog::text AS table_cat, kcu.table_schema::text AS table_schem, \
                     kcu.table_name::text AS table_name, kcu.column_name::text AS column_name, \
                     kcu.ordinal_position::bigint AS key_seq, tc.constraint_name::text AS pk_name \
                     FROM information_schema.table_constraints tc \
                     JOIN information_schema.key_column_usage kcu \
                     ON tc.constraint_catalog = kcu.constraint_catalog \
                     AND tc.constraint_schema = kcu.constraint_schema \
                     AND tc.constraint_name = kcu.constraint_name{} \
                     ORDER BY kcu.table_schema, kcu.table_name, kcu.ordinal_position",
                    filter.where_clause()
                )
            }
            Self::Mysql => {
                let filter = Filter::new(dialect)
                    .raw("constraint_name = 'PRIMARY'")
                    .database("table_schema", catalog.or(schema))
                    .eq("table_name", table);
                format!(
                    "SELECT table_schema AS TABLE_CAT, NULL AS TABLE_SCHEM, table_name AS TABLE_NAME, \
                     column_name AS COLUMN_NAME, CAST(ordinal_position AS SIGNED) AS KEY_SEQ, \
                     constraint_name AS PK_NAME \
                     FROM information_schema.key_column_usage{} \
                     ORDER BY table_schema, table_name, ordinal_position",
                    filter.where_clause()
                )
            }
            Self::Sqlite => {
                let schema = schema.unwrap_or(SQLITE_MAIN);
                let filter = Filter::new(dialect)
                    .raw("m.type = 'table'")
                    .raw("m.name NOT LIKE 'sqlite_%'")
                    .raw("p.pk > 0")
                    .eq("m.name", table);
                format!(
                    "SELECT NULL AS TABLE_CAT, {} AS TABLE_SCHEM, m.name AS TABLE_NAME, \
                     p.name AS COLUMN_NAME, p.pk AS KEY_SEQ, NULL AS PK_NAME \
                     FROM {}.sqlite_master m JOIN pragma_table_info(m.name, {}) p{} \
                     ORDER BY m.name, p.pk",
                    dialect.quote_literal(schema),
                    quote_ident(schema),
                    dialect.quote_literal(schema),
                    filter.where_clause()
                )
            }
        }
    }

    pub fn index_info(
        self,
        dialect: &dyn DatabaseDialect,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> String {
        match self {
            Self::Postgres => {
                let filter = Filter::new(dialect)
                    .raw("n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')")
                    .eq("current_database()", catalog)
                    .eq("n.nspname", schema)
                    .eq("t.relname", table);
                format!(
                    "SELECT current_database()::text AS table_cat, n.nspname::text AS table_schem, \
                     t.relname::text AS table_name, NOT ix.indisunique AS non_unique, \
                     i.relname::text AS index_name, a.attname::text AS column_name, \
                     k.ord::bigint AS ordinal_position \
                     FROM pg_index ix \
                     JOIN pg_class t ON t.oid = ix.indrelid \
                     JOIN pg_class i ON i.oid = ix.indexrelid \
                     JOIN pg_namespace n ON n.oid = t.relnamespace \
                     CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
                     JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum{} \
                     ORDER BY n.nspname, t.relname, i.relname, k.ord",
                    filter.where_clause()
                )
            }
            Self::Mysql => {
                let filter = Filter::new(dialect)
                    .database("table_schema", catalog.or(schema))
                    .eq("table_name", table);
                format!(
                    "SELECT table_schema AS TABLE_CAT, NULL AS TABLE_SCHEM, table_name AS TABLE_NAME, \
                     CAST(non_unique AS SIGNED) AS NON_UNIQUE, index_name AS INDEX_NAME, \
                     column_name AS COLUMN_NAME, CAST(seq_in_index AS SIGNED) AS ORDINAL_POSITION \
                     FROM information_schema.statistics{} \
                     ORDER BY table_schema, table_name, index_name, seq_in_index",
                    filter.where_clause()
                )
            }
            Self::Sqlite => {
                let schema = schema.unwrap_or(SQLITE_MAIN);
                let filter = Filter::new(dialect)
                    .raw("m.type = 'table'")
                    .raw("m.name NOT LIKE 'sqlite_%'")
                    .eq("m.name", table);
                format!(
                    "SELECT NULL AS TABLE_CAT, {} AS TABLE_SCHEM, m.name AS TABLE_NAME, \
                     CASE WHEN il.\"unique\" = 1 THEN 0 ELSE 1 END AS NON_UNIQUE, \
                     il.name AS INDEX_NAME, ii.name AS COLUMN_NAME, ii.seqno + 1 AS ORDINAL_POSITION \
                     FROM {}.sqlite_master m \
                     JOIN pragma_index_list(m.name, {}) il \
                     JOIN pragma_index_info(il.name, {}) ii{} \
                     ORDER BY m.name, il.name, ii.seqno",
                    dialect.quote_literal(schema),
                    quote_ident(schema),
                    dialect.quote_literal(schema),
                    dialect.quote_literal(schema),
                    filter.where_clause()
                )
            }
        }
    }

    pub fn imported_keys(
        self,
        dialect: &dyn DatabaseDialect,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> String {
        match self {
            Self::Postgres => {
                let filter = Filter::new(dialect)
                    .raw("c.contype = 'f'")
                    .eq("current_database()", catalog)
                    .eq("fn.nspname", schema)
                    .eq("ft.relname", Some(table));
                format!(
                    "SELECT current_database()::text AS pktable_cat, pn.nspname::text AS pktable_schem, \
                     pt.relname::text AS pktable_name, pa.attname::text AS pkcolumn_name, \
                     current_database()::text AS fktable_cat, fn.nspname::text AS fktable_schem, \
                     ft.relname::text AS fktable_name, fa.attname::text AS fkcolumn_name, \
                     k.ord::bigint AS key_seq, \
                     {} AS update_rule, {} AS delete_rule, c.conname::text AS fk_name \
                     FROM pg_constraint c \
                     JOIN pg_class ft ON ft.oid = c.conrelid \
                     JOIN pg_namespace fn ON fn.oid = ft.relnamespace \
                     JOIN pg_class pt ON pt.oid = c.confrelid \
                     JOIN pg_namespace pn ON pn.oid = pt.relnamespace \
                     CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(fk_attnum, pk_attnum, ord) \
                     JOIN pg_attribute fa ON fa.attrelid = ft.oid AND fa.attnum = k.fk_attnum \
                     JOIN pg_attribute pa ON pa.attrelid = pt.oid AND pa.attnum = k.pk_attnum{} \
                     ORDER BY pn.nspname, pt.relname, c.conname, k.ord",
                    pg_rule("c.confupdtype"),
                    pg_rule("c.confdeltype"),
                    filter.where_clause()
                )
            }
            Self::Mysql => {
                let filter = Filter::new(dialect)
                    .raw("kcu.referenced_table_name IS NOT NULL")
                    .database("kcu.table_schema", catalog.or(schema))
                    .eq("kcu.table_name", Some(table));
                format!(
                    "SELECT kcu.referenced_table_schema AS PKTABLE_CAT, NULL AS PKTABLE_SCHEM, \
                     kcu.referenced_table_name AS PKTABLE_NAME, kcu.referenced_column_name AS PKCOLUMN_NAME, \
                     kcu.table_schema AS FKTABLE_CAT, NULL AS FKTABLE_SCHEM, \
                     kcu.table_name AS FKTABLE_NAME, kcu.column_name AS FKCOLUMN_NAME, \
                     CAST(kcu.ordinal_position AS SIGNED) AS KEY_SEQ, \
                     {} AS UPDATE_RULE, {} AS DELETE_RULE, kcu.constraint_name AS FK_NAME \
                     FROM information_schema.key_column_usage kcu \
                     JOIN information_schema.referential_constraints rc \
                     ON rc.constraint_schema = kcu.constraint_schema \
                     AND rc.constraint_name = kcu.constraint_name{} \
                     ORDER BY kcu.referenced_table_schema, kcu.referenced_table_name, \
                     kcu.constraint_name, kcu.ordinal_position",
                    named_rule("rc.update_rule", "SIGNED"),
                    named_rule("rc.delete_rule", "SIGNED"),
                    filter.where_clause()
                )
            }
            Self::Sqlite => {
                let schema = schema.unwrap_or(SQLITE_MAIN);
                let filter = Filter::new(dialect).eq("m.name", Some(table));
                format!(
                    "SELECT NULL AS PKTABLE_CAT, {schema_literal} AS PKTABLE_SCHEM, \
                     fk.\"table\" AS PKTABLE_NAME, fk.\"to\" AS PKCOLUMN_NAME, \
                     NULL AS FKTABLE_CAT, {schema_literal} AS FKTABLE_SCHEM, \
                     m.name AS FKTABLE_NAME, fk.\"from\" AS FKCOLUMN_NAME, fk.seq + 1 AS KEY_SEQ, \
                     {} AS UPDATE_RULE, {} AS DELETE_RULE, \
                     'fk_' || m.name || '_' || fk.id AS FK_NAME \
                     FROM {}.sqlite_master m JOIN pragma_foreign_key_list(m.name, {schema_literal}) fk{} \
                     ORDER BY fk.id, fk.seq",
                    named_rule("fk.on_update", "INTEGER"),
                    named_rule("fk.on_delete", "INTEGER"),
                    quote_ident(schema),
                    filter.where_clause(),
                    schema_literal = dialect.quote_literal(schema),
                )
            }
        }
    }
}

const SQLITE_MAIN: &str = "main";
const SQLITE_USER_OBJECTS: &str = "m.type IN ('table', 'view') AND m.name NOT LIKE 'sqlite_%'";
const PG_USER_SCHEMAS: &str = "table_schema NOT IN ('pg_catalog', 'information_schema')";

/// Referential action codes from PostgreSQL's single-letter action column.
fn pg_rule(column: &str) -> String {
    format!(
        "CAST(CASE {column} WHEN 'c' THEN 0 WHEN 'r' THEN 1 WHEN 'n' THEN 2 \
         WHEN 'a' THEN 3 WHEN 'd' THEN 4 END AS BIGINT)"
    )
}

/// Referential action codes from a spelled-out action name.
fn named_rule(column: &str, int_type: &str) -> String {
    format!(
        "CAST(CASE {column} WHEN 'CASCADE' THEN 0 WHEN 'RESTRICT' THEN 1 WHEN 'SET NULL' THEN 2 \
         WHEN 'NO ACTION' THEN 3 WHEN 'SET DEFAULT' THEN 4 END AS {int_type})"
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Accumulates `AND`-joined conditions with quoted literals.
struct Filter<'d> {
    dialect: &'d dyn DatabaseDialect,
    conditions: Vec<String>,
}

impl<'d> Filter<'d> {
    fn new(dialect: &'d dyn DatabaseDialect) -> Self {
        Self {
            dialect,
            conditions: Vec::new(),
        }
    }

    fn raw(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    fn eq(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.conditions
                .push(format!("{column} = {}", self.dialect.quote_literal(value)));
        }
        self
    }

    /// MySQL namespace filter; falls back to the connection's default database.
    fn database(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(_) => self.eq(column, value),
            None => self.raw(&format!("{column} = DATABASE()")),
        }
    }

    fn one_of(mut self, expression: &str, values: &[String]) -> Self {
        if !values.is_empty() {
            let literals: Vec<String> = values
                .iter()
                .map(|value| self.dialect.quote_literal(value))
                .collect();
            self.conditions
                .push(format!("{expression} IN ({})", literals.join(", ")));
        }
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}
