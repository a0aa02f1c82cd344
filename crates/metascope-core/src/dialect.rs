//! Backend identity and dialect-specific capabilities.
//!
//! The caching engine itself is backend-agnostic. Everything that depends on which
//! database is on the other end of the connection lives here:
//!
//! - [`Backend`]: the backend family, inferred from a connection URL.
//! - [`StandardDialect`]: identifier equivalence and name correction per backend.
//! - [`unique_constraint_sql_for`]: the registry of statement builders for listing
//!   unique constraints, which the standard metadata calls cannot express.
//! - [`oracle_index_sql`]: the statement used instead of the standard index call on
//!   Oracle, where that call is slow and unreliable.

use crate::source::DatabaseDialect;
use std::fmt;

/// Database backend family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Backend {
    Postgres,
    Mysql,
    Sqlite,
    Mssql,
    Oracle,
    Db2,
    Firebird,
    Derby,
    H2,
    Hsql,
    /// A backend this crate has no dedicated knowledge of.
    Other(String),
}

impl Backend {
    /// Infer the backend from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Some(Self::Mysql)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if url.starts_with("mssql://") || url.starts_with("sqlserver://") {
            Some(Self::Mssql)
        } else if url.starts_with("oracle:") {
            Some(Self::Oracle)
        } else if url.starts_with("db2:") {
            Some(Self::Db2)
        } else if url.starts_with("firebird:") || url.starts_with("firebirdsql:") {
            Some(Self::Firebird)
        } else if url.starts_with("derby:") {
            Some(Self::Derby)
        } else if url.starts_with("h2:") {
            Some(Self::H2)
        } else if url.starts_with("hsqldb:") {
            Some(Self::Hsql)
        } else {
            None
        }
    }

    /// Get the identifier normalization strategy for this backend.
    pub fn normalization_strategy(&self) -> NormalizationStrategy {
        match self {
            Backend::Postgres => NormalizationStrategy::Lowercase,
            Backend::Oracle
            | Backend::Db2
            | Backend::Firebird
            | Backend::Derby
            | Backend::H2
            | Backend::Hsql => NormalizationStrategy::Uppercase,
            Backend::Mssql | Backend::Sqlite => NormalizationStrategy::CaseInsensitive,
            Backend::Mysql | Backend::Other(_) => NormalizationStrategy::CaseSensitive,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Postgres => "postgresql",
            Backend::Mysql => "mysql",
            Backend::Sqlite => "sqlite",
            Backend::Mssql => "mssql",
            Backend::Oracle => "oracle",
            Backend::Db2 => "db2",
            Backend::Firebird => "firebird",
            Backend::Derby => "derby",
            Backend::H2 => "h2",
            Backend::Hsql => "hsqldb",
            Backend::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Normalization strategy for identifier handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationStrategy {
    /// Fold to lowercase (Postgres)
    Lowercase,
    /// Fold to uppercase (Oracle, DB2, H2, ...)
    Uppercase,
    /// Case-insensitive comparison without folding
    CaseInsensitive,
    /// Case-sensitive, preserve exactly
    CaseSensitive,
}

/// The kind of database object a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Catalog,
    Schema,
    Table,
    Index,
}

/// Dialect driven purely by the backend's normalization strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardDialect {
    backend: Backend,
}

impl StandardDialect {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl DatabaseDialect for StandardDialect {
    fn backend(&self) -> Backend {
        self.backend.clone()
    }

    fn identifiers_equal(&self, left: &str, right: &str) -> bool {
        match self.backend.normalization_strategy() {
            NormalizationStrategy::CaseSensitive => left == right,
            _ => left.eq_ignore_ascii_case(right),
        }
    }

    fn correct_object_name(&self, name: &str, _kind: ObjectKind) -> String {
        match self.backend.normalization_strategy() {
            NormalizationStrategy::Lowercase => name.to_lowercase(),
            NormalizationStrategy::Uppercase => name.to_uppercase(),
            _ => name.to_string(),
        }
    }
}

/// Builds the statement listing unique constraints for
/// `(catalog, schema, table)`; `None` slots are left unfiltered.
///
/// Every statement projects `TABLE_CAT`, `TABLE_SCHEM`, `TABLE_NAME` and
/// `CONSTRAINT_NAME` so the resulting rows carry an identity.
pub type UniqueConstraintSql =
    fn(&dyn DatabaseDialect, Option<&str>, Option<&str>, Option<&str>) -> String;

/// Look up the unique-constraint statement builder for `backend`.
///
/// Returns `None` for backends without a known statement; callers must report
/// that rather than guess at a generic query.
pub fn unique_constraint_sql_for(backend: &Backend) -> Option<UniqueConstraintSql> {
    let builder: UniqueConstraintSql = match backend {
        Backend::Mysql | Backend::Hsql => mysql_unique_constraints,
        Backend::Postgres => postgres_unique_constraints,
        Backend::Mssql => mssql_unique_constraints,
        Backend::Oracle => oracle_unique_constraints,
        Backend::Db2 => db2_unique_constraints,
        Backend::Firebird => firebird_unique_constraints,
        Backend::Derby => derby_unique_constraints,
        Backend::H2 => h2_unique_constraints,
        Backend::Sqlite => sqlite_unique_constraints,
        Backend::Other(_) => return None,
    };
    Some(builder)
}

/// Statement listing index columns from `ALL_IND_COLUMNS`, shaped like the
/// standard index metadata result.
pub fn oracle_index_sql(
    dialect: &dyn DatabaseDialect,
    owner: Option<&str>,
    table: Option<&str>,
    index: Option<&str>,
) -> String {
    let mut conditions = Vec::new();
    push_eq(&mut conditions, dialect, "TABLE_OWNER", owner, ObjectKind::Schema);
    push_eq(&mut conditions, dialect, "TABLE_NAME", table, ObjectKind::Table);
    push_eq(&mut conditions, dialect, "INDEX_NAME", index, ObjectKind::Index);

    let mut sql = String::from(
        "SELECT NULL AS TABLE_CAT, TABLE_OWNER AS TABLE_SCHEM, TABLE_NAME, INDEX_NAME, \
         3 AS TYPE, COLUMN_NAME, COLUMN_POSITION AS ORDINAL_POSITION, \
         NULL AS FILTER_CONDITION FROM ALL_IND_COLUMNS",
    );
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY INDEX_NAME, ORDINAL_POSITION");
    sql
}

/// Appends `column = '<value>'` when `value` is present.
fn push_eq(
    conditions: &mut Vec<String>,
    dialect: &dyn DatabaseDialect,
    column: &str,
    value: Option<&str>,
    kind: ObjectKind,
) {
    if let Some(value) = value {
        let corrected = dialect.correct_object_name(value, kind);
        conditions.push(format!("{column} = {}", dialect.quote_literal(&corrected)));
    }
}

/// Projects a requested namespace as a literal, or `NULL`.
fn literal_or_null(dialect: &dyn DatabaseDialect, value: Option<&str>, kind: ObjectKind) -> String {
    value.map_or_else(
        || "NULL".to_string(),
        |value| dialect.quote_literal(&dialect.correct_object_name(value, kind)),
    )
}

// Single-level backends accept the namespace in either slot.
fn single_namespace<'a>(catalog: Option<&'a str>, schema: Option<&'a str>) -> Option<&'a str> {
    catalog.or(schema)
}

fn mysql_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec!["constraint_type = 'UNIQUE'".to_string()];
    push_eq(
        &mut conditions,
        dialect,
        "constraint_schema",
        single_namespace(catalog, schema),
        ObjectKind::Catalog,
    );
    push_eq(&mut conditions, dialect, "table_name", table, ObjectKind::Table);
    format!(
        "select constraint_schema as TABLE_CAT, NULL as TABLE_SCHEM, table_name as TABLE_NAME, \
         constraint_name as CONSTRAINT_NAME from information_schema.table_constraints where {}",
        conditions.join(" and ")
    )
}

fn postgres_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec!["constraint_type = 'UNIQUE'".to_string()];
    push_eq(&mut conditions, dialect, "constraint_catalog", catalog, ObjectKind::Catalog);
    push_eq(&mut conditions, dialect, "constraint_schema", schema, ObjectKind::Schema);
    push_eq(&mut conditions, dialect, "table_name", table, ObjectKind::Table);
    format!(
        "select constraint_catalog as TABLE_CAT, constraint_schema as TABLE_SCHEM, \
         table_name as TABLE_NAME, constraint_name as CONSTRAINT_NAME \
         from information_schema.table_constraints where {} \
         order by constraint_schema, table_name, constraint_name",
        conditions.join(" and ")
    )
}

fn mssql_unique_constraints(
    dialect: &dyn DatabaseDialect,
    _catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec!["constraint_type = 'UNIQUE'".to_string()];
    push_eq(&mut conditions, dialect, "constraint_schema", schema, ObjectKind::Schema);
    push_eq(&mut conditions, dialect, "table_name", table, ObjectKind::Table);
    format!(
        "select constraint_catalog as TABLE_CAT, constraint_schema as TABLE_SCHEM, \
         table_name as TABLE_NAME, constraint_name as CONSTRAINT_NAME \
         from information_schema.table_constraints where {}",
        conditions.join(" and ")
    )
}

fn oracle_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let owner = single_namespace(catalog, schema);
    let mut conditions = vec![
        "uc.constraint_type = 'U'".to_string(),
        "uc.index_name = ui.index_name".to_string(),
    ];
    push_eq(&mut conditions, dialect, "uc.owner", owner, ObjectKind::Schema);
    push_eq(&mut conditions, dialect, "ui.table_owner", owner, ObjectKind::Schema);
    push_eq(&mut conditions, dialect, "uc.table_name", table, ObjectKind::Table);
    format!(
        "select NULL as TABLE_CAT, uc.owner as TABLE_SCHEM, uc.table_name as TABLE_NAME, \
         uc.constraint_name as CONSTRAINT_NAME, uc.status as STATUS, \
         uc.deferrable as DEFERRABLE, uc.deferred as DEFERRED, \
         ui.tablespace_name as TABLESPACE_NAME \
         from all_constraints uc, all_indexes ui where {}",
        conditions.join(" and ")
    )
}

fn db2_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec!["k.constname = t.constname".to_string(), "t.type = 'U'".to_string()];
    push_eq(
        &mut conditions,
        dialect,
        "t.tabschema",
        single_namespace(catalog, schema),
        ObjectKind::Schema,
    );
    push_eq(&mut conditions, dialect, "t.tabname", table, ObjectKind::Table);
    format!(
        "select distinct NULL as TABLE_CAT, t.tabschema as TABLE_SCHEM, t.tabname as TABLE_NAME, \
         k.constname as CONSTRAINT_NAME from syscat.keycoluse k, syscat.tabconst t where {}",
        conditions.join(" and ")
    )
}

fn firebird_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec![
        "RDB$INDICES.RDB$UNIQUE_FLAG IS NOT NULL".to_string(),
        "RDB$RELATION_CONSTRAINTS.RDB$CONSTRAINT_TYPE != 'PRIMARY KEY'".to_string(),
        "NOT (RDB$INDICES.RDB$INDEX_NAME LIKE 'RDB$%')".to_string(),
    ];
    push_eq(
        &mut conditions,
        dialect,
        "RDB$INDICES.RDB$RELATION_NAME",
        table,
        ObjectKind::Table,
    );
    // Firebird has no namespaces; rows are bound to whatever was asked for.
    format!(
        "SELECT {} AS TABLE_CAT, {} AS TABLE_SCHEM, \
         TRIM(RDB$INDICES.RDB$RELATION_NAME) AS TABLE_NAME, \
         TRIM(RDB$INDICES.RDB$INDEX_NAME) AS CONSTRAINT_NAME FROM RDB$INDICES \
         LEFT JOIN RDB$RELATION_CONSTRAINTS \
         ON RDB$RELATION_CONSTRAINTS.RDB$INDEX_NAME = RDB$INDICES.RDB$INDEX_NAME WHERE {}",
        literal_or_null(dialect, catalog, ObjectKind::Catalog),
        literal_or_null(dialect, schema, ObjectKind::Schema),
        conditions.join(" AND ")
    )
}

fn derby_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec![
        "t.tableid = c.tableid".to_string(),
        "t.schemaid = s.schemaid".to_string(),
        "c.type = 'U'".to_string(),
    ];
    push_eq(
        &mut conditions,
        dialect,
        "s.schemaname",
        single_namespace(catalog, schema),
        ObjectKind::Schema,
    );
    push_eq(&mut conditions, dialect, "t.tablename", table, ObjectKind::Table);
    format!(
        "select NULL as TABLE_CAT, s.schemaname as TABLE_SCHEM, t.tablename as TABLE_NAME, \
         c.constraintname as CONSTRAINT_NAME \
         from sys.systables t, sys.sysconstraints c, sys.sysschemas s where {}",
        conditions.join(" and ")
    )
}

fn h2_unique_constraints(
    dialect: &dyn DatabaseDialect,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec!["constraint_type = 'UNIQUE'".to_string()];
    push_eq(&mut conditions, dialect, "constraint_schema", schema, ObjectKind::Schema);
    push_eq(&mut conditions, dialect, "constraint_catalog", catalog, ObjectKind::Catalog);
    push_eq(&mut conditions, dialect, "table_name", table, ObjectKind::Table);
    format!(
        "select constraint_catalog as TABLE_CAT, constraint_schema as TABLE_SCHEM, \
         table_name as TABLE_NAME, constraint_name as CONSTRAINT_NAME, \
         constraint_type as CONSTRAINT_TYPE from information_schema.constraints where {}",
        conditions.join(" and ")
    )
}

fn sqlite_unique_constraints(
    dialect: &dyn DatabaseDialect,
    _catalog: Option<&str>,
    _schema: Option<&str>,
    table: Option<&str>,
) -> String {
    let mut conditions = vec![
        "m.type = 'table'".to_string(),
        "il.\"unique\" = 1".to_string(),
        "il.origin = 'u'".to_string(),
    ];
    push_eq(&mut conditions, dialect, "m.name", table, ObjectKind::Table);
    format!(
        "select NULL as TABLE_CAT, 'main' as TABLE_SCHEM, m.name as TABLE_NAME, \
         il.name as CONSTRAINT_NAME from sqlite_master m, pragma_index_list(m.name) il \
         where {} order by m.name, il.name",
        conditions.join(" and ")
    )
}
