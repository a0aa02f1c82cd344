//! Human-readable table output formatting.

use is_terminal::IsTerminal;
use metascope_core::{FetchStats, ForeignKeySnapshot, QueryKind, SchemaSnapshot, TableSnapshot};
use owo_colors::OwoColorize;
use std::fmt::{self, Write};
use tabled::builder::Builder;
use tabled::settings::Style;

/// Format the snapshot as human-readable text with optional colors.
pub fn format_table(snapshot: &SchemaSnapshot, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_snapshot(&mut out, snapshot, colored);
    out
}

/// Format per-query backend call counters.
pub fn format_stats(report: &[(QueryKind, FetchStats)]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Query", "Fast", "Bulk", "Cache hits", "Backend calls"]);
    for (kind, stats) in report {
        builder.push_record([
            kind.to_string(),
            stats.fast_fetches.to_string(),
            stats.bulk_fetches.to_string(),
            stats.cache_hits.to_string(),
            stats.backend_calls().to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn write_snapshot(out: &mut String, snapshot: &SchemaSnapshot, colored: bool) -> fmt::Result {
    write_header(out, snapshot, colored)?;
    write_summary(out, snapshot, colored)?;
    for table in &snapshot.tables {
        write_table(out, table, colored)?;
    }
    Ok(())
}

fn write_header(out: &mut String, snapshot: &SchemaSnapshot, colored: bool) -> fmt::Result {
    let mut title = format!("Schema Snapshot ({})", snapshot.backend);
    if let Some(namespace) = namespace(snapshot.catalog.as_deref(), snapshot.schema.as_deref()) {
        write!(title, " {namespace}")?;
    }
    let line = "═".repeat(50);

    if colored {
        writeln!(out, "{}", title.bold())?;
        writeln!(out, "{}", line.dimmed())?;
    } else {
        writeln!(out, "{title}")?;
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn write_summary(out: &mut String, snapshot: &SchemaSnapshot, colored: bool) -> fmt::Result {
    let foreign_keys: usize = snapshot
        .tables
        .iter()
        .map(|table| table.foreign_keys.len())
        .sum();
    let stats = format!(
        "Summary: {} tables | {} columns | {} foreign keys",
        snapshot.tables.len(),
        snapshot.column_count(),
        foreign_keys
    );

    writeln!(out)?;
    if colored {
        writeln!(out, "{}", stats.cyan())?;
    } else {
        writeln!(out, "{stats}")?;
    }
    writeln!(out)
}

fn write_table(out: &mut String, table: &TableSnapshot, colored: bool) -> fmt::Result {
    let name = match namespace(table.catalog.as_deref(), table.schema.as_deref()) {
        Some(namespace) => format!("{namespace}.{}", table.name),
        None => table.name.clone(),
    };
    if colored {
        writeln!(out, "{} {}", name.bold(), format!("({})", table.kind).dimmed())?;
    } else {
        writeln!(out, "{name} ({})", table.kind)?;
    }
    if let Some(remarks) = &table.remarks {
        writeln!(out, "  {remarks}")?;
    }

    let mut builder = Builder::default();
    builder.push_record(["#", "Column", "Type", "Nullable", "Default", "Key"]);
    for column in &table.columns {
        builder.push_record([
            column
                .position
                .map(|position| position.to_string())
                .unwrap_or_default(),
            column.name.clone(),
            column.data_type.clone().unwrap_or_default(),
            if column.nullable { "YES" } else { "NO" }.to_string(),
            column.default_value.clone().unwrap_or_default(),
            key_marker(table, &column.name),
        ]);
    }
    let mut grid = builder.build();
    grid.with(Style::rounded());
    writeln!(out, "{grid}")?;

    for index in &table.indexes {
        let label = if index.unique { "Unique index" } else { "Index" };
        writeln!(out, "  {label} {} ({})", index.name, index.columns.join(", "))?;
    }
    for constraint in &table.unique_constraints {
        writeln!(out, "  Unique constraint {constraint}")?;
    }
    for foreign_key in &table.foreign_keys {
        write_foreign_key(out, foreign_key, colored)?;
    }
    writeln!(out)
}

fn write_foreign_key(out: &mut String, foreign_key: &ForeignKeySnapshot, colored: bool) -> fmt::Result {
    let arrow = if colored {
        "→".green().to_string()
    } else {
        "→".to_string()
    };
    write!(
        out,
        "  Foreign key {}({}) {arrow} {}({})",
        foreign_key
            .name
            .as_deref()
            .map(|name| format!("{name} "))
            .unwrap_or_default(),
        foreign_key.columns.join(", "),
        foreign_key.referenced_table,
        foreign_key.referenced_columns.join(", ")
    )?;
    if let Some(action) = foreign_key.on_delete {
        write!(out, " ON DELETE {}", action_label(action))?;
    }
    if let Some(action) = foreign_key.on_update {
        write!(out, " ON UPDATE {}", action_label(action))?;
    }
    writeln!(out)
}

fn key_marker(table: &TableSnapshot, column: &str) -> String {
    let mut markers = Vec::new();
    if table
        .primary_key
        .as_ref()
        .is_some_and(|pk| pk.columns.iter().any(|c| c == column))
    {
        markers.push("PK".to_string());
    }
    for foreign_key in &table.foreign_keys {
        if let Some(position) = foreign_key.columns.iter().position(|c| c == column) {
            let referenced = foreign_key
                .referenced_columns
                .get(position)
                .map(String::as_str)
                .unwrap_or("?");
            markers.push(format!("FK {}.{referenced}", foreign_key.referenced_table));
        }
    }
    markers.join(", ")
}

fn action_label(action: metascope_core::ReferentialAction) -> &'static str {
    use metascope_core::ReferentialAction::*;
    match action {
        Cascade => "CASCADE",
        Restrict => "RESTRICT",
        SetNull => "SET NULL",
        NoAction => "NO ACTION",
        SetDefault => "SET DEFAULT",
    }
}

fn namespace(catalog: Option<&str>, schema: Option<&str>) -> Option<String> {
    match (catalog, schema) {
        (Some(catalog), Some(schema)) => Some(format!("{catalog}.{schema}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}
