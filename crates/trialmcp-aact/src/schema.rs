//! Table and column metadata read live from `information_schema`.

use serde_json::Value;

use trialmcp_core::{Row, SqlBackend, TrialError, TrialResult};

/// Schema holding the AACT study tables.
pub const AACT_SCHEMA: &str = "ctgov";

pub const LIST_TABLES_SQL: &str = "\
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = 'ctgov'
    ORDER BY table_name";

pub const DESCRIBE_TABLE_SQL: &str = "\
    SELECT column_name::text AS column_name,
           data_type::text AS data_type,
           character_maximum_length::int AS character_maximum_length
    FROM information_schema.columns
    WHERE table_schema = 'ctgov'
      AND table_name::text = $1
    ORDER BY ordinal_position";

/// Names of every table in the AACT schema, sorted.
pub fn list_tables(db: &dyn SqlBackend) -> TrialResult<Vec<String>> {
    let rows = db.execute(LIST_TABLES_SQL, &[])?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("table_name").and_then(Value::as_str))
        .map(String::from)
        .collect())
}

/// Column metadata for `table`, in ordinal order.
///
/// Names that are not plain identifiers are rejected without touching the database. A table
/// with no columns does not exist.
pub fn describe_table(db: &dyn SqlBackend, table: &str) -> TrialResult<Vec<Row>> {
    if !is_identifier(table) {
        return Err(TrialError::UnknownTable(table.to_string()));
    }

    let columns = db.execute(DESCRIBE_TABLE_SQL, &[table])?;
    if columns.is_empty() {
        return Err(TrialError::UnknownTable(table.to_string()));
    }
    Ok(columns)
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
