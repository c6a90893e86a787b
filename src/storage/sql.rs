//! SQL rendering and statement helpers shared by immediate writes and flushes.
//!
//! Identifiers are always double-quoted; values are always bound.

use rusqlite::{params_from_iter, Connection};

use crate::types::{Predicate, Row, TableSchema, Value};

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_sql(schema: &TableSchema) -> String {
    let mut defs: Vec<String> = schema
        .columns()
        .iter()
        .map(|column| {
            let mut def = format!("{} {}", quote_ident(&column.name), column.column_type.sql_name());
            if column.not_null {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    if !schema.primary_keys().is_empty() {
        let keys: Vec<String> = schema.primary_keys().iter().map(|k| quote_ident(k)).collect();
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(schema.name()),
        defs.join(", ")
    )
}

/// `INSERT OR REPLACE`: a row with the same primary key is replaced whole.
pub fn insert_sql(table: &str, row: &Row) -> String {
    let columns: Vec<String> = row.columns().map(quote_ident).collect();
    let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn where_clause(predicate: &Predicate) -> String {
    predicate
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", quote_ident(column), i + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub fn select_sql(table: &str, predicate: &Predicate) -> String {
    if predicate.is_empty() {
        format!("SELECT * FROM {}", quote_ident(table))
    } else {
        format!(
            "SELECT * FROM {} WHERE {}",
            quote_ident(table),
            where_clause(predicate)
        )
    }
}

/// Callers must reject empty predicates before getting here.
pub fn delete_sql(table: &str, predicate: &Predicate) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(table),
        where_clause(predicate)
    )
}

pub fn execute_insert(conn: &Connection, table: &str, row: &Row) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(&insert_sql(table, row))?;
    stmt.execute(params_from_iter(row.values()))
}

pub fn execute_delete(
    conn: &Connection,
    table: &str,
    predicate: &Predicate,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(&delete_sql(table, predicate))?;
    stmt.execute(params_from_iter(predicate.iter().map(|(_, v)| v)))
}

pub fn query_rows(
    conn: &Connection,
    table: &str,
    predicate: &Predicate,
) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(&select_sql(table, predicate))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let rows = stmt
        .query_map(params_from_iter(predicate.iter().map(|(_, v)| v)), |r| {
            columns
                .iter()
                .enumerate()
                .map(|(i, name)| Ok((name.clone(), r.get::<_, Value>(i)?)))
                .collect::<rusqlite::Result<Row>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
