//! Row commands: insert, select, delete.

use anyhow::{Context, Result};
use serde::Serialize;
use storage_manager::{Predicate, Row, StorageManager, Value};

use crate::OutputFormat;

#[derive(Serialize)]
struct WriteOutput<'a> {
    table: &'a str,
    operation: &'a str,
    immediate: bool,
}

#[derive(Serialize)]
struct SelectOutput {
    rows: Vec<Row>,
    total: usize,
}

fn parse_row(json: &str) -> Result<Row> {
    serde_json::from_str(json).with_context(|| format!("invalid row, expected a JSON object: {json}"))
}

fn parse_predicate(json: &str) -> Result<Predicate> {
    serde_json::from_str(json)
        .with_context(|| format!("invalid predicate, expected a JSON object: {json}"))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => format!("{v:?}"),
        Value::Blob(v) => format!("<{} bytes>", v.len()),
        Value::Null => "NULL".to_string(),
    }
}

fn print_write(output: &WriteOutput<'_>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let path = if output.immediate { "committed" } else { "staged" };
            println!("{} on '{}' {}", output.operation, output.table, path);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
    }
    Ok(())
}

pub fn insert(
    manager: &StorageManager,
    table: &str,
    row: &str,
    immediate: bool,
    format: OutputFormat,
) -> Result<()> {
    let row = parse_row(row)?;
    if immediate {
        manager.insert_immediate(table, row)
    } else {
        manager.insert(table, row)
    }
    .with_context(|| format!("insert into {table} failed"))?;

    print_write(
        &WriteOutput {
            table,
            operation: "Insert",
            immediate,
        },
        format,
    )
}

pub fn select(
    manager: &StorageManager,
    table: &str,
    predicate: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let predicate = predicate.map(parse_predicate).transpose()?.unwrap_or_default();
    let rows = manager
        .select(table, &predicate)
        .with_context(|| format!("select from {table} failed"))?;

    let output = SelectOutput {
        total: rows.len(),
        rows,
    };

    match format {
        OutputFormat::Text => {
            if output.rows.is_empty() {
                println!("No rows found.");
            } else {
                for row in &output.rows {
                    let fields: Vec<String> = row
                        .iter()
                        .map(|(column, value)| format!("{column}={}", format_value(value)))
                        .collect();
                    println!("{}", fields.join("  "));
                }
                println!();
                println!("Total: {} row(s)", output.total);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub fn delete(
    manager: &StorageManager,
    table: &str,
    predicate: &str,
    immediate: bool,
    format: OutputFormat,
) -> Result<()> {
    let predicate = parse_predicate(predicate)?;
    if immediate {
        manager.delete_immediate(table, predicate)
    } else {
        manager.delete(table, predicate)
    }
    .with_context(|| format!("delete from {table} failed"))?;

    print_write(
        &WriteOutput {
            table,
            operation: "Delete",
            immediate,
        },
        format,
    )
}
