//! Schema and flush commands.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use storage_manager::{ColumnType, StorageManager, TableSchema};

use crate::OutputFormat;

#[derive(Serialize)]
struct RegisterOutput {
    table: String,
    columns: usize,
    primary_keys: Vec<String>,
}

#[derive(Serialize)]
struct FlushOutput {
    table: Option<String>,
    flushed: Option<usize>,
}

/// Parse `name:type[:not-null]`.
fn parse_column(spec: &str) -> Result<(String, ColumnType, bool)> {
    let mut parts = spec.split(':');
    let name = parts
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| anyhow!("column spec is missing a name: {spec}"))?;
    let column_type = parts
        .next()
        .ok_or_else(|| anyhow!("column spec is missing a type: {spec}"))?
        .parse::<ColumnType>()
        .map_err(|e| anyhow!(e))?;
    let not_null = match parts.next() {
        None => false,
        Some("not-null") | Some("notnull") => true,
        Some(other) => return Err(anyhow!("unknown column flag `{other}` in {spec}")),
    };
    Ok((name.to_string(), column_type, not_null))
}

pub fn register(
    manager: &StorageManager,
    table: &str,
    columns: &[String],
    primary_keys: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut builder = TableSchema::builder(table);
    for spec in columns {
        let (name, column_type, not_null) = parse_column(spec)?;
        builder = builder.column_with(name, column_type, not_null);
    }
    let schema = builder.primary_key(primary_keys.clone()).build();

    manager
        .register_table(&schema)
        .with_context(|| format!("failed to register table {table}"))?;

    let output = RegisterOutput {
        table: table.to_string(),
        columns: schema.columns().len(),
        primary_keys,
    };

    match format {
        OutputFormat::Text => {
            println!("Registered table '{}' ({} columns)", output.table, output.columns);
            if !output.primary_keys.is_empty() {
                println!("  Primary key: {}", output.primary_keys.join(", "));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub fn flush(manager: &StorageManager, table: Option<&str>, format: OutputFormat) -> Result<()> {
    let output = match table {
        Some(table) => FlushOutput {
            table: Some(table.to_string()),
            flushed: Some(manager.flush(table).context("flush failed")?),
        },
        None => {
            manager.flush_all().context("flush failed")?;
            FlushOutput {
                table: None,
                flushed: None,
            }
        }
    };

    match format {
        OutputFormat::Text => match (&output.table, output.flushed) {
            (Some(table), Some(n)) => println!("Flushed {n} operation(s) for '{table}'"),
            _ => println!("Flushed all tables"),
        },
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
