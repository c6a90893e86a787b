//! Table schemas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    /// SQL type name used in table definitions.
    pub fn sql_name(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" | "int" => Ok(Self::Integer),
            "real" | "float" => Ok(Self::Real),
            "text" | "string" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            _ => Err(format!("unknown column type: {s}")),
        }
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
}

/// Definition of a table: ordered columns plus an optional primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    primary_keys: Vec<String>,
}

impl TableSchema {
    pub fn builder(name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary key columns; empty when the table has no declared key.
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }
}

/// Builder for [`TableSchema`].
#[derive(Debug, Clone)]
pub struct TableSchemaBuilder {
    name: String,
    columns: Vec<Column>,
    primary_keys: Vec<String>,
}

impl TableSchemaBuilder {
    /// Add a nullable column.
    #[must_use]
    pub fn column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_with(name, column_type, false)
    }

    /// Add a `NOT NULL` column.
    #[must_use]
    pub fn not_null_column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_with(name, column_type, true)
    }

    #[must_use]
    pub fn column_with(
        mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        not_null: bool,
    ) -> Self {
        self.columns.push(Column {
            name: name.into(),
            column_type,
            not_null,
        });
        self
    }

    /// Append primary key columns. Multiple columns form a composite key.
    #[must_use]
    pub fn primary_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> TableSchema {
        TableSchema {
            name: self.name,
            columns: self.columns,
            primary_keys: self.primary_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_column_order() {
        let schema = TableSchema::builder("homes")
            .not_null_column("owner", ColumnType::Text)
            .column("x", ColumnType::Real)
            .column("note", ColumnType::Text)
            .primary_key(["owner"])
            .build();

        let names: Vec<_> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "x", "note"]);
        assert!(schema.columns()[0].not_null);
        assert!(!schema.columns()[1].not_null);
        assert_eq!(schema.primary_keys(), ["owner".to_string()]);
    }

    #[test]
    fn test_column_type_parse() {
        assert_eq!("INTEGER".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("blob".parse::<ColumnType>().unwrap(), ColumnType::Blob);
        assert!("json".parse::<ColumnType>().is_err());
    }
}
