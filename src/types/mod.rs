//! Data model: values, rows, predicates and table schemas.

mod row;
mod schema;
mod value;

pub use row::{Predicate, Row};
pub use schema::{Column, ColumnType, TableSchema, TableSchemaBuilder};
pub use value::Value;
