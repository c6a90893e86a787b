//! SQLite storage layer.
//!
//! Provides:
//! - The single store connection with fixed durability pragmas
//! - SQL rendering with quoted identifiers and bound values
//! - The table executor choosing immediate or deferred writes

pub mod backend;
pub mod executor;
pub mod sql;

pub use backend::Backend;
pub use executor::{TableExecutor, WriteMode};
