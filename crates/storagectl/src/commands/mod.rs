//! Command implementations.

pub mod rows;
pub mod table;
