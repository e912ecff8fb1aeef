//! Adapter implementations
//!
//! Concrete implementations of the port traits.

pub mod duckdb;
pub mod generator;
pub mod memory;
pub mod row_lock;
