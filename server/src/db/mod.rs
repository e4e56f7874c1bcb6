//! Database module for PostgreSQL persistence of partition logs.

mod operations;
mod pool;

pub use operations::*;
pub use pool::*;
