//! Database layer
//!
//! Pool abstraction, embedded migrations, and trait-based repositories over
//! SQLite or MySQL.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool};
