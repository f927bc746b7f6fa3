//! Database layer - connection pool, migrations and repositories
//!
//! # Design Principles
//!
//! - Connection pool (max 5 connections by default) - no Arc<Mutex<Connection>>
//! - Transient failures are retried by the core executor, then surfaced unchanged
//! - All list operations use JOINs - no N+1 queries
//! - Transactions for multi-step operations

mod error;
pub mod migrations;
pub mod pool;
pub mod repos;

pub use error::DbError;
pub use pool::{create_lazy_pool, create_pool, Database, PoolConnector, DEFAULT_MAX_CONNECTIONS};
pub use repos::*;
