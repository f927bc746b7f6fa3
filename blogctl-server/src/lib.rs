//! blogctl-server: blog backend over Postgres
//!
//! Posts with content blocks, tags, comments, votes, search and a small
//! event calendar, served as a JSON API. Every statement goes through the
//! retrying [`db::Database`] handle.

pub mod config;
pub mod db;
pub mod http;
pub mod models;

pub use config::{AppEnv, ConfigError, ServerConfig};
pub use db::{create_lazy_pool, create_pool, Database, DbError};
pub use http::{build_router, run_server, AppState, ServerError};
