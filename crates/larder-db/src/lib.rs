//! Persistence layer for larder: row models, embedded migrations and query
//! functions over PostgreSQL.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
