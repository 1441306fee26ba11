//! Persistence layer for coachbook: models, connection pool, embedded
//! migrations, and per-table query modules over PostgreSQL.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
