//! gf-db: durable job record store.
//!
//! This crate provides SQLite-backed storage with connection pooling,
//! embedded migrations, typed models, free query functions over a
//! `&Connection`, and the [`JobStore`] trait the queue engine is written
//! against.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use models::{Job, JobCounts, JobFilter, LogEntry};
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
pub use store::{JobStore, SqliteJobStore};
