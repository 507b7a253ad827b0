//! Custos Database: SurrealDB connection management, schema
//! migrations and storage backends for the `custos-core` repository
//! traits.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - SurrealDB repositories ([`repository`])
//! - An in-process backend for tests and local runs ([`MemoryStore`])
//! - Error types ([`DbError`])

mod connection;
mod error;
mod memory;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager, MEMORY_URL};
pub use error::DbError;
pub use memory::MemoryStore;
pub use schema::{latest_version, run_migrations, schema_v1};
