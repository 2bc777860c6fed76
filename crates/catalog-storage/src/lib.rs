//! Catalog Storage crate - SQLite persistence for indexed records.
//!
//! Provides a WAL-mode SQLite database with migrations and a record
//! repository used to write the vector index through to disk and to warm
//! it again on startup.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::RecordRepository;
