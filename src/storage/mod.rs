//! `SQLite` storage layer.
//!
//! Owns the schema, the lookup tables the filter builder resolves against,
//! and execution of [`TicketQuery`](crate::filter::TicketQuery) values.

pub mod import;
pub mod schema;
pub mod sqlite;

pub use import::{ImportFile, ImportSummary};
pub use sqlite::SqliteStorage;
