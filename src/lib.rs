//! `traq_rust` - ticket filtering for the traq issue tracker.
//!
//! The core is [`filter::TicketFilterQuery`], which turns loosely typed
//! filter input into a project scoped ticket query backed by `SQLite`.

#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod storage;

pub use error::{ErrorCode, Result, StructuredError, TraqError};
