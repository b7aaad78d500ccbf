//! Subcommand implementations.

pub mod counts;
pub mod import;
pub mod init;
pub mod tickets;
