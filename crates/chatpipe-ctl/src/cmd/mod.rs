//! Subcommand implementations.

pub mod init;
pub mod open;
pub mod receive;
pub mod send;
