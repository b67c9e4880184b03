//! Subcommand implementations.

pub mod analyze;
pub mod backends;
pub mod convert;
