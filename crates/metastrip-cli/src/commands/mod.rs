//! Subcommand implementations.

pub mod check;
pub mod clean;
pub mod completion;
pub mod formats;
pub mod show;
