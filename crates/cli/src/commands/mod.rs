//! Subcommand implementations

pub mod models;
pub mod predict;
pub mod stats;
