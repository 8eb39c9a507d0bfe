//! Command implementations for the `lumen` binary.

pub mod config;
pub mod interactive;
pub mod models;
pub mod rank;
