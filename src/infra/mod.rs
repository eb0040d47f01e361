//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides configuration management (trusted keys, output preferences) and
//! the crate-wide error type.

pub mod config;
pub mod error;
