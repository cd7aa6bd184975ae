//! Core types and configuration for the CE/PE comparison pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Snapshot and aggregate record types
//! - Configuration structures
//! - Common error and warning types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
