//! Shared types, errors, and configuration for Kasira.
//!
//! This crate provides common types used across all other crates:
//! - Currency and minor-unit amount helpers
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - The engine-wide error taxonomy
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{EngineError, EngineResult};
