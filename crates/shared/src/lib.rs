//! Shared types, errors, and configuration for Aidra.
//!
//! This crate provides common types used across all other crates:
//! - Money rounding/conversion helpers with decimal precision
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
