//! Shared library for the shop review services
//!
//! This library contains functionality used by every service binary:
//! - Error type with HTTP mapping
//! - Environment-driven configuration

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorResponse, Result};
