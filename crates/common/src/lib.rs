//! Shared configuration and error handling for Lovelace
//!
//! This crate provides common functionality used across the Lovelace relay:
//! - Configuration management following 12-factor principles
//! - Error types and handling

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
