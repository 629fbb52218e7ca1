//! Common error types and handling for Lovelace

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for configuration and startup
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),
}
