//! Error types for Manga Saver.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Main error type for scraping and caching operations.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// A caller supplied a malformed value (bad title, URL, selector, chapter).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs state that has not been established yet.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A well-formed request found no matching data.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure that is not translated at this layer.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Error type for the HTTP transport.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The host refused the connection or never answered
    #[error("Unreachable: {0}")]
    Unreachable(String),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}
