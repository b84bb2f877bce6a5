//! Error types for Toolrun

use thiserror::Error;

/// Main error type for Toolrun operations
#[derive(Error, Debug)]
pub enum ToolrunError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// Upstream HTTP client errors
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Toolrun operations
pub type Result<T> = std::result::Result<T, ToolrunError>;
