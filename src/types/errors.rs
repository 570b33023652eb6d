//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the PSA bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Validation errors (map to JSON-RPC invalid params).
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity absent, or present but lacking a usable display field.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing capability structurally unsupported for this tenant
    /// (e.g. a 405 response for an entity collection).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Transient backing-API failures (network, timeout, 5xx).
    #[error("api error: {0}")]
    Api(String),

    /// Configuration loading/validation errors.
    #[error("config error: {0}")]
    Config(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport errors.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to a JSON-RPC 2.0 error code.
    ///
    /// Parse and invalid-params failures use the codes reserved by the
    /// JSON-RPC spec; everything surfaced from tool execution maps into
    /// the implementation-defined server-error range.
    pub fn to_rpc_code(&self) -> i64 {
        match self {
            Error::Validation(_) => -32602,
            Error::NotFound(_) => -32001,
            Error::Unavailable(_) => -32002,
            Error::Api(_) | Error::Http(_) => -32003,
            Error::Config(_) => -32004,
            Error::Serialization(_) => -32700,
            Error::Internal(_) | Error::Io(_) => -32603,
        }
    }

    /// True for failures worth retrying later (network-class errors).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Api(_) | Error::Http(_))
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_codes() {
        assert_eq!(Error::validation("x").to_rpc_code(), -32602);
        assert_eq!(Error::not_found("x").to_rpc_code(), -32001);
        assert_eq!(Error::unavailable("x").to_rpc_code(), -32002);
        assert_eq!(Error::api("x").to_rpc_code(), -32003);
        assert_eq!(Error::internal("x").to_rpc_code(), -32603);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::api("timeout").is_transient());
        assert!(!Error::not_found("gone").is_transient());
        assert!(!Error::unavailable("405").is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::not_found("company 42");
        assert_eq!(err.to_string(), "not found: company 42");
    }
}
