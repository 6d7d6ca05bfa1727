//! Error types for the port sync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for port sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the port sync system
#[derive(Error, Debug)]
pub enum Error {
    /// Port source-related errors (missing or unreadable file)
    #[error("Port source error: {0}")]
    PortSource(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failures (connection refused, timeout, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP responses from the management API
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors (rejected credentials or expired session)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Torrent client-specific error
    #[error("Client error ({client}): {message}")]
    Client {
        /// Client name
        client: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a port source error
    pub fn port_source(msg: impl Into<String>) -> Self {
        Self::PortSource(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a client-specific error
    pub fn client(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Client {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the session (or the credentials) were rejected
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authentication_errors_are_auth() {
        assert!(Error::auth("session expired").is_auth());
        assert!(!Error::http("500 Internal Server Error").is_auth());
        assert!(!Error::network("connection refused").is_auth());
        assert!(!Error::client("qbittorrent", "Forbidden").is_auth());
    }

    #[test]
    fn every_variant_has_a_constructor() {
        let errors = [
            Error::port_source("missing"),
            Error::config("bad"),
            Error::network("refused"),
            Error::http("502"),
            Error::auth("403"),
            Error::client("qbittorrent", "bad body"),
        ];

        for err in &errors {
            // No wildcard arm: a new variant needs a constructor above
            let kind = match err {
                Error::PortSource(_) => "port source",
                Error::Config(_) => "config",
                Error::Network(_) => "network",
                Error::Http(_) => "http",
                Error::Authentication(_) => "auth",
                Error::Client { .. } => "client",
            };
            assert!(!kind.is_empty());
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::client("qbittorrent", "bad body");
        assert_eq!(err.to_string(), "Client error (qbittorrent): bad body");
    }
}
