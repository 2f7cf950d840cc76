//! Core error types for k-Forward

use kf_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a transport implementation
pub type TransportSource = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for forwarding operations
#[derive(Error, Debug)]
pub enum ForwardError {
    /// Configuration or environment could not be resolved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A system lookup (hostname) failed
    #[error("System error: {0}")]
    System(#[source] std::io::Error),

    /// A file or socket could not be opened
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed credential data or a refused request
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No authority record matched
    #[error("No X authority entry for {hostname} display {display}")]
    NotFound { hostname: String, display: String },

    /// Listener could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote endpoint could not be dialed
    #[error("Failed to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: TransportSource,
    },

    /// Error reported by the transport session
    #[error("Transport error: {0}")]
    Transport(#[source] TransportSource),

    /// Channel-open events of this type already have a subscriber
    #[error("Channel type already subscribed: {0}")]
    AlreadySubscribed(String),

    /// Requested feature is not implemented
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ForwardError {
    /// Wrap a transport implementation error
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field or environment variable
    #[error("Missing required field: {0}")]
    MissingField(String),
}
