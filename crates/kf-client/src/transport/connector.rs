//! Outbound SSH connector
//!
//! Connects and authenticates to the configured server. No retries: a
//! failed connection is reported to the caller as-is.

use std::sync::Arc;

use anyhow::anyhow;
use russh::client::{self, Config};
use russh_keys::key::KeyPair;
use thiserror::Error;

use kf_core::config::ClientConfig;

use super::client::{ClientHandler, SshClient};

/// Connection errors that may require special handling
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Private key file missing or unreadable
    #[error("Private key not found at {path}: {source}")]
    KeyNotFound {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Authentication was rejected by the server
    #[error("Authentication rejected by server")]
    AuthRejected,

    /// Host key verification failed
    #[error("Host key verification failed: {message}")]
    HostKeyRejected { message: String },

    /// Other connection error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Establishes authenticated SSH connections
pub struct SshConnector {
    /// Client configuration
    config: ClientConfig,
    /// Private key for authentication
    key: Arc<KeyPair>,
}

impl SshConnector {
    /// Create a connector, loading the configured private key
    pub fn new(config: ClientConfig) -> Result<Self, ConnectionError> {
        if !config.private_key_path.exists() {
            return Err(ConnectionError::KeyNotFound {
                path: config.private_key_path.display().to_string(),
                source: anyhow!("File does not exist"),
            });
        }

        let key = russh_keys::load_secret_key(&config.private_key_path, None).map_err(|e| {
            ConnectionError::KeyNotFound {
                path: config.private_key_path.display().to_string(),
                source: anyhow!("Failed to load key: {}", e),
            }
        })?;

        Ok(Self {
            config,
            key: Arc::new(key),
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect and authenticate once
    pub async fn connect(&self) -> Result<SshClient, ConnectionError> {
        let ssh_config = Arc::new(Config::default());
        let (handler, x11_slot) = ClientHandler::new(self.config.server_host_key.clone());

        tracing::debug!("Connecting to {}", self.config.server_address);
        let mut handle = tokio::time::timeout(
            self.config.connect_timeout,
            client::connect(ssh_config, &self.config.server_address, handler),
        )
        .await
        .map_err(|_| anyhow!("Connection to {} timed out", self.config.server_address))?
        .map_err(|e| {
            let err_str = e.to_string();
            // russh reports a rejected key from check_server_key this way
            if err_str.contains("Unknown server key") || err_str.contains("server key") {
                return ConnectionError::HostKeyRejected {
                    message: format!(
                        "Host key of {} does not match the configured fingerprint",
                        self.config.server_address
                    ),
                };
            }
            ConnectionError::Other(anyhow!(
                "Failed to connect to {}: {}",
                self.config.server_address,
                e
            ))
        })?;

        tracing::debug!("Authenticating as user '{}'", self.config.username);
        let authenticated = handle
            .authenticate_publickey(&self.config.username, Arc::clone(&self.key))
            .await
            .map_err(|e| anyhow!("Authentication error: {}", e))?;

        if !authenticated {
            return Err(ConnectionError::AuthRejected);
        }

        tracing::info!(
            "Connected to {} as {}",
            self.config.server_address,
            self.config.username
        );
        Ok(SshClient::new(handle, x11_slot))
    }
}
