//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use kf_protocol::xauth::DEFAULT_MAX_FIELD_LEN;

use super::serde_utils::{duration_secs, optional_duration_secs};
use crate::error::ConfigError;
use crate::types::{ForwardSpec, Protocol};

/// Configuration for the forwarding client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// SSH server to connect to (`host:port`)
    pub server_address: String,

    /// Username for SSH authentication
    pub username: String,

    /// Path to the private key for authentication
    pub private_key_path: PathBuf,

    /// Expected server host key fingerprint
    pub server_host_key: Option<String>,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Local listeners forwarded through the server
    pub local_forwards: Vec<ForwardSpec>,

    /// X11 forwarding settings
    pub x11: X11Config,

    /// Relay settings shared by all forwards
    pub relay: RelayConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "localhost:22".to_string(),
            username: whoami::username(),
            private_key_path: dirs::home_dir()
                .unwrap_or_default()
                .join(".ssh")
                .join("id_ed25519"),
            server_host_key: None,
            connect_timeout: Duration::from_secs(30),
            local_forwards: vec![],
            x11: X11Config::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_address.is_empty() {
            return Err(ConfigError::MissingField("server_address".into()));
        }
        if self.username.is_empty() {
            return Err(ConfigError::MissingField("username".into()));
        }
        if self.relay.buffer_size == 0 {
            return Err(ConfigError::Invalid("relay.buffer_size must be > 0".into()));
        }
        if self.x11.max_field_len == 0 || self.x11.max_field_len > u16::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "x11.max_field_len must be between 1 and {}",
                u16::MAX
            )));
        }
        for spec in &self.local_forwards {
            if spec.protocol == Protocol::Udp {
                return Err(ConfigError::Invalid(format!(
                    "udp forwarding is not supported: {}",
                    spec
                )));
            }
        }
        Ok(())
    }
}

/// X11 forwarding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct X11Config {
    /// Request X11 forwarding on the session channel
    pub enabled: bool,

    /// Longest field accepted from the authority file
    pub max_field_len: usize,
}

impl Default for X11Config {
    fn default() -> Self {
        Self {
            enabled: false,
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

/// Byte relay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Read buffer size per direction
    pub buffer_size: usize,

    /// Close a direction when a read waits longer than this
    #[serde(
        with = "optional_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: 16 * 1024,
            idle_timeout: None,
        }
    }
}
