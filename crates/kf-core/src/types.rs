//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default host a forward listener binds to when a forward names only a port
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// Transport protocol of a forward
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Stream forwarding over TCP
    #[default]
    Tcp,
    /// Datagram forwarding (not implemented)
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(ConfigError::Invalid(format!("unknown protocol: {}", other))),
        }
    }
}

/// A local listener paired with the remote address it forwards to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardSpec {
    /// Local address to listen on (`host:port`)
    pub bind: String,
    /// Remote address to dial through the transport (`host:port`)
    pub remote: String,
    /// Transport protocol
    #[serde(default)]
    pub protocol: Protocol,
}

impl ForwardSpec {
    /// Create a TCP forward spec
    pub fn tcp(bind: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            remote: remote.into(),
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.bind, self.remote, self.protocol)
    }
}

/// Parses `[bind_host:]bind_port:remote_host:remote_port`.
///
/// IPv6 hosts must be bracketed, e.g. `[::1]:8080:[fe80::1]:80`.
impl FromStr for ForwardSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_outside_brackets(s);
        let (bind_host, bind_port, remote_host, remote_port) = match parts.as_slice() {
            [port, host, rport] => (DEFAULT_BIND_HOST, *port, *host, *rport),
            [bhost, port, host, rport] => (*bhost, *port, *host, *rport),
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "forward spec must be [bind_host:]port:host:port, got '{}'",
                    s
                )))
            }
        };

        let bind_port = parse_port(bind_port)?;
        let remote_port = parse_port(remote_port)?;
        if remote_host.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "forward spec '{}' has an empty remote host",
                s
            )));
        }
        let bind_host = if bind_host.is_empty() {
            DEFAULT_BIND_HOST
        } else {
            bind_host
        };

        Ok(Self::tcp(
            format!("{}:{}", bind_host, bind_port),
            format!("{}:{}", remote_host, remote_port),
        ))
    }
}

fn parse_port(s: &str) -> Result<u16, ConfigError> {
    s.parse::<u16>()
        .map_err(|_| ConfigError::Invalid(format!("invalid port: '{}'", s)))
}

fn split_outside_brackets(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split a `host:port` address, accepting bracketed IPv6 hosts
pub fn split_host_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

/// Authentication protocol and cookie for an X display
#[derive(Clone, PartialEq, Eq)]
pub struct DisplayCredential {
    /// Authentication protocol name, e.g. `MIT-MAGIC-COOKIE-1`
    pub protocol_name: String,
    /// Raw cookie bytes
    pub cookie: Vec<u8>,
}

impl fmt::Debug for DisplayCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayCredential")
            .field("protocol_name", &self.protocol_name)
            .field("cookie", &format_args!("<{} bytes>", self.cookie.len()))
            .finish()
    }
}
