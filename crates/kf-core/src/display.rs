//! X display name parsing
//!
//! A display name has the form `[host]:display[.screen]`. An empty host or
//! `unix` means the local Unix socket under `/tmp/.X11-unix`; any other host
//! is reached over TCP at port `6000 + display`. A value starting with `/`
//! is itself the socket path (as set by XQuartz/launchd).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::env::{Environment, DISPLAY_VAR};
use crate::error::ConfigError;

/// Directory holding local X server sockets
pub const X11_UNIX_DIR: &str = "/tmp/.X11-unix";

/// First TCP port used by X servers
pub const X11_TCP_BASE_PORT: u16 = 6000;

/// Where the local X server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    /// Unix domain socket path
    Unix(PathBuf),
    /// TCP host and port
    Tcp { host: String, port: u16 },
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayTarget::Unix(path) => write!(f, "unix:{}", path.display()),
            DisplayTarget::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
        }
    }
}

/// A parsed `DISPLAY` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySpec {
    /// Host part, `None` when empty
    pub host: Option<String>,
    /// Display number
    pub display: u32,
    /// Explicit socket path when the value started with `/`
    pub socket_path: Option<PathBuf>,
}

impl DisplaySpec {
    /// Read and parse `DISPLAY` from the environment
    pub fn from_env(env: &dyn Environment) -> Result<Self, ConfigError> {
        let value = env
            .var(DISPLAY_VAR)
            .ok_or_else(|| ConfigError::MissingField(DISPLAY_VAR.to_string()))?;
        value.parse()
    }

    /// Display number from `DISPLAY`, or 0 if it is missing or malformed
    pub fn display_number_or_default(env: &dyn Environment) -> u32 {
        match Self::from_env(env) {
            Ok(spec) => spec.display,
            Err(e) => {
                tracing::warn!("Falling back to display 0: {}", e);
                0
            }
        }
    }

    /// Endpoint of the X server this display refers to
    pub fn target(&self) -> Result<DisplayTarget, ConfigError> {
        if let Some(path) = &self.socket_path {
            return Ok(DisplayTarget::Unix(path.clone()));
        }

        match self.host.as_deref() {
            None | Some("unix") => Ok(DisplayTarget::Unix(
                PathBuf::from(X11_UNIX_DIR).join(format!("X{}", self.display)),
            )),
            Some(host) => {
                let port = u16::try_from(self.display)
                    .ok()
                    .and_then(|d| X11_TCP_BASE_PORT.checked_add(d))
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "display number {} out of TCP range",
                            self.display
                        ))
                    })?;
                Ok(DisplayTarget::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }
}

impl FromStr for DisplaySpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::Invalid(format!("bad display string: '{}'", s));

        let colon = s.rfind(':').ok_or_else(bad)?;
        let (host, rest) = (&s[..colon], &s[colon + 1..]);
        let (display, screen) = match rest.split_once('.') {
            Some((d, sc)) => (d, Some(sc)),
            None => (rest, None),
        };

        let display: u32 = display.parse().map_err(|_| bad())?;
        // Forwarding always requests screen 0; the suffix only has to be well formed.
        if let Some(screen) = screen {
            screen.parse::<u32>().map_err(|_| bad())?;
        }

        let socket_path = s.starts_with('/').then(|| PathBuf::from(s));
        let host = (!host.is_empty() && socket_path.is_none()).then(|| host.to_string());

        Ok(Self {
            host,
            display,
            socket_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnvironment;

    #[test]
    fn test_local_display() {
        let spec: DisplaySpec = ":0".parse().unwrap();
        assert_eq!(spec.host, None);
        assert_eq!(spec.display, 0);
        assert_eq!(
            spec.target().unwrap(),
            DisplayTarget::Unix(PathBuf::from("/tmp/.X11-unix/X0"))
        );
    }

    #[test]
    fn test_display_with_screen() {
        let spec: DisplaySpec = ":12.3".parse().unwrap();
        assert_eq!(spec.display, 12);
        assert_eq!(spec.host, None);
    }

    #[test]
    fn test_unix_host_is_local() {
        let spec: DisplaySpec = "unix:1".parse().unwrap();
        assert_eq!(
            spec.target().unwrap(),
            DisplayTarget::Unix(PathBuf::from("/tmp/.X11-unix/X1"))
        );
    }

    #[test]
    fn test_remote_host_uses_tcp() {
        let spec: DisplaySpec = "workstation:10.0".parse().unwrap();
        assert_eq!(
            spec.target().unwrap(),
            DisplayTarget::Tcp {
                host: "workstation".into(),
                port: 6010
            }
        );
    }

    #[test]
    fn test_socket_path_display() {
        let raw = "/private/tmp/com.apple.launchd.abc/org.xquartz:0";
        let spec: DisplaySpec = raw.parse().unwrap();
        assert_eq!(spec.display, 0);
        assert_eq!(spec.host, None);
        assert_eq!(spec.target().unwrap(), DisplayTarget::Unix(PathBuf::from(raw)));
    }

    #[test]
    fn test_malformed_display() {
        assert!("localhost".parse::<DisplaySpec>().is_err());
        assert!(":abc".parse::<DisplaySpec>().is_err());
        assert!(":0.x".parse::<DisplaySpec>().is_err());
    }

    #[test]
    fn test_display_number_fallback() {
        let env = StaticEnvironment::new();
        assert_eq!(DisplaySpec::display_number_or_default(&env), 0);

        let env = StaticEnvironment::new().with_var(DISPLAY_VAR, "garbage");
        assert_eq!(DisplaySpec::display_number_or_default(&env), 0);

        let env = StaticEnvironment::new().with_var(DISPLAY_VAR, "localhost:11.0");
        assert_eq!(DisplaySpec::display_number_or_default(&env), 11);
    }
}
