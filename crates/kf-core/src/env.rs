//! Process environment access
//!
//! Forwarding reads `DISPLAY`, `XAUTHORITY` and `HOME` and needs the local
//! hostname. Both go through [`Environment`] so callers and tests can supply
//! deterministic values instead of process-wide state.

use std::collections::HashMap;
use std::io;

/// Name of the variable holding the X display
pub const DISPLAY_VAR: &str = "DISPLAY";

/// Name of the variable overriding the authority file path
pub const XAUTHORITY_VAR: &str = "XAUTHORITY";

/// Name of the variable holding the user's home directory
pub const HOME_VAR: &str = "HOME";

/// Source of environment variables and the local hostname
pub trait Environment: Send + Sync {
    /// Value of an environment variable, `None` when unset or empty
    fn var(&self, key: &str) -> Option<String>;

    /// Local machine hostname
    fn hostname(&self) -> io::Result<String>;
}

/// Reads the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn hostname(&self) -> io::Result<String> {
        gethostname::gethostname().into_string().map_err(|raw| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hostname is not valid UTF-8: {:?}", raw),
            )
        })
    }
}

/// Fixed set of variables and hostname
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
    hostname: Option<String>,
}

impl StaticEnvironment {
    /// Create an empty environment with no hostname
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Set the hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn hostname(&self) -> io::Result<String> {
        self.hostname
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "hostname not set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_env_empty_is_unset() {
        let env = StaticEnvironment::new().with_var(HOME_VAR, "");
        assert_eq!(env.var(HOME_VAR), None);
    }

    #[test]
    fn test_static_env_hostname() {
        let env = StaticEnvironment::new();
        assert!(env.hostname().is_err());

        let env = env.with_hostname("myhost");
        assert_eq!(env.hostname().unwrap(), "myhost");
    }
}
