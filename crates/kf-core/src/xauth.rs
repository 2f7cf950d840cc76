//! X authority credential lookup
//!
//! Finds the cookie for a local display in the user's authority file
//! (`$XAUTHORITY`, falling back to `$HOME/.Xauthority`).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;

use kf_protocol::xauth::{RecordReader, DEFAULT_MAX_FIELD_LEN};

use crate::env::{Environment, HOME_VAR, XAUTHORITY_VAR};
use crate::error::{ConfigError, ForwardError};
use crate::types::DisplayCredential;

/// Authority file name under the home directory
pub const XAUTHORITY_FILE: &str = ".Xauthority";

/// Looks up display credentials in the X authority file
#[derive(Clone)]
pub struct XauthReader {
    env: Arc<dyn Environment>,
    max_field_len: usize,
}

impl XauthReader {
    /// Create a reader using the given environment
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self {
            env,
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    /// Reject records with any field longer than `max_field_len` bytes
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len;
        self
    }

    /// Path of the authority file
    pub fn authority_path(&self) -> Result<PathBuf, ForwardError> {
        if let Some(path) = self.env.var(XAUTHORITY_VAR) {
            return Ok(PathBuf::from(path));
        }

        let home = self.env.var(HOME_VAR).ok_or_else(|| {
            ConfigError::MissingField(format!(
                "Xauthority not found: ${} and ${} not set",
                XAUTHORITY_VAR, HOME_VAR
            ))
        })?;
        Ok(PathBuf::from(home).join(XAUTHORITY_FILE))
    }

    /// Hostname to match, substituting the local hostname for `""` and `localhost`
    pub fn resolve_hostname(&self, hostname: &str) -> Result<String, ForwardError> {
        if hostname.is_empty() || hostname == "localhost" {
            self.env.hostname().map_err(ForwardError::System)
        } else {
            Ok(hostname.to_string())
        }
    }

    /// Find the first local-family credential for `hostname` and `display`
    pub fn find_credential(
        &self,
        hostname: &str,
        display: &str,
    ) -> Result<DisplayCredential, ForwardError> {
        let path = self.authority_path()?;
        let hostname = self.resolve_hostname(hostname)?;

        let file = File::open(&path)?;
        tracing::debug!("Reading X authority from {:?}", path);

        find_in(
            BufReader::new(file),
            &hostname,
            display,
            self.max_field_len,
        )
    }
}

/// Scan authority records from `reader` for a matching local entry
pub fn find_in<R: Read>(
    reader: R,
    hostname: &str,
    display: &str,
    max_field_len: usize,
) -> Result<DisplayCredential, ForwardError> {
    let mut records = RecordReader::with_max_field_len(reader, max_field_len);

    while let Some(record) = records.next_record()? {
        if record.matches(hostname, display) {
            return Ok(DisplayCredential {
                protocol_name: String::from_utf8_lossy(&record.name).into_owned(),
                cookie: record.data,
            });
        }
    }

    Err(ForwardError::NotFound {
        hostname: hostname.to_string(),
        display: display.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnvironment;
    use bytes::BytesMut;
    use kf_protocol::xauth::{XauthRecord, FAMILY_LOCAL};
    use kf_protocol::ProtocolError;

    fn record(family: u16, address: &str, display: &str, data: &[u8]) -> XauthRecord {
        XauthRecord {
            family,
            address: address.as_bytes().to_vec(),
            display: display.as_bytes().to_vec(),
            name: b"MIT-MAGIC-COOKIE-1".to_vec(),
            data: data.to_vec(),
        }
    }

    fn encode(records: &[XauthRecord]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for r in records {
            r.encode(&mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn test_first_match_wins() {
        let bytes = encode(&[
            record(0, "myhost", "0", &[1]),
            record(FAMILY_LOCAL, "myhost", "1", &[2]),
            record(FAMILY_LOCAL, "myhost", "0", &[3]),
            record(FAMILY_LOCAL, "myhost", "0", &[4]),
        ]);

        let cred = find_in(&bytes[..], "myhost", "0", 256).unwrap();
        assert_eq!(cred.cookie, vec![3]);
        assert_eq!(cred.protocol_name, "MIT-MAGIC-COOKIE-1");
    }

    #[test]
    fn test_no_match_is_not_found() {
        let bytes = encode(&[record(FAMILY_LOCAL, "other", "0", &[1])]);

        let err = find_in(&bytes[..], "myhost", "0", 256).unwrap_err();
        assert!(matches!(err, ForwardError::NotFound { .. }));
    }

    #[test]
    fn test_oversize_field_is_protocol_error() {
        let bytes = encode(&[
            record(FAMILY_LOCAL, "other", "0", &[1]),
            record(FAMILY_LOCAL, "myhost", "0", &[7; 64]),
        ]);

        let err = find_in(&bytes[..], "myhost", "0", 32).unwrap_err();
        assert!(matches!(
            err,
            ForwardError::Protocol(ProtocolError::FieldTooLong { len: 64, max: 32 })
        ));
    }

    #[test]
    fn test_match_before_oversize_record() {
        let bytes = encode(&[
            record(FAMILY_LOCAL, "myhost", "0", &[5]),
            record(FAMILY_LOCAL, "myhost", "0", &[7; 64]),
        ]);

        let cred = find_in(&bytes[..], "myhost", "0", 32).unwrap();
        assert_eq!(cred.cookie, vec![5]);
    }

    #[test]
    fn test_authority_path_prefers_xauthority() {
        let env = StaticEnvironment::new()
            .with_var(XAUTHORITY_VAR, "/run/user/1000/xauth")
            .with_var(HOME_VAR, "/home/me");
        let reader = XauthReader::new(Arc::new(env));
        assert_eq!(
            reader.authority_path().unwrap(),
            PathBuf::from("/run/user/1000/xauth")
        );
    }

    #[test]
    fn test_authority_path_falls_back_to_home() {
        let env = StaticEnvironment::new().with_var(HOME_VAR, "/home/me");
        let reader = XauthReader::new(Arc::new(env));
        assert_eq!(
            reader.authority_path().unwrap(),
            PathBuf::from("/home/me/.Xauthority")
        );
    }

    #[test]
    fn test_authority_path_unresolvable() {
        let reader = XauthReader::new(Arc::new(StaticEnvironment::new()));
        assert!(matches!(
            reader.authority_path(),
            Err(ForwardError::Config(_))
        ));
    }

    #[test]
    fn test_localhost_resolves_to_hostname() {
        let env = StaticEnvironment::new().with_hostname("myhost");
        let reader = XauthReader::new(Arc::new(env));
        assert_eq!(reader.resolve_hostname("").unwrap(), "myhost");
        assert_eq!(reader.resolve_hostname("localhost").unwrap(), "myhost");
        assert_eq!(reader.resolve_hostname("box").unwrap(), "box");
    }

    #[test]
    fn test_hostname_failure_is_system_error() {
        let reader = XauthReader::new(Arc::new(StaticEnvironment::new()));
        assert!(matches!(
            reader.resolve_hostname(""),
            Err(ForwardError::System(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let env = StaticEnvironment::new()
            .with_var(XAUTHORITY_VAR, dir.path().join("missing").to_string_lossy())
            .with_hostname("myhost");
        let reader = XauthReader::new(Arc::new(env));

        assert!(matches!(
            reader.find_credential("", "0"),
            Err(ForwardError::Io(_))
        ));
    }
}
