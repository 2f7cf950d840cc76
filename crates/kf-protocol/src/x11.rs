//! `x11-req` channel request payload
//!
//! The payload following the request name and `want_reply` flag is:
//! - single_connection: boolean
//! - x11_authentication_protocol: string
//! - x11_authentication_cookie: string (hex)
//! - x11_screen_number: uint32

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::wire;

/// Name of the channel request that enables X11 forwarding
pub const X11_REQUEST: &str = "x11-req";

/// Channel type the server uses when opening forwarded X11 connections
pub const X11_CHANNEL_TYPE: &str = "x11";

/// The only authentication protocol the forwarder offers
pub const MIT_MAGIC_COOKIE: &str = "MIT-MAGIC-COOKIE-1";

/// Parameters of an `x11-req` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Request {
    /// Only forward a single connection
    pub single_connection: bool,
    /// Authentication protocol name
    pub auth_protocol: String,
    /// Hex-encoded authentication cookie
    pub auth_cookie: String,
    /// Screen number on the local display
    pub screen_number: u32,
}

impl X11Request {
    /// Build a multi-connection MIT-MAGIC-COOKIE-1 request for screen 0
    pub fn mit_magic_cookie(auth_cookie: impl Into<String>) -> Self {
        Self {
            single_connection: false,
            auth_protocol: MIT_MAGIC_COOKIE.to_string(),
            auth_cookie: auth_cookie.into(),
            screen_number: 0,
        }
    }

    /// Encode the request payload
    pub fn encode(&self) -> Bytes {
        let mut buf =
            BytesMut::with_capacity(1 + 8 + 4 + self.auth_protocol.len() + self.auth_cookie.len());
        wire::put_bool(&mut buf, self.single_connection);
        wire::put_string(&mut buf, self.auth_protocol.as_bytes());
        wire::put_string(&mut buf, self.auth_cookie.as_bytes());
        buf.extend_from_slice(&self.screen_number.to_be_bytes());
        buf.freeze()
    }

    /// Decode a request payload
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut src = Bytes::copy_from_slice(payload);
        let single_connection = wire::get_bool(&mut src)?;
        let auth_protocol = wire::get_utf8(&mut src)?;
        let auth_cookie = wire::get_utf8(&mut src)?;
        let screen_number = wire::get_u32(&mut src)?;

        if !src.is_empty() {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after x11-req payload",
                src.len()
            )));
        }

        Ok(Self {
            single_connection,
            auth_protocol,
            auth_cookie,
            screen_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_field_order() {
        let request = X11Request::mit_magic_cookie("00ff");
        let payload = request.encode();

        let mut expected = vec![0u8];
        expected.extend_from_slice(&18u32.to_be_bytes());
        expected.extend_from_slice(b"MIT-MAGIC-COOKIE-1");
        expected.extend_from_slice(&4u32.to_be_bytes());
        expected.extend_from_slice(b"00ff");
        expected.extend_from_slice(&0u32.to_be_bytes());

        assert_eq!(&payload[..], &expected[..]);
    }

    #[test]
    fn test_decode_encoded() {
        let request = X11Request {
            single_connection: true,
            auth_protocol: MIT_MAGIC_COOKIE.to_string(),
            auth_cookie: "deadbeef".to_string(),
            screen_number: 2,
        };

        let decoded = X11Request::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut payload = X11Request::mit_magic_cookie("ab").encode().to_vec();
        payload.push(0);

        assert!(matches!(
            X11Request::decode(&payload),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_short_payload() {
        assert!(X11Request::decode(&[0, 0, 0]).is_err());
    }
}
