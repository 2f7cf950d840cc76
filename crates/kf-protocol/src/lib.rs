//! kf-protocol: Byte-level formats for k-Forward
//!
//! This crate defines the two binary formats the forwarder speaks:
//! the X authority record layout read from the credential store, and the
//! SSH wire encoding of the `x11-req` channel request payload.

pub mod error;
pub mod wire;
pub mod x11;
pub mod xauth;

pub use error::ProtocolError;
pub use x11::{X11Request, MIT_MAGIC_COOKIE, X11_CHANNEL_TYPE, X11_REQUEST};
pub use xauth::{XauthRecord, RecordReader, DEFAULT_MAX_FIELD_LEN, FAMILY_LOCAL};
