//! SSH wire encoding helpers
//!
//! Implements the subset of RFC 4251 data types used by channel request
//! payloads:
//! - `boolean`: 1 byte, 0 = false, anything else = true
//! - `uint32`: 4 bytes, big-endian
//! - `string`: uint32 length followed by that many raw bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Append an SSH `boolean`
pub fn put_bool(dst: &mut BytesMut, value: bool) {
    dst.put_u8(u8::from(value));
}

/// Append an SSH `string`
pub fn put_string(dst: &mut BytesMut, value: &[u8]) {
    dst.reserve(4 + value.len());
    dst.put_u32(value.len() as u32);
    dst.put_slice(value);
}

/// Read an SSH `boolean`
pub fn get_bool(src: &mut Bytes) -> Result<bool, ProtocolError> {
    if src.remaining() < 1 {
        return Err(ProtocolError::Malformed("missing boolean".into()));
    }
    Ok(src.get_u8() != 0)
}

/// Read an SSH `uint32`
pub fn get_u32(src: &mut Bytes) -> Result<u32, ProtocolError> {
    if src.remaining() < 4 {
        return Err(ProtocolError::Malformed("missing uint32".into()));
    }
    Ok(src.get_u32())
}

/// Read an SSH `string` as raw bytes
pub fn get_string(src: &mut Bytes) -> Result<Bytes, ProtocolError> {
    let len = get_u32(src)? as usize;
    if src.remaining() < len {
        return Err(ProtocolError::Malformed(format!(
            "string length {} exceeds remaining {} bytes",
            len,
            src.remaining()
        )));
    }
    Ok(src.split_to(len))
}

/// Read an SSH `string` that must be valid UTF-8
pub fn get_utf8(src: &mut Bytes) -> Result<String, ProtocolError> {
    let raw = get_string(src)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| ProtocolError::Malformed("string is not valid UTF-8".into()))
}
