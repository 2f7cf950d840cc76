//! X authority record decoding
//!
//! An authority file is a sequence of records, each laid out as:
//! - family: 2 bytes (u16, big-endian)
//! - address, display, name, data: each a 2-byte big-endian length
//!   followed by that many raw bytes
//!
//! Records are read until end of input. There is no header or trailer.

use std::io::{self, Read};

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Address family for local (non-network) connections, per `Xauth.h`
pub const FAMILY_LOCAL: u16 = 256;

/// Default upper bound on a single field's length
///
/// Hostnames, display numbers, protocol names and cookies all fit well
/// inside this; larger fields indicate a corrupt file.
pub const DEFAULT_MAX_FIELD_LEN: usize = 256;

/// One entry of an X authority file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XauthRecord {
    /// Address family
    pub family: u16,
    /// Host address (hostname for `FAMILY_LOCAL`)
    pub address: Vec<u8>,
    /// Display number as ASCII digits
    pub display: Vec<u8>,
    /// Authentication protocol name
    pub name: Vec<u8>,
    /// Authentication data (the cookie)
    pub data: Vec<u8>,
}

impl XauthRecord {
    /// Whether this record is a local-family entry for `hostname` and `display`
    pub fn matches(&self, hostname: &str, display: &str) -> bool {
        self.family == FAMILY_LOCAL
            && self.address == hostname.as_bytes()
            && self.display == display.as_bytes()
    }

    /// Encode the record in authority-file layout
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16(self.family);
        for field in [&self.address, &self.display, &self.name, &self.data] {
            dst.put_u16(field.len() as u16);
            dst.put_slice(field);
        }
    }
}

/// Sequential reader over authority records
pub struct RecordReader<R> {
    inner: R,
    max_field_len: usize,
}

impl<R: Read> RecordReader<R> {
    /// Create a reader with the default field limit
    pub fn new(inner: R) -> Self {
        Self::with_max_field_len(inner, DEFAULT_MAX_FIELD_LEN)
    }

    /// Create a reader that rejects fields longer than `max_field_len`
    pub fn with_max_field_len(inner: R, max_field_len: usize) -> Self {
        Self {
            inner,
            max_field_len,
        }
    }

    /// Decode the next record
    ///
    /// Returns `Ok(None)` on a clean end of input at a record boundary.
    /// End of input anywhere inside a record is `ProtocolError::Truncated`.
    pub fn next_record(&mut self) -> Result<Option<XauthRecord>, ProtocolError> {
        let family = match self.read_family()? {
            Some(family) => family,
            None => return Ok(None),
        };

        let address = self.read_field()?;
        let display = self.read_field()?;
        let name = self.read_field()?;
        let data = self.read_field()?;

        tracing::trace!(
            family,
            address_len = address.len(),
            data_len = data.len(),
            "decoded authority record"
        );

        Ok(Some(XauthRecord {
            family,
            address,
            display,
            name,
            data,
        }))
    }

    fn read_family(&mut self) -> Result<Option<u16>, ProtocolError> {
        let mut buf = [0u8; 2];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(ProtocolError::Truncated),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(u16::from_be_bytes(buf)))
    }

    fn read_field(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut len = [0u8; 2];
        self.read_exact(&mut len)?;
        let len = u16::from_be_bytes(len) as usize;

        if len > self.max_field_len {
            return Err(ProtocolError::FieldTooLong {
                len,
                max: self.max_field_len,
            });
        }

        let mut field = vec![0u8; len];
        self.read_exact(&mut field)?;
        Ok(field)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ProtocolError::Truncated
            } else {
                ProtocolError::Io(e)
            }
        })
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<XauthRecord, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
