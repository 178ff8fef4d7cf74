//! Binary message record.
//!
//! Byte layout (all integers little-endian):
//! `version:u8 = 1`, `epoch_millis:i64`, `partition:i32`, `offset:i64`,
//! key and value each as `(len:i32, bytes)` with `-1` meaning null, then
//! `header_count:i32` followed by `(name_len:u32, name_utf8, value_len:i32,
//! value_bytes)` per header. Any version byte other than 1 is a hard decode
//! error.

use std::collections::HashMap;

use crate::errors::{Result, SourceError};
use crate::message::Message;

pub const VERSION: u8 = 1;

/// Minimum prefix needed to read the embedded timestamp: version + epoch.
pub const TIMESTAMP_PREFIX_LEN: usize = 9;

pub fn encode(message: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + message.size());
    out.push(VERSION);
    out.extend_from_slice(&message.epoch_millis.to_le_bytes());
    out.extend_from_slice(&message.partition.to_le_bytes());
    out.extend_from_slice(&message.offset.to_le_bytes());

    write_opt_bytes(&mut out, message.key.as_deref());
    write_opt_bytes(&mut out, message.value.as_deref());

    out.extend_from_slice(&(message.headers.len() as i32).to_le_bytes());
    for (name, value) in &message.headers {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        write_opt_bytes(&mut out, Some(value));
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<Message> {
    let mut reader = Reader::new(bytes);

    let version = reader.u8()?;
    if version != VERSION {
        return Err(SourceError::UnsupportedVersion(version));
    }

    let epoch_millis = reader.i64()?;
    let partition = reader.i32()?;
    let offset = reader.i64()?;

    let key = reader.opt_bytes()?;
    let value = reader.opt_bytes()?;

    let header_count = reader.i32()?;
    if header_count < 0 {
        return Err(SourceError::Decode(format!(
            "negative header count: {header_count}"
        )));
    }
    let mut headers = HashMap::with_capacity(header_count as usize);
    for _ in 0..header_count {
        let name_len = reader.u32()? as usize;
        let name = String::from_utf8(reader.bytes(name_len)?.to_vec())
            .map_err(|e| SourceError::Decode(format!("invalid header name: {e}")))?;
        let value = reader.opt_bytes()?.unwrap_or_default();
        headers.insert(name, value);
    }

    Ok(Message::new(
        epoch_millis,
        headers,
        key,
        value,
        partition,
        offset,
    ))
}

/// Read the embedded timestamp from a record prefix without decoding the
/// whole message. Used by the archive index, which only needs the first
/// [`TIMESTAMP_PREFIX_LEN`] bytes of each file.
pub fn peek_timestamp(prefix: &[u8]) -> Result<i64> {
    let mut reader = Reader::new(prefix);
    let version = reader.u8()?;
    if version != VERSION {
        return Err(SourceError::UnsupportedVersion(version));
    }
    reader.i64()
}

fn write_opt_bytes(out: &mut Vec<u8>, data: Option<&[u8]>) {
    match data {
        None => out.extend_from_slice(&(-1i32).to_le_bytes()),
        Some(bytes) => {
            out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| SourceError::Decode("truncated record".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.bytes(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn opt_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(SourceError::Decode(format!("invalid length: {len}")));
        }
        Ok(Some(self.bytes(len as usize)?.to_vec()))
    }
}
