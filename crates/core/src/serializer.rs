//! Binary state serializer.
//!
//! Every stateful component writes itself as a name tag followed by its own
//! fixed fields, and reads itself back in the same order:
//!
//! ```text
//! +---------------------+
//! | tag length (u32 LE) |
//! | tag bytes (UTF-8)   |  e.g. "CartridgeF9"
//! +---------------------+
//! | component fields    |  e.g. u16 LE current bank
//! +---------------------+
//! ```
//!
//! | Type   | Encoding                         |
//! |--------|----------------------------------|
//! | byte   | 1 byte                           |
//! | short  | 2 bytes little-endian            |
//! | int    | 4 bytes little-endian            |
//! | long   | 8 bytes little-endian            |
//! | bool   | `0xFE` = true, `0x01` = false    |
//! | string | int length + UTF-8 bytes         |
//! | array  | raw bytes, length known by reader|
//!
//! Writes always append. Reads advance a separate cursor which [`Serializer::reset`]
//! moves back to the start, so one buffer can be replayed any number of times.

use thiserror::Error;

const TRUE_PATTERN: u8 = 0xFE;
const FALSE_PATTERN: u8 = 0x01;

/// Failures while reading or writing state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializerError {
    #[error("unexpected end of state data at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("state tag mismatch: expected \"{expected}\", found \"{found}\"")]
    TagMismatch { expected: String, found: String },

    #[error("invalid boolean pattern 0x{0:02X}")]
    InvalidBool(u8),

    #[error("invalid UTF-8 in state string")]
    InvalidString,

    #[error("component {0} failed to save or load its state")]
    Component(&'static str),
}

pub type Result<T> = std::result::Result<T, SerializerError>;

/// Sequential writer/reader over an owned byte buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Serializer {
    buf: Vec<u8>,
    pos: usize,
}

impl Serializer {
    pub fn new() -> Self {
        Serializer { buf: Vec::new(), pos: 0 }
    }

    /// Wrap existing state data for reading.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Serializer { buf, pos: 0 }
    }

    /// Rewind the read cursor to the start of the buffer.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Drop all contents but keep the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes left for the reader.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    // ─── Writers ────────────────────────────────────────────────────────────

    pub fn put_byte(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_short(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_int(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_long(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(if v { TRUE_PATTERN } else { FALSE_PATTERN });
    }

    pub fn put_string(&mut self, s: &str) {
        self.put_int(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn put_byte_array(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    // ─── Readers ────────────────────────────────────────────────────────────

    fn take(&mut self, wanted: usize) -> Result<&[u8]> {
        if self.remaining() < wanted {
            return Err(SerializerError::UnexpectedEof { offset: self.pos, wanted });
        }
        let start = self.pos;
        self.pos += wanted;
        Ok(&self.buf[start..self.pos])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_short(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn get_int(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn get_long(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        match self.get_byte()? {
            TRUE_PATTERN => Ok(true),
            FALSE_PATTERN => Ok(false),
            other => Err(SerializerError::InvalidBool(other)),
        }
    }

    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_int()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerializerError::InvalidString)
    }

    /// Fill `out` with the next `out.len()` bytes.
    pub fn get_byte_array(&mut self, out: &mut [u8]) -> Result<()> {
        let src = self.take(out.len())?;
        out.copy_from_slice(src);
        Ok(())
    }

    /// Read a component tag and check it against `expected`.
    pub fn expect_tag(&mut self, expected: &str) -> Result<()> {
        let found = self.get_string()?;
        if found != expected {
            return Err(SerializerError::TagMismatch {
                expected: expected.to_string(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_layout_is_bit_exact() {
        let mut s = Serializer::new();
        s.put_string("CartridgeF9");
        s.put_short(3);
        let mut expected = vec![11, 0, 0, 0];
        expected.extend_from_slice(b"CartridgeF9");
        expected.extend_from_slice(&[3, 0]);
        assert_eq!(s.as_bytes(), &expected[..]);
    }

    #[test]
    fn test_reset_replays_from_start() {
        let mut s = Serializer::new();
        s.put_long(0x0123_4567_89AB_CDEF);
        s.put_bool(true);
        assert_eq!(s.get_long().unwrap(), 0x0123_4567_89AB_CDEF);
        assert!(s.get_bool().unwrap());
        s.reset();
        assert_eq!(s.get_long().unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_eof_is_an_error() {
        let mut s = Serializer::from_bytes(vec![1]);
        assert_eq!(
            s.get_short(),
            Err(SerializerError::UnexpectedEof { offset: 0, wanted: 2 })
        );
    }

    #[test]
    fn test_bad_bool_pattern() {
        let mut s = Serializer::from_bytes(vec![0x00]);
        assert_eq!(s.get_bool(), Err(SerializerError::InvalidBool(0x00)));
    }

    #[test]
    fn test_expect_tag_mismatch() {
        let mut s = Serializer::new();
        s.put_string("CartridgeF8");
        let err = s.expect_tag("CartridgeF9").unwrap_err();
        assert!(matches!(err, SerializerError::TagMismatch { .. }));
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut s = Serializer::new();
        s.put_byte_array(&[0u8; 1024]);
        let cap = s.buf.capacity();
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.buf.capacity(), cap);
    }
}
