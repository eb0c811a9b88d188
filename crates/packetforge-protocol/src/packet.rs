//! The in-memory packet: a byte buffer with independent read and write
//! cursors.
//!
//! ```text
//!  0            read_index          write_index          capacity
//!  |  consumed  |     readable      |   writable space   |
//! ```
//!
//! Writes append at `write_index`; reads consume at `read_index`. All
//! multi-byte integers use network byte order (big-endian).
//!
//! Strings are encoded as `count:u32` (byte length + 1), the UTF-8 bytes,
//! then one `0x00` pad byte. The pad is skipped on read and never consulted:
//! `count` is the only source of truth for the length.

use crate::{BufferPool, ProtocolError};

/// A growable byte buffer with read/write cursors and a saved read mark.
///
/// Packets acquired from a [`BufferPool`] hand their buffer back when they
/// are released or dropped. Because [`release`](Self::release) takes the
/// packet by value, a released packet can never be touched again.
pub struct Packet {
    /// Written bytes. `buf.len()` is the write cursor.
    buf: Vec<u8>,
    read_index: usize,
    mark: usize,
    pool: Option<BufferPool>,
}

impl Packet {
    /// Creates an unpooled, empty packet.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an unpooled, empty packet with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            read_index: 0,
            mark: 0,
            pool: None,
        }
    }

    pub(crate) fn pooled(buf: Vec<u8>, pool: BufferPool) -> Self {
        Self {
            buf,
            read_index: 0,
            mark: 0,
            pool: Some(pool),
        }
    }

    /// Releases the packet, returning its buffer to the pool it came from.
    ///
    /// Equivalent to dropping it; spelled out where the hand-back point
    /// matters.
    pub fn release(self) {
        drop(self);
    }

    // -- Cursors ---------------------------------------------------------

    /// Current read cursor.
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Current write cursor (number of bytes written).
    pub fn write_index(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes written, consumed or not.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes between the read and write cursors.
    pub fn readable_bytes(&self) -> usize {
        self.buf.len() - self.read_index
    }

    /// Returns `true` if there is anything left to read.
    pub fn readable(&self) -> bool {
        self.read_index < self.buf.len()
    }

    /// The unread bytes.
    pub fn readable_slice(&self) -> &[u8] {
        &self.buf[self.read_index..]
    }

    /// Every written byte, including already consumed ones.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Saves the read cursor so a speculative read can be undone.
    pub fn mark_read_index(&mut self) {
        self.mark = self.read_index;
    }

    /// Rewinds the read cursor to the last mark.
    pub fn reset_read_index_to_mark(&mut self) {
        self.read_index = self.mark;
    }

    /// Rewinds both cursors to zero, keeping the allocation for reuse.
    pub fn reset_indices(&mut self) {
        self.buf.clear();
        self.read_index = 0;
        self.mark = 0;
    }

    /// Returns the byte at `index` without moving the cursors.
    pub fn get_byte(&self, index: usize) -> Result<u8, ProtocolError> {
        self.buf.get(index).copied().ok_or(ProtocolError::Underflow {
            needed: index + 1,
            available: self.buf.len(),
        })
    }

    /// Overwrites an already written byte, e.g. to patch a header.
    pub fn set_byte(&mut self, index: usize, value: u8) -> Result<(), ProtocolError> {
        let available = self.buf.len();
        let slot = self.buf.get_mut(index).ok_or(ProtocolError::Underflow {
            needed: index + 1,
            available,
        })?;
        *slot = value;
        Ok(())
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    // -- Writes ----------------------------------------------------------

    /// Appends raw bytes.
    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Appends a bool as `0` or `1`.
    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Appends a big-endian `i16`.
    pub fn write_i16(&mut self, v: i16) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `u16`.
    pub fn write_u16(&mut self, v: u16) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `i32`.
    pub fn write_i32(&mut self, v: i32) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `u32`.
    pub fn write_u32(&mut self, v: u32) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `i64`.
    pub fn write_i64(&mut self, v: i64) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `u64`.
    pub fn write_u64(&mut self, v: u64) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Appends a length-prefixed, zero-padded string.
    ///
    /// # Panics
    /// If the string is longer than `u32::MAX - 1` bytes.
    pub fn write_str(&mut self, s: &str) {
        self.write_prefixed_bytes(s.as_bytes());
    }

    /// Appends arbitrary bytes with the same layout as [`write_str`](Self::write_str).
    ///
    /// # Panics
    /// If `bytes` is longer than `u32::MAX - 1`.
    pub fn write_prefixed_bytes(&mut self, bytes: &[u8]) {
        let count = u32::try_from(bytes.len() + 1)
            .unwrap_or_else(|_| panic!("field of {} bytes cannot be encoded", bytes.len()));
        self.write_u32(count);
        self.write_slice(bytes);
        self.write_u8(0);
    }

    // -- Reads -----------------------------------------------------------

    fn take(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        let available = self.readable_bytes();
        if n > available {
            return Err(ProtocolError::Underflow {
                needed: n,
                available,
            });
        }
        let start = self.read_index;
        self.read_index += n;
        Ok(&self.buf[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Consumes `n` raw bytes.
    pub fn read_slice(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        self.take(n)
    }

    /// Consumes one byte.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Consumes a bool; any non-zero byte reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    /// Consumes a big-endian `i16`.
    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.take_array().map(i16::from_be_bytes)
    }

    /// Consumes a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.take_array().map(u16::from_be_bytes)
    }

    /// Consumes a big-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.take_array().map(i32::from_be_bytes)
    }

    /// Consumes a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.take_array().map(u32::from_be_bytes)
    }

    /// Consumes a big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.take_array().map(i64::from_be_bytes)
    }

    /// Consumes a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        self.take_array().map(u64::from_be_bytes)
    }

    /// Consumes a length-prefixed byte field written by
    /// [`write_prefixed_bytes`](Self::write_prefixed_bytes).
    ///
    /// On error the read cursor is left where it was.
    pub fn read_prefixed_bytes(&mut self) -> Result<&[u8], ProtocolError> {
        let start = self.read_index;
        let count = self.read_u32()? as usize;
        if count == 0 {
            self.read_index = start;
            return Err(ProtocolError::InvalidString(
                "count must include the pad byte".into(),
            ));
        }
        if count > self.readable_bytes() {
            let available = self.readable_bytes();
            self.read_index = start;
            return Err(ProtocolError::Underflow {
                needed: count,
                available,
            });
        }
        let body = self.read_index;
        // The pad byte is consumed but never inspected.
        self.read_index += count;
        Ok(&self.buf[body..body + count - 1])
    }

    /// Consumes a string written by [`write_str`](Self::write_str).
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let start = self.read_index;
        let text = std::str::from_utf8(self.read_prefixed_bytes()?)
            .map(str::to_owned)
            .map_err(|e| ProtocolError::InvalidString(e.to_string()));
        if text.is_err() {
            self.read_index = start;
        }
        text
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.recycle(std::mem::take(&mut self.buf));
        }
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("read_index", &self.read_index)
            .field("write_index", &self.buf.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Packet encode/decode tests.
    //!
    //! Naming: `test_{operation}_{scenario}_{expected}`.

    use super::*;

    #[test]
    fn test_integers_roundtrip_at_their_limits() {
        let mut p = Packet::new();
        p.write_i16(i16::MIN);
        p.write_i16(-2);
        p.write_u16(u16::MAX);
        p.write_i32(i32::MIN);
        p.write_u32(u32::MAX);
        p.write_i64(i64::MIN);
        p.write_i64(0x0102_0304_0506_0708);
        p.write_u64(u64::MAX);

        assert_eq!(p.read_i16().unwrap(), i16::MIN);
        assert_eq!(p.read_i16().unwrap(), -2);
        assert_eq!(p.read_u16().unwrap(), u16::MAX);
        assert_eq!(p.read_i32().unwrap(), i32::MIN);
        assert_eq!(p.read_u32().unwrap(), u32::MAX);
        assert_eq!(p.read_i64().unwrap(), i64::MIN);
        assert_eq!(p.read_i64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(p.read_u64().unwrap(), u64::MAX);
        assert!(!p.readable());
    }

    #[test]
    fn test_integers_are_big_endian_on_the_wire() {
        let mut p = Packet::new();
        p.write_i16(0x0102);
        p.write_u32(0x0304_0506);
        p.write_i64(0x0708_090a_0b0c_0d0e);
        assert_eq!(
            p.as_bytes(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
        );
    }

    #[test]
    fn test_bool_encodes_as_single_byte() {
        let mut p = Packet::new();
        p.write_bool(true);
        p.write_bool(false);
        p.write_u8(7);
        assert_eq!(p.as_bytes(), &[1, 0, 7]);

        assert!(p.read_bool().unwrap());
        assert!(!p.read_bool().unwrap());
        // Any non-zero byte is true.
        assert!(p.read_bool().unwrap());
    }

    #[test]
    fn test_string_layout_is_count_bytes_pad() {
        let mut p = Packet::new();
        p.write_str("hi");
        assert_eq!(p.as_bytes(), &[0, 0, 0, 3, b'h', b'i', 0]);
    }

    #[test]
    fn test_empty_string_is_legal() {
        let mut p = Packet::new();
        p.write_str("");
        assert_eq!(p.as_bytes(), &[0, 0, 0, 1, 0]);
        assert_eq!(p.read_string().unwrap(), "");
        assert!(!p.readable());
    }

    #[test]
    fn test_strings_roundtrip_various_lengths() {
        let long = "x".repeat(1000);
        let samples = ["a", "hello world", "héllo wörld ✓", long.as_str()];
        let mut p = Packet::new();
        for s in samples {
            p.write_str(s);
        }
        for s in samples {
            assert_eq!(p.read_string().unwrap(), s);
        }
    }

    #[test]
    fn test_string_pad_is_not_interpreted() {
        // A non-zero pad byte does not change the decoded string.
        let mut p = Packet::new();
        p.write_slice(&[0, 0, 0, 3, b'o', b'k', 0xff]);
        p.write_u8(9);
        assert_eq!(p.read_string().unwrap(), "ok");
        assert_eq!(p.read_u8().unwrap(), 9);
    }

    #[test]
    fn test_read_string_zero_count_is_rejected() {
        let mut p = Packet::new();
        p.write_u32(0);
        assert!(matches!(
            p.read_string(),
            Err(ProtocolError::InvalidString(_))
        ));
        assert_eq!(p.read_index(), 0, "cursor should not move on error");
    }

    #[test]
    fn test_read_string_truncated_reports_underflow() {
        let mut p = Packet::new();
        p.write_u32(10);
        p.write_slice(b"abc");
        assert!(matches!(
            p.read_string(),
            Err(ProtocolError::Underflow {
                needed: 10,
                available: 3
            })
        ));
        assert_eq!(p.read_index(), 0);
    }

    #[test]
    fn test_read_string_invalid_utf8_is_rejected() {
        let mut p = Packet::new();
        p.write_prefixed_bytes(&[0xff, 0xfe]);
        assert!(matches!(
            p.read_string(),
            Err(ProtocolError::InvalidString(_))
        ));
        assert_eq!(p.read_prefixed_bytes().unwrap(), &[0xff, 0xfe]);
    }

    #[test]
    fn test_read_past_write_index_underflows() {
        let mut p = Packet::new();
        p.write_u8(1);
        p.write_u8(2);

        let err = p.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Underflow {
                needed: 4,
                available: 2
            }
        ));
        // The failed read consumed nothing.
        assert_eq!(p.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_readable_bytes_tracks_both_cursors() {
        let mut p = Packet::new();
        p.write_u32(1);
        p.write_u8(42);
        assert_eq!(p.readable_bytes(), 5);
        p.read_u32().unwrap();
        assert_eq!(p.readable_bytes(), 1);
        assert_eq!(p.readable_slice(), &[42]);
        assert_eq!(p.write_index(), 5);
        assert_eq!(p.read_index(), 4);
    }

    #[test]
    fn test_mark_and_reset_rereads_value() {
        let mut p = Packet::new();
        p.write_u32(0xdead_beef);
        p.write_u16(5);

        p.read_u32().unwrap();
        p.mark_read_index();
        assert_eq!(p.read_u16().unwrap(), 5);
        p.reset_read_index_to_mark();
        assert_eq!(p.read_u16().unwrap(), 5);
    }

    #[test]
    fn test_reset_indices_keeps_capacity() {
        let mut p = Packet::with_capacity(64);
        p.write_slice(&[1; 32]);
        p.read_u8().unwrap();
        let cap = p.buffer_mut().capacity();

        p.reset_indices();
        assert_eq!(p.read_index(), 0);
        assert_eq!(p.write_index(), 0);
        assert!(p.is_empty());
        assert_eq!(p.buffer_mut().capacity(), cap);
    }

    #[test]
    fn test_get_and_set_byte_within_written_region() {
        let mut p = Packet::new();
        p.write_u32(0);
        p.set_byte(3, 9).unwrap();
        assert_eq!(p.get_byte(3).unwrap(), 9);
        assert_eq!(p.read_u32().unwrap(), 9);

        assert!(p.get_byte(4).is_err());
        assert!(p.set_byte(4, 1).is_err());
    }
}
