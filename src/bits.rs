//! Bit queues used by the packed codec.
//!
//! Bits are packed MSB first. A push fills the unused high bits of the current byte before
//! moving on to the next one, so a value may straddle byte boundaries:
//!
//! ```rust
//! use binmsg::bits::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new(1);
//! writer.push_bits(0b101, 3);
//! writer.push_bits(0b1_1001, 5);
//! writer.push_bits(0b11, 2);
//! let bytes = writer.into_bytes();
//! assert_eq!(&bytes[..], &[0b101_11001, 0b11_000000]);
//!
//! let mut reader = BitReader::new(bytes);
//! assert_eq!(reader.pop_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.pop_bits(7).unwrap(), 0b11001_11);
//! ```

use bytes::Bytes;

use crate::buffer::GrowableBuffer;
use crate::{CodecError, Result};

/// Append-only bit queue over a [`GrowableBuffer`].
#[derive(Debug, Clone)]
pub struct BitWriter {
    buffer: GrowableBuffer,
    byte: usize,
    /// Bits already used in `buffer[byte]`, `0..8`.
    bit: u32,
}

impl BitWriter {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            buffer: GrowableBuffer::with_capacity(initial_capacity),
            byte: 0,
            bit: 0,
        }
    }

    /// Discards everything written and starts over with a fresh buffer.
    pub fn reset(&mut self, initial_capacity: usize) {
        *self = Self::new(initial_capacity);
    }

    /// Appends the low `count` bits of `value`, most significant first.
    ///
    /// # Panics
    /// In debug builds, if `count > 64`.
    pub fn push_bits(&mut self, value: u64, count: u32) {
        debug_assert!(count <= 64, "cannot push {} bits at once", count);
        let mut remaining = count;
        while remaining > 0 {
            let free = 8 - self.bit;
            let take = free.min(remaining);
            let chunk = ((value >> (remaining - take)) & ((1u64 << take) - 1)) as u8;
            self.buffer.merge_u8(self.byte, chunk << (free - take));

            remaining -= take;
            self.bit += take;
            if self.bit == 8 {
                self.byte += 1;
                self.bit = 0;
            }
        }
    }

    /// Appends whole bytes, eight bits each.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if self.bit == 0 {
            self.byte += self.buffer.write_slice(self.byte, bytes);
            return;
        }
        self.buffer.expand(self.byte + bytes.len() + 1);
        for &b in bytes {
            self.push_bits(b as u64, 8);
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.byte * 8 + self.bit as usize
    }

    /// Number of bytes touched so far, counting a partially filled last byte.
    pub fn byte_len(&self) -> usize {
        self.byte + usize::from(self.bit > 0)
    }

    /// Returns the written bytes. Unused low bits of the last byte are zero.
    pub fn into_bytes(self) -> Bytes {
        let len = self.byte_len();
        self.buffer.freeze(len)
    }
}

/// Bit queue reader over an immutable byte sequence.
#[derive(Debug, Clone)]
pub struct BitReader {
    data: Bytes,
    byte: usize,
    /// Bits already consumed from `data[byte]`, `0..8`.
    bit: u32,
}

impl BitReader {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
        }
    }

    /// Replaces the input and rewinds to its first bit.
    pub fn reset(&mut self, data: Bytes) {
        *self = Self::new(data);
    }

    /// Number of unread bits.
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.byte * 8 + self.bit as usize)
    }

    /// Removes `count` bits and returns them as the low bits of the result.
    ///
    /// # Errors
    /// Returns [`CodecError::InsufficientData`] without consuming anything if fewer than
    /// `count` bits are left.
    pub fn pop_bits(&mut self, count: u32) -> Result<u64> {
        debug_assert!(count <= 64, "cannot pop {} bits at once", count);
        if self.remaining_bits() < count as usize {
            return Err(CodecError::InsufficientData);
        }
        let mut result = 0u64;
        let mut remaining = count;
        while remaining > 0 {
            let avail = 8 - self.bit;
            let take = avail.min(remaining);
            let part = (self.data[self.byte] >> (avail - take)) as u64 & ((1u64 << take) - 1);
            result = (result << take) | part;

            remaining -= take;
            self.bit += take;
            if self.bit == 8 {
                self.byte += 1;
                self.bit = 0;
            }
        }
        Ok(result)
    }

    /// Removes `len` whole bytes.
    pub fn pop_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.remaining_bits() / 8 < len {
            return Err(CodecError::InsufficientData);
        }
        if self.bit == 0 {
            let bytes = self.data[self.byte..self.byte + len].to_vec();
            self.byte += len;
            return Ok(bytes);
        }
        (0..len).map(|_| self.pop_bits(8).map(|b| b as u8)).collect()
    }
}
