//! Offset-addressed byte storage that grows to the next power of two.
//!
//! Every write names its byte offset, so callers can back-patch headers they wrote earlier.
//! Fixed-width numbers are stored big-endian. Reads are bounds-checked and fail with
//! [`CodecError::InsufficientData`] instead of returning bytes past the end.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::{CodecError, Result};

/// Fixed-width numeric layouts understood by [`GrowableBuffer::write_number`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl NumberType {
    /// Encoded width in bytes.
    pub const fn size(self) -> usize {
        match self {
            NumberType::U8 | NumberType::I8 => 1,
            NumberType::U16 | NumberType::I16 => 2,
            NumberType::U32 | NumberType::I32 | NumberType::F32 => 4,
            NumberType::F64 => 8,
        }
    }

    /// Largest non-negative integer that survives a write/read round trip.
    pub const fn max_integer(self) -> u64 {
        match self {
            NumberType::U8 => u8::MAX as u64,
            NumberType::U16 => u16::MAX as u64,
            NumberType::U32 => u32::MAX as u64,
            NumberType::I8 => i8::MAX as u64,
            NumberType::I16 => i16::MAX as u64,
            NumberType::I32 => i32::MAX as u64,
            // Contiguous integer range of the mantissa.
            NumberType::F32 => 1 << f32::MANTISSA_DIGITS,
            NumberType::F64 => 1 << f64::MANTISSA_DIGITS,
        }
    }
}

/// Resizable byte array with explicit-offset reads and writes.
///
/// The whole capacity is addressable and zero-initialized, so `capacity()` doubles as the
/// readable length.
#[derive(Debug, Clone, Default)]
pub struct GrowableBuffer {
    data: BytesMut,
}

impl GrowableBuffer {
    /// Allocates `capacity` zeroed bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut data = BytesMut::with_capacity(capacity);
        data.resize(capacity, 0);
        Self { data }
    }

    /// Wraps a copy of `bytes` for reading. Its capacity equals `bytes.len()`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Makes at least `needed` bytes addressable.
    ///
    /// No-op when the buffer is already large enough. Otherwise the buffer is resized to the
    /// next power of two `>= needed`; existing bytes stay at the low end and the new tail is
    /// zero-filled.
    pub fn expand(&mut self, needed: usize) {
        let size = self.data.len();
        if size >= needed {
            return;
        }
        let new_size = needed.next_power_of_two();
        trace!(from = size, to = new_size, "expanding buffer");
        self.data.resize(new_size, 0);
    }

    /// Consumes the buffer and returns its first `len` bytes.
    pub fn freeze(mut self, len: usize) -> Bytes {
        self.data.truncate(len);
        self.data.freeze()
    }

    /// Copies `bytes` to `offset`, growing as needed. Returns the number of bytes written.
    pub fn write_slice(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let end = offset + bytes.len();
        self.expand(end);
        self.data[offset..end].copy_from_slice(bytes);
        bytes.len()
    }

    /// ORs `bits` into the byte at `offset`, growing as needed.
    pub fn merge_u8(&mut self, offset: usize, bits: u8) {
        self.expand(offset + 1);
        self.data[offset] |= bits;
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn read_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or(CodecError::InsufficientData)?;
        self.data
            .get(offset..end)
            .ok_or(CodecError::InsufficientData)
    }

    fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.read_slice(offset, N)?);
        Ok(bytes)
    }

    /// Writes `value` at `offset` using the layout of `ty`. Returns the width written.
    ///
    /// Integer layouts take the integral part of `value` and keep only the low bits that
    /// fit the declared width, so out-of-range values wrap silently.
    pub fn write_number(&mut self, offset: usize, ty: NumberType, value: f64) -> usize {
        match ty {
            NumberType::U8 => self.write_u8(offset, value as i64 as u8),
            NumberType::U16 => self.write_u16(offset, value as i64 as u16),
            NumberType::U32 => self.write_u32(offset, value as i64 as u32),
            NumberType::I8 => self.write_i8(offset, value as i64 as i8),
            NumberType::I16 => self.write_i16(offset, value as i64 as i16),
            NumberType::I32 => self.write_i32(offset, value as i64 as i32),
            NumberType::F32 => self.write_f32(offset, value as f32),
            NumberType::F64 => self.write_f64(offset, value),
        }
    }

    /// Reads a number of layout `ty` at `offset`. Every layout converts to `f64` exactly.
    pub fn read_number(&self, offset: usize, ty: NumberType) -> Result<f64> {
        Ok(match ty {
            NumberType::U8 => self.read_u8(offset)? as f64,
            NumberType::U16 => self.read_u16(offset)? as f64,
            NumberType::U32 => self.read_u32(offset)? as f64,
            NumberType::I8 => self.read_i8(offset)? as f64,
            NumberType::I16 => self.read_i16(offset)? as f64,
            NumberType::I32 => self.read_i32(offset)? as f64,
            NumberType::F32 => self.read_f32(offset)? as f64,
            NumberType::F64 => self.read_f64(offset)?,
        })
    }

    /// Writes a boolean as one byte, `1` or `0`.
    pub fn write_bool(&mut self, offset: usize, value: bool) -> usize {
        self.write_u8(offset, value as u8)
    }

    /// Reads one byte as a boolean; any non-zero byte is `true`.
    pub fn read_bool(&self, offset: usize) -> Result<bool> {
        Ok(self.read_u8(offset)? > 0)
    }
}

macro_rules! impl_fixed_width {
    ($($ty:ty => $write:ident, $read:ident);+ $(;)?) => {
        impl GrowableBuffer {
            $(
                pub fn $write(&mut self, offset: usize, value: $ty) -> usize {
                    self.write_slice(offset, &value.to_be_bytes())
                }

                pub fn $read(&self, offset: usize) -> Result<$ty> {
                    Ok(<$ty>::from_be_bytes(self.read_array(offset)?))
                }
            )+
        }
    };
}

impl_fixed_width!(
    u8 => write_u8, read_u8;
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    i8 => write_i8, read_i8;
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_rounds_to_power_of_two() {
        let mut buf = GrowableBuffer::with_capacity(4);
        buf.expand(3);
        assert_eq!(buf.capacity(), 4);
        buf.expand(5);
        assert_eq!(buf.capacity(), 8);
        buf.expand(100);
        assert_eq!(buf.capacity(), 128);
    }

    #[test]
    fn test_expand_preserves_contents() {
        let mut buf = GrowableBuffer::with_capacity(2);
        buf.write_u16(0, 0xBEEF);
        buf.write_u32(2, 0xDEAD_BEEF);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.read_u16(0).unwrap(), 0xBEEF);
        assert_eq!(buf.read_u32(2).unwrap(), 0xDEAD_BEEF);
        assert_eq!(&buf.as_slice()[6..], &[0, 0]);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buf = GrowableBuffer::with_capacity(0);
        buf.write_u16(0, 0x0102);
        buf.write_i32(2, -2);
        assert_eq!(&buf.as_slice()[..6], &[0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn test_number_truncates_to_width() {
        let mut buf = GrowableBuffer::with_capacity(8);
        buf.write_number(0, NumberType::U8, 300.0);
        assert_eq!(buf.read_number(0, NumberType::U8).unwrap(), 44.0);
        buf.write_number(0, NumberType::U8, -1.0);
        assert_eq!(buf.read_number(0, NumberType::U8).unwrap(), 255.0);
        buf.write_number(0, NumberType::I16, 40000.0);
        assert_eq!(buf.read_number(0, NumberType::I16).unwrap(), -25536.0);
    }

    #[test]
    fn test_read_past_end() {
        let buf = GrowableBuffer::from_slice(&[1, 2, 3]);
        assert_eq!(buf.read_u16(1).unwrap(), 0x0203);
        assert!(matches!(buf.read_u32(0), Err(CodecError::InsufficientData)));
        assert!(matches!(buf.read_u8(3), Err(CodecError::InsufficientData)));
        assert!(matches!(
            buf.read_slice(usize::MAX, 2),
            Err(CodecError::InsufficientData)
        ));
    }
}
