//! Self-describing size fields.
//!
//! A size is written into the smallest of three big-endian fields. The top 3 bits of the
//! field hold its width in bytes, the remaining bits hold the magnitude:
//!
//! ```txt
//! 001mmmmm                                     [0, 32)
//! 010mmmmm_mmmmmmmm                            [0, 8192)
//! 100mmmmm_mmmmmmmm_mmmmmmmm_mmmmmmmm          [0, 2^29)
//! ```

use crate::buffer::GrowableBuffer;
use crate::{CodecError, Result};

/// Number of high bits that carry the width discriminant.
pub const SIZE_DISCRIMINANT_BITS: u32 = 3;

/// Largest size that can be written, `2^29 - 1`.
pub const SIZE_MAX: u32 = (1 << (32 - SIZE_DISCRIMINANT_BITS)) - 1;

/// Field width chosen for a size.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SizeWidth {
    /// 1 byte, 5 magnitude bits
    U8,

    /// 2 bytes, 13 magnitude bits
    U16,

    /// 4 bytes, 29 magnitude bits
    U32,
}

impl SizeWidth {
    /// Picks the narrowest width whose magnitude range covers `size`.
    pub fn for_size(size: usize) -> Result<Self> {
        [SizeWidth::U8, SizeWidth::U16, SizeWidth::U32]
            .into_iter()
            .find(|width| size < width.limit())
            .ok_or(CodecError::SizeOverflow(size))
    }

    /// Parses the discriminant found in the top bits of a field's first byte.
    pub fn from_discriminant(discriminant: u8) -> Result<Self> {
        match discriminant {
            1 => Ok(SizeWidth::U8),
            2 => Ok(SizeWidth::U16),
            4 => Ok(SizeWidth::U32),
            other => Err(CodecError::InvalidSizeTag(other)),
        }
    }

    /// Field length in bytes, which is also the discriminant written on the wire.
    pub fn byte_len(self) -> usize {
        match self {
            SizeWidth::U8 => 1,
            SizeWidth::U16 => 2,
            SizeWidth::U32 => 4,
        }
    }

    fn magnitude_bits(self) -> u32 {
        self.byte_len() as u32 * 8 - SIZE_DISCRIMINANT_BITS
    }

    /// Exclusive upper bound of the magnitudes this width can hold.
    pub fn limit(self) -> usize {
        1 << self.magnitude_bits()
    }
}

/// Returns how many bytes [`GrowableBuffer::write_size`] uses for `size`.
pub fn encoded_len(size: usize) -> Result<usize> {
    Ok(SizeWidth::for_size(size)?.byte_len())
}

impl GrowableBuffer {
    /// Writes `size` as a size field at `offset`. Returns the field length.
    pub fn write_size(&mut self, offset: usize, size: usize) -> Result<usize> {
        let width = SizeWidth::for_size(size)?;
        let tag = (width.byte_len() as u32) << width.magnitude_bits();
        let field = tag | size as u32;
        Ok(match width {
            SizeWidth::U8 => self.write_u8(offset, field as u8),
            SizeWidth::U16 => self.write_u16(offset, field as u16),
            SizeWidth::U32 => self.write_u32(offset, field),
        })
    }

    /// Reads a size field at `offset`. Returns `(size, field length)`.
    pub fn read_size(&self, offset: usize) -> Result<(usize, usize)> {
        let first = self.read_u8(offset)?;
        let width = SizeWidth::from_discriminant(first >> (8 - SIZE_DISCRIMINANT_BITS))?;
        let field = match width {
            SizeWidth::U8 => first as u32,
            SizeWidth::U16 => self.read_u16(offset)? as u32,
            SizeWidth::U32 => self.read_u32(offset)?,
        };
        let mask = (1u32 << width.magnitude_bits()) - 1;
        Ok(((field & mask) as usize, width.byte_len()))
    }

    /// Writes a size-prefixed UTF-8 string at `offset`. Returns the total length written.
    pub fn write_str(&mut self, offset: usize, value: &str) -> Result<usize> {
        let bytes = value.as_bytes();
        let tag_len = self.write_size(offset, bytes.len())?;
        Ok(tag_len + self.write_slice(offset + tag_len, bytes))
    }

    /// Reads a size-prefixed UTF-8 string at `offset`. Returns `(string, total length)`.
    pub fn read_str(&self, offset: usize) -> Result<(String, usize)> {
        let (len, tag_len) = self.read_size(offset)?;
        let bytes = self.read_slice(offset + tag_len, len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .to_string();
        Ok((s, tag_len + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(size: usize) -> (usize, usize) {
        let mut buf = GrowableBuffer::with_capacity(1);
        let written = buf.write_size(0, size).unwrap();
        let (read, consumed) = buf.read_size(0).unwrap();
        assert_eq!(read, size);
        assert_eq!(consumed, written);
        (read, consumed)
    }

    #[test]
    fn test_width_boundaries() {
        assert_eq!(round_trip(0), (0, 1));
        assert_eq!(round_trip(31), (31, 1));
        assert_eq!(round_trip(32), (32, 2));
        assert_eq!(round_trip(8191), (8191, 2));
        assert_eq!(round_trip(8192), (8192, 4));
        assert_eq!(round_trip(SIZE_MAX as usize), (SIZE_MAX as usize, 4));
    }

    #[test]
    fn test_wire_layout() {
        let mut buf = GrowableBuffer::with_capacity(8);
        buf.write_size(0, 5).unwrap();
        assert_eq!(buf.read_u8(0).unwrap(), 0b001_00101);
        buf.write_size(0, 32).unwrap();
        assert_eq!(&buf.as_slice()[..2], &[0b010_00000, 0x20]);
        buf.write_size(0, 8192).unwrap();
        assert_eq!(&buf.as_slice()[..4], &[0b100_00000, 0x00, 0x20, 0x00]);
    }

    #[test]
    fn test_size_overflow() {
        let mut buf = GrowableBuffer::with_capacity(4);
        assert!(matches!(
            buf.write_size(0, 1 << 29),
            Err(CodecError::SizeOverflow(s)) if s == 1 << 29
        ));
    }

    #[test]
    fn test_invalid_discriminant() {
        let buf = GrowableBuffer::from_slice(&[0b011_00000, 0, 0, 0]);
        assert!(matches!(buf.read_size(0), Err(CodecError::InvalidSizeTag(3))));
        let buf = GrowableBuffer::from_slice(&[0]);
        assert!(matches!(buf.read_size(0), Err(CodecError::InvalidSizeTag(0))));
    }

    #[test]
    fn test_truncated_field() {
        let buf = GrowableBuffer::from_slice(&[0b100_00000, 0]);
        assert!(matches!(buf.read_size(0), Err(CodecError::InsufficientData)));
    }

    #[test]
    fn test_string_round_trip() {
        let mut buf = GrowableBuffer::with_capacity(2);
        let written = buf.write_str(3, "héllo").unwrap();
        assert_eq!(written, 1 + "héllo".len());
        assert_eq!(buf.read_str(3).unwrap(), ("héllo".to_string(), written));
    }
}
