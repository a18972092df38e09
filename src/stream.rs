//! Sequential byte writer and reader without a schema.
//!
//! The caller decides the layout: each call appends (or consumes) one fixed-width number,
//! one boolean byte, or one string prefixed by its byte length in a caller-chosen
//! [`NumberType`]. Reading must replay the same calls in the same order.
//!
//! ```rust
//! use binmsg::{BufferReader, BufferWriter, NumberType};
//!
//! let mut writer = BufferWriter::new(4);
//! writer.write_number(NumberType::U16, 3647u16);
//! writer.write_boolean(true);
//! writer.write_string(NumberType::U8, "abcd").unwrap();
//! let bytes = writer.into_bytes();
//! assert_eq!(bytes.len(), 2 + 1 + 1 + 4);
//!
//! let mut reader = BufferReader::new(&bytes);
//! assert_eq!(reader.read_number(NumberType::U16).unwrap(), 3647.0);
//! assert!(reader.read_boolean().unwrap());
//! assert_eq!(reader.read_string(NumberType::U8).unwrap(), "abcd");
//! ```

use bytes::Bytes;

use crate::buffer::{GrowableBuffer, NumberType};
use crate::config::DEFAULT_PACKED_CAPACITY;
use crate::{CodecError, Result};

/// Appends values at an internal cursor.
#[derive(Debug, Clone)]
pub struct BufferWriter {
    buffer: GrowableBuffer,
    offset: usize,
    initial_capacity: usize,
}

impl BufferWriter {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            buffer: GrowableBuffer::with_capacity(initial_capacity),
            offset: 0,
            initial_capacity,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Discards everything written and starts over with a fresh buffer.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_capacity);
    }

    /// Appends `value` in the layout of `ty`. Integer layouts wrap values that do not fit.
    pub fn write_number(&mut self, ty: NumberType, value: impl Into<f64>) {
        self.offset += self.buffer.write_number(self.offset, ty, value.into());
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.offset += self.buffer.write_bool(self.offset, value);
    }

    /// Appends the UTF-8 byte length of `value` as a `len_ty` number, then the bytes.
    ///
    /// # Errors
    /// Returns [`CodecError::SizeOverflow`] if the length cannot be represented by `len_ty`.
    pub fn write_string(&mut self, len_ty: NumberType, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() as u64 > len_ty.max_integer() {
            return Err(CodecError::SizeOverflow(bytes.len()));
        }
        self.write_number(len_ty, bytes.len() as f64);
        self.offset += self.buffer.write_slice(self.offset, bytes);
        Ok(())
    }

    /// Returns the bytes written so far.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze(self.offset)
    }
}

impl Default for BufferWriter {
    fn default() -> Self {
        Self::new(DEFAULT_PACKED_CAPACITY)
    }
}

/// Consumes values from an internal cursor.
#[derive(Debug, Clone)]
pub struct BufferReader {
    buffer: GrowableBuffer,
    offset: usize,
}

impl BufferReader {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            buffer: GrowableBuffer::from_slice(bytes),
            offset: 0,
        }
    }

    /// Rewinds to the first byte.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buffer.capacity().saturating_sub(self.offset)
    }

    pub fn read_number(&mut self, ty: NumberType) -> Result<f64> {
        let value = self.buffer.read_number(self.offset, ty)?;
        self.offset += ty.size();
        Ok(value)
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        let value = self.buffer.read_bool(self.offset)?;
        self.offset += 1;
        Ok(value)
    }

    /// Reads a string written by [`BufferWriter::write_string`] with the same `len_ty`.
    ///
    /// On error the cursor is left where it was.
    pub fn read_string(&mut self, len_ty: NumberType) -> Result<String> {
        let len = self.buffer.read_number(self.offset, len_ty)?;
        if len < 0.0 || len.fract() != 0.0 || len > len_ty.max_integer() as f64 {
            return Err(CodecError::Decode(format!("Invalid string length {}", len)));
        }
        let start = self.offset + len_ty.size();
        let bytes = self.buffer.read_slice(start, len as usize)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .to_string();
        self.offset = start + len as usize;
        Ok(s)
    }
}
