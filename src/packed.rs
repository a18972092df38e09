//! The packed codec: a self-describing bitstream.
//!
//! Every value starts with a 3-bit [`TypeTag`] followed by its payload. Nothing is byte
//! aligned; the stream is one continuous run of bits, MSB first.
//!
//! ```txt
//! uint   000 ww m..m          ww = byte width - 1, then the magnitude
//! int    001 ww m..m          magnitude = |n| - 1
//! bool   010 b
//! str    011 ww l..l bytes    byte length as an integer, then 8 bits per byte
//! list   100 ww n..n values   element count, then each element with its own tag
//! bigint 101                  reserved, never written
//! map    110 ww n..n (key value)*   keys are strings without a tag
//! null   111
//! ```
//!
//! The same writer and reader also offer the payload encodings without tags
//! ([`PackWriter::write_uint`] and friends), and a schema-driven mode
//! ([`PackWriter::write_with_schema`]) that writes only payloads in schema order.

use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::bits::{BitReader, BitWriter};
use crate::config::Options;
use crate::core::{check_depth, mismatch, NULL};
use crate::schema::{Field, Node, NodeId, ScalarType, Schema};
use crate::value::Value;
use crate::{CodecError, Result};

/// Width of the type discriminant in bits.
pub const TYPE_TAG_BITS: u32 = 3;

/// Width of the integer byte-width class in bits.
pub const WIDTH_CLASS_BITS: u32 = 2;

/// Type discriminants of the packed format. The ordinals are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Uint = 0,
    Int = 1,
    Bool = 2,
    Str = 3,
    List = 4,
    /// Reserved for arbitrary-precision integers. Never written; reading it is an error.
    BigInt = 5,
    Map = 6,
    Null = 7,
}

impl TryFrom<u8> for TypeTag {
    type Error = CodecError;

    fn try_from(bits: u8) -> Result<Self> {
        Ok(match bits {
            0 => TypeTag::Uint,
            1 => TypeTag::Int,
            2 => TypeTag::Bool,
            3 => TypeTag::Str,
            4 => TypeTag::List,
            5 => TypeTag::BigInt,
            6 => TypeTag::Map,
            7 => TypeTag::Null,
            other => return Err(CodecError::UnsupportedTag(other)),
        })
    }
}

/// Packs one value with the given options.
pub fn pack_with(value: &Value, options: &Options) -> Result<Bytes> {
    let mut writer = PackWriter::with_options(options);
    writer.write(value)?;
    let bytes = writer.into_bytes();
    trace!(len = bytes.len(), "packed value");
    Ok(bytes)
}

/// Unpacks the first value in `bytes` with the given options.
pub fn unpack_with(bytes: &[u8], options: &Options) -> Result<Value> {
    let mut reader = PackReader::with_options(Bytes::copy_from_slice(bytes), options);
    let value = reader.read_next().map_err(|e| {
        debug!(error = %e, len = bytes.len(), "rejected packed input");
        e
    })?;
    trace!(len = bytes.len(), "unpacked value");
    Ok(value)
}

/// Smallest number of bytes (1..=4) that holds `magnitude`.
fn byte_width(magnitude: u32) -> u32 {
    if magnitude < 1 << 8 {
        1
    } else if magnitude < 1 << 16 {
        2
    } else if magnitude < 1 << 24 {
        3
    } else {
        4
    }
}

/// Maps a numeric value onto the integer range the packed format carries.
///
/// Integer variants pass through unchanged. Floats are truncated toward zero and saturated
/// into the `i32` range.
fn packed_integer(value: &Value) -> Option<i64> {
    match *value {
        Value::F32(v) => Some(v as i32 as i64),
        Value::F64(v) => Some(v as i32 as i64),
        _ => value.as_i64(),
    }
}

fn len_to_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| CodecError::SizeOverflow(len))
}

/// Writer for the packed format.
#[derive(Debug, Clone)]
pub struct PackWriter {
    bits: BitWriter,
    initial_capacity: usize,
    max_depth: usize,
}

impl PackWriter {
    pub fn new(initial_capacity: usize) -> Self {
        Self::with_options(&Options::packed().with_initial_capacity(initial_capacity))
    }

    pub fn with_options(options: &Options) -> Self {
        Self {
            bits: BitWriter::new(options.initial_capacity),
            initial_capacity: options.initial_capacity,
            max_depth: options.max_depth,
        }
    }

    /// Discards everything written so far.
    pub fn reset(&mut self) {
        self.bits.reset(self.initial_capacity);
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bits.bit_len()
    }

    /// Returns the bytes written so far. A partially filled last byte is included.
    pub fn into_bytes(self) -> Bytes {
        self.bits.into_bytes()
    }

    /// Writes `value` with its type tag.
    ///
    /// If this fails the writer holds a partial value and should be [`reset`](Self::reset).
    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.write_value(value, 0)
    }

    fn write_tag(&mut self, tag: TypeTag) {
        self.bits.push_bits(tag as u64, TYPE_TAG_BITS);
    }

    fn write_value(&mut self, value: &Value, depth: usize) -> Result<()> {
        check_depth(depth, self.max_depth)?;
        match value {
            Value::Null => self.write_tag(TypeTag::Null),
            Value::Bool(b) => {
                self.write_tag(TypeTag::Bool);
                self.write_bool(*b);
            }
            Value::Str(s) => {
                self.write_tag(TypeTag::Str);
                self.write_str(s)?;
            }
            Value::List(items) => {
                self.write_tag(TypeTag::List);
                self.write_uint(len_to_u32(items.len())?);
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            Value::Map(map) => {
                self.write_tag(TypeTag::Map);
                self.write_uint(len_to_u32(map.len())?);
                for (key, item) in map {
                    self.write_str(key)?;
                    self.write_value(item, depth + 1)?;
                }
            }
            number => {
                let n = packed_integer(number).ok_or_else(|| mismatch("number", number))?;
                if n < 0 {
                    self.write_tag(TypeTag::Int);
                    self.write_uint((-(n + 1)) as u32);
                } else {
                    self.write_tag(TypeTag::Uint);
                    self.write_uint(n as u32);
                }
            }
        }
        Ok(())
    }

    /// Writes an unsigned integer: a 2-bit width class, then 1 to 4 magnitude bytes.
    pub fn write_uint(&mut self, n: u32) {
        let width = byte_width(n);
        self.bits.push_bits((width - 1) as u64, WIDTH_CLASS_BITS);
        self.bits.push_bits(n as u64, width * 8);
    }

    /// Writes a signed integer: a sign bit, then the magnitude as in
    /// [`write_uint`](Self::write_uint). Negative magnitudes are stored as `|n| - 1`.
    pub fn write_int(&mut self, n: i32) {
        let negative = n < 0;
        self.bits.push_bits(negative as u64, 1);
        // !n == -(n + 1) for negatives
        self.write_uint(if negative { !n as u32 } else { n as u32 });
    }

    pub fn write_bool(&mut self, b: bool) {
        self.bits.push_bits(b as u64, 1);
    }

    /// Writes a string: its UTF-8 byte length as an unsigned integer, then the bytes.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_uint(len_to_u32(s.len())?);
        self.bits.push_bytes(s.as_bytes());
        Ok(())
    }

    /// Writes the 32 raw bits of an IEEE 754 single.
    pub fn write_f32(&mut self, v: f32) {
        self.bits.push_bits(v.to_bits() as u64, 32);
    }

    /// Writes the 64 raw bits of an IEEE 754 double.
    pub fn write_f64(&mut self, v: f64) {
        self.bits.push_bits(v.to_bits(), 64);
    }

    /// Writes `value` against a schema node without any type tags.
    ///
    /// Unsigned scalars use [`write_uint`](Self::write_uint), signed ones
    /// [`write_int`](Self::write_int), floats their raw bits, lists an element count and
    /// objects a field count (0 for null) followed by the declared fields.
    pub fn write_with_schema(
        &mut self,
        value: &Value,
        schema: &Schema,
        root: NodeId,
    ) -> Result<()> {
        self.write_node(value, schema, root, 0)
    }

    fn write_node(
        &mut self,
        value: &Value,
        schema: &Schema,
        id: NodeId,
        depth: usize,
    ) -> Result<()> {
        check_depth(depth, self.max_depth)?;
        match schema.get(id)? {
            Node::Scalar(ty) => self.write_scalar(*ty, value),
            Node::List(element) => {
                let items = value.as_list().ok_or_else(|| mismatch("list", value))?;
                self.write_uint(len_to_u32(items.len())?);
                for item in items {
                    self.write_node(item, schema, *element, depth + 1)?;
                }
                Ok(())
            }
            Node::Object(fields) => self.write_object(value, schema, fields, depth),
        }
    }

    fn write_object(
        &mut self,
        value: &Value,
        schema: &Schema,
        fields: &[Field],
        depth: usize,
    ) -> Result<()> {
        let map = match value {
            Value::Null => {
                self.write_uint(0);
                return Ok(());
            }
            Value::Map(map) => map,
            other => return Err(mismatch("object", other)),
        };
        self.write_uint(len_to_u32(fields.len())?);
        for field in fields {
            let item = match map.get(&field.name) {
                Some(v) => v,
                None if matches!(schema.get(field.ty)?, Node::Object(_)) => &NULL,
                None => return Err(CodecError::MissingField(field.name.clone())),
            };
            self.write_node(item, schema, field.ty, depth + 1)?;
        }
        Ok(())
    }

    fn write_scalar(&mut self, ty: ScalarType, value: &Value) -> Result<()> {
        match ty {
            ScalarType::Bool => {
                let b = value.as_bool().ok_or_else(|| mismatch(ty.name(), value))?;
                self.write_bool(b);
            }
            ScalarType::Str => {
                let s = value.as_str().ok_or_else(|| mismatch(ty.name(), value))?;
                self.write_str(s)?;
            }
            ScalarType::F32 | ScalarType::F64 => {
                let v = value.as_f64().ok_or_else(|| mismatch(ty.name(), value))?;
                if ty == ScalarType::F32 {
                    self.write_f32(v as f32);
                } else {
                    self.write_f64(v);
                }
            }
            _ => {
                let n = value.as_i64().ok_or_else(|| mismatch(ty.name(), value))?;
                // Narrow to the declared width first, like the schema codec does.
                match ty {
                    ScalarType::U8 => self.write_uint(n as u8 as u32),
                    ScalarType::U16 => self.write_uint(n as u16 as u32),
                    ScalarType::I8 => self.write_int(n as i8 as i32),
                    ScalarType::I16 => self.write_int(n as i16 as i32),
                    ScalarType::I32 => self.write_int(n as i32),
                    _ => self.write_uint(n as u32),
                }
            }
        }
        Ok(())
    }
}

impl Default for PackWriter {
    fn default() -> Self {
        Self::with_options(&Options::packed())
    }
}

/// Reader for the packed format.
#[derive(Debug, Clone)]
pub struct PackReader {
    bits: BitReader,
    max_depth: usize,
}

impl PackReader {
    pub fn new(bytes: Bytes) -> Self {
        Self::with_options(bytes, &Options::packed())
    }

    pub fn with_options(bytes: Bytes, options: &Options) -> Self {
        Self {
            bits: BitReader::new(bytes),
            max_depth: options.max_depth,
        }
    }

    /// Replaces the input and rewinds to its start.
    pub fn reset(&mut self, bytes: Bytes) {
        self.bits.reset(bytes);
    }

    /// Number of unread bits, including the zero padding of the last byte.
    pub fn remaining_bits(&self) -> usize {
        self.bits.remaining_bits()
    }

    /// Reads the next tagged value. Null decodes as [`Value::Null`].
    pub fn read_next(&mut self) -> Result<Value> {
        self.read_value(&Value::Null, 0)
    }

    /// Reads the next tagged value, decoding every null (nested ones included) as `null`.
    pub fn read_next_or(&mut self, null: &Value) -> Result<Value> {
        self.read_value(null, 0)
    }

    fn read_value(&mut self, null: &Value, depth: usize) -> Result<Value> {
        check_depth(depth, self.max_depth)?;
        let tag = TypeTag::try_from(self.bits.pop_bits(TYPE_TAG_BITS)? as u8)?;
        match tag {
            TypeTag::Uint => Ok(Value::U32(self.read_uint()?)),
            TypeTag::Int => {
                let magnitude = self.read_uint()?;
                Ok(Value::I32(negate_biased(magnitude)?))
            }
            TypeTag::Bool => Ok(Value::Bool(self.read_bool()?)),
            TypeTag::Str => Ok(Value::Str(self.read_str()?)),
            TypeTag::List => {
                let len = self.read_uint()? as usize;
                // Every element carries at least a tag.
                let bound = self.bits.remaining_bits() / TYPE_TAG_BITS as usize;
                let mut items = Vec::with_capacity(len.min(bound));
                for _ in 0..len {
                    items.push(self.read_value(null, depth + 1)?);
                }
                Ok(Value::List(items))
            }
            TypeTag::Map => {
                let len = self.read_uint()? as usize;
                let mut map = IndexMap::new();
                for _ in 0..len {
                    let key = self.read_str()?;
                    let item = self.read_value(null, depth + 1)?;
                    map.insert(key, item);
                }
                Ok(Value::Map(map))
            }
            TypeTag::Null => Ok(null.clone()),
            TypeTag::BigInt => Err(CodecError::UnsupportedTag(tag as u8)),
        }
    }

    pub fn read_uint(&mut self) -> Result<u32> {
        let width = self.bits.pop_bits(WIDTH_CLASS_BITS)? as u32 + 1;
        Ok(self.bits.pop_bits(width * 8)? as u32)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        let negative = self.bits.pop_bits(1)? == 1;
        let magnitude = self.read_uint()?;
        if negative {
            negate_biased(magnitude)
        } else {
            i32::try_from(magnitude).map_err(|_| CodecError::IntegerOverflow)
        }
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.bits.pop_bits(1)? == 1)
    }

    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_uint()? as usize;
        let bytes = self.bits.pop_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.bits.pop_bits(32)? as u32))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.bits.pop_bits(64)?))
    }

    /// Reads a value written by [`PackWriter::write_with_schema`] against the same node.
    pub fn read_with_schema(&mut self, schema: &Schema, root: NodeId) -> Result<Value> {
        self.read_node(schema, root, 0)
    }

    fn read_node(&mut self, schema: &Schema, id: NodeId, depth: usize) -> Result<Value> {
        check_depth(depth, self.max_depth)?;
        match schema.get(id)? {
            Node::Scalar(ty) => self.read_scalar(*ty),
            Node::List(element) => {
                let len = self.read_uint()? as usize;
                let mut items = Vec::with_capacity(len.min(self.bits.remaining_bits()));
                for _ in 0..len {
                    items.push(self.read_node(schema, *element, depth + 1)?);
                }
                Ok(Value::List(items))
            }
            Node::Object(fields) => {
                let count = self.read_uint()? as usize;
                if count == 0 {
                    return Ok(Value::Null);
                }
                if count != fields.len() {
                    return Err(CodecError::FieldCountMismatch {
                        expected: fields.len(),
                        actual: count,
                    });
                }
                let mut map = IndexMap::with_capacity(fields.len());
                for field in fields {
                    let item = self.read_node(schema, field.ty, depth + 1)?;
                    map.insert(field.name.clone(), item);
                }
                Ok(Value::Map(map))
            }
        }
    }

    fn read_scalar(&mut self, ty: ScalarType) -> Result<Value> {
        let overflow = |_| CodecError::IntegerOverflow;
        Ok(match ty {
            ScalarType::U8 => Value::U8(u8::try_from(self.read_uint()?).map_err(overflow)?),
            ScalarType::U16 => Value::U16(u16::try_from(self.read_uint()?).map_err(overflow)?),
            ScalarType::U32 => Value::U32(self.read_uint()?),
            ScalarType::I8 => Value::I8(i8::try_from(self.read_int()?).map_err(overflow)?),
            ScalarType::I16 => Value::I16(i16::try_from(self.read_int()?).map_err(overflow)?),
            ScalarType::I32 => Value::I32(self.read_int()?),
            ScalarType::F32 => Value::F32(self.read_f32()?),
            ScalarType::F64 => Value::F64(self.read_f64()?),
            ScalarType::Bool => Value::Bool(self.read_bool()?),
            ScalarType::Str => Value::Str(self.read_str()?),
        })
    }
}

/// Reverses the `|n| - 1` bias of a negative magnitude.
fn negate_biased(magnitude: u32) -> Result<i32> {
    let m = i32::try_from(magnitude).map_err(|_| CodecError::IntegerOverflow)?;
    Ok(!m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_ordinals() {
        assert_eq!(TypeTag::Uint as u8, 0);
        assert_eq!(TypeTag::Int as u8, 1);
        assert_eq!(TypeTag::Bool as u8, 2);
        assert_eq!(TypeTag::Str as u8, 3);
        assert_eq!(TypeTag::List as u8, 4);
        assert_eq!(TypeTag::BigInt as u8, 5);
        assert_eq!(TypeTag::Map as u8, 6);
        assert_eq!(TypeTag::Null as u8, 7);
        assert!(matches!(TypeTag::try_from(8), Err(CodecError::UnsupportedTag(8))));
    }

    #[test]
    fn test_byte_width() {
        assert_eq!(byte_width(0), 1);
        assert_eq!(byte_width(255), 1);
        assert_eq!(byte_width(256), 2);
        assert_eq!(byte_width(65535), 2);
        assert_eq!(byte_width(65536), 3);
        assert_eq!(byte_width(16777215), 3);
        assert_eq!(byte_width(16777216), 4);
        assert_eq!(byte_width(u32::MAX), 4);
    }

    #[test]
    fn test_uint_layout() {
        let mut writer = PackWriter::new(1);
        writer.write(&Value::U32(5)).unwrap();
        // 000 00 00000101
        assert_eq!(writer.bit_len(), 13);
        assert_eq!(&writer.into_bytes()[..], &[0b000_00_000, 0b00101_000]);
    }

    #[test]
    fn test_negative_layout() {
        let mut writer = PackWriter::new(1);
        writer.write(&Value::I32(-1)).unwrap();
        // 001 00 00000000
        assert_eq!(&writer.into_bytes()[..], &[0b001_00_000, 0]);
    }

    #[test]
    fn test_negate_biased() {
        assert_eq!(negate_biased(0).unwrap(), -1);
        assert_eq!(negate_biased(42).unwrap(), -43);
        assert_eq!(negate_biased(i32::MAX as u32).unwrap(), i32::MIN);
        assert!(negate_biased(i32::MAX as u32 + 1).is_err());
    }
}
