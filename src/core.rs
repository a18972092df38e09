//! The schema codec.
//!
//! Values are written by recursive descent over the schema, one call per node, with no type
//! information in the output:
//!
//! - Scalars use the fixed-width big-endian layouts of [`GrowableBuffer`]; `bool` is one
//!   byte and `str` is a size tag followed by UTF-8 bytes.
//! - Lists are a size tag holding the element count, followed by the elements.
//! - Objects are a size tag holding the declared field count, followed by the fields in
//!   declaration order. A null object is a size tag of 0 and nothing else, so reading a
//!   count of 0 always yields [`Value::Null`].

use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::buffer::{GrowableBuffer, NumberType};
use crate::config::Options;
use crate::schema::{Field, Node, NodeId, ScalarType, Schema};
use crate::value::Value;
use crate::{CodecError, Result};

/// Stands in for object fields that are absent from a map.
pub(crate) static NULL: Value = Value::Null;

/// Serializes `value` against the schema node `root`.
///
/// # Errors
/// Fails when the value does not match the schema, a node is undefined, a size does not fit
/// a size tag, or nesting exceeds `options.max_depth`.
pub fn serialize_with(
    value: &Value,
    schema: &Schema,
    root: NodeId,
    options: &Options,
) -> Result<Bytes> {
    let mut writer = SchemaWriter {
        buffer: GrowableBuffer::with_capacity(options.initial_capacity),
        schema,
        max_depth: options.max_depth,
    };
    let size = writer.write_node(0, value, root, 0)?;
    trace!(size, capacity = writer.buffer.capacity(), "serialized value");
    Ok(writer.buffer.freeze(size))
}

/// Deserializes a value written by [`serialize_with`] against the same schema node.
///
/// Trailing bytes after the value are ignored.
///
/// # Errors
/// Fails on truncated input, invalid size tags, invalid UTF-8, object field counts that
/// differ from the schema, undefined nodes, or nesting deeper than `options.max_depth`.
pub fn deserialize_with(
    bytes: &[u8],
    schema: &Schema,
    root: NodeId,
    options: &Options,
) -> Result<Value> {
    let reader = SchemaReader {
        buffer: GrowableBuffer::from_slice(bytes),
        schema,
        max_depth: options.max_depth,
    };
    let (value, size) = reader.read_node(0, root, 0).map_err(|e| {
        debug!(error = %e, len = bytes.len(), "rejected schema input");
        e
    })?;
    trace!(size, "deserialized value");
    Ok(value)
}

pub(crate) fn mismatch(expected: &'static str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

pub(crate) fn check_depth(depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(CodecError::DepthLimitExceeded(max_depth));
    }
    Ok(())
}

struct SchemaWriter<'s> {
    buffer: GrowableBuffer,
    schema: &'s Schema,
    max_depth: usize,
}

impl<'s> SchemaWriter<'s> {
    /// Writes `value` at `offset` and returns the number of bytes it occupies.
    fn write_node(
        &mut self,
        offset: usize,
        value: &Value,
        id: NodeId,
        depth: usize,
    ) -> Result<usize> {
        check_depth(depth, self.max_depth)?;
        let schema = self.schema;
        match schema.get(id)? {
            Node::Scalar(ty) => write_scalar(&mut self.buffer, offset, *ty, value),
            Node::List(element) => self.write_list(offset, value, *element, depth),
            Node::Object(fields) => self.write_object(offset, value, fields, depth),
        }
    }

    fn write_list(
        &mut self,
        offset: usize,
        value: &Value,
        element: NodeId,
        depth: usize,
    ) -> Result<usize> {
        let items = value.as_list().ok_or_else(|| mismatch("list", value))?;
        let mut cursor = offset + self.buffer.write_size(offset, items.len())?;
        for item in items {
            cursor += self.write_node(cursor, item, element, depth + 1)?;
        }
        Ok(cursor - offset)
    }

    fn write_object(
        &mut self,
        offset: usize,
        value: &Value,
        fields: &'s [Field],
        depth: usize,
    ) -> Result<usize> {
        let map = match value {
            Value::Null => return self.buffer.write_size(offset, 0),
            Value::Map(map) => map,
            other => return Err(mismatch("object", other)),
        };
        let mut cursor = offset + self.buffer.write_size(offset, fields.len())?;
        for field in fields {
            let field_value = match map.get(&field.name) {
                Some(v) => v,
                // An absent object field reads the same as an explicit null.
                None if matches!(self.schema.get(field.ty)?, Node::Object(_)) => &NULL,
                None => return Err(CodecError::MissingField(field.name.clone())),
            };
            cursor += self.write_node(cursor, field_value, field.ty, depth + 1)?;
        }
        Ok(cursor - offset)
    }
}

fn write_scalar(
    buffer: &mut GrowableBuffer,
    offset: usize,
    ty: ScalarType,
    value: &Value,
) -> Result<usize> {
    if let Some(number) = ty.number_type() {
        let n = value.as_f64().ok_or_else(|| mismatch(ty.name(), value))?;
        return Ok(buffer.write_number(offset, number, n));
    }
    match value {
        Value::Bool(b) if ty == ScalarType::Bool => Ok(buffer.write_bool(offset, *b)),
        Value::Str(s) if ty == ScalarType::Str => buffer.write_str(offset, s),
        other => Err(mismatch(ty.name(), other)),
    }
}

struct SchemaReader<'s> {
    buffer: GrowableBuffer,
    schema: &'s Schema,
    max_depth: usize,
}

impl SchemaReader<'_> {
    /// Reads the value at `offset`. Returns the value and the number of bytes consumed.
    fn read_node(&self, offset: usize, id: NodeId, depth: usize) -> Result<(Value, usize)> {
        check_depth(depth, self.max_depth)?;
        match self.schema.get(id)? {
            Node::Scalar(ty) => read_scalar(&self.buffer, offset, *ty),
            Node::List(element) => self.read_list(offset, *element, depth),
            Node::Object(fields) => self.read_object(offset, fields, depth),
        }
    }

    fn read_list(&self, offset: usize, element: NodeId, depth: usize) -> Result<(Value, usize)> {
        let (count, tag_len) = self.buffer.read_size(offset)?;
        let mut cursor = offset + tag_len;
        // Every element takes at least one byte, so the remaining input bounds the count.
        let remaining = self.buffer.capacity().saturating_sub(cursor);
        let mut items = Vec::with_capacity(count.min(remaining));
        for _ in 0..count {
            let (item, len) = self.read_node(cursor, element, depth + 1)?;
            items.push(item);
            cursor += len;
        }
        Ok((Value::List(items), cursor - offset))
    }

    fn read_object(&self, offset: usize, fields: &[Field], depth: usize) -> Result<(Value, usize)> {
        let (count, tag_len) = self.buffer.read_size(offset)?;
        if count == 0 {
            return Ok((Value::Null, tag_len));
        }
        if count != fields.len() {
            return Err(CodecError::FieldCountMismatch {
                expected: fields.len(),
                actual: count,
            });
        }
        let mut cursor = offset + tag_len;
        let mut map = IndexMap::with_capacity(fields.len());
        for field in fields {
            let (value, len) = self.read_node(cursor, field.ty, depth + 1)?;
            map.insert(field.name.clone(), value);
            cursor += len;
        }
        Ok((Value::Map(map), cursor - offset))
    }
}

fn read_scalar(buffer: &GrowableBuffer, offset: usize, ty: ScalarType) -> Result<(Value, usize)> {
    if let Some(number) = ty.number_type() {
        let n = buffer.read_number(offset, number)?;
        return Ok((number_value(number, n), number.size()));
    }
    match ty {
        ScalarType::Bool => Ok((Value::Bool(buffer.read_bool(offset)?), 1)),
        _ => {
            let (s, len) = buffer.read_str(offset)?;
            Ok((Value::Str(s), len))
        }
    }
}

/// Rebuilds the typed variant for a number read with layout `ty`. The casts are exact
/// because `n` came from a value of that layout.
fn number_value(ty: NumberType, n: f64) -> Value {
    match ty {
        NumberType::U8 => Value::U8(n as u8),
        NumberType::U16 => Value::U16(n as u16),
        NumberType::U32 => Value::U32(n as u32),
        NumberType::I8 => Value::I8(n as i8),
        NumberType::I16 => Value::I16(n as i16),
        NumberType::I32 => Value::I32(n as i32),
        NumberType::F32 => Value::F32(n as f32),
        NumberType::F64 => Value::F64(n),
    }
}
