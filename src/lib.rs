//! # binmsg
//!
//! Two compact binary codecs for dynamic values over a growable byte buffer.
//!
//! - The **schema codec** ([`serialize`] / [`deserialize`]) writes values against an external
//!   [`Schema`]. No type information is stored in the output, so decoding needs the exact
//!   schema that was used for encoding. Schemas may be self-referential.
//! - The **packed codec** ([`pack`] / [`unpack`]) writes every value with a 3-bit type
//!   discriminant into a continuous bitstream. The output can be decoded without a schema.
//!
//! ## Wire constants
//!
//! - Size tags: 1, 2 or 4 bytes, big-endian, width discriminant (1/2/4) in the top 3 bits.
//! - Packed discriminants: `uint=0, int=1, bool=2, str=3, list=4, bigint=5 (reserved),
//!   map=6, null=7`.
//! - Packed integers: 2-bit width class (1..=4 bytes) followed by the magnitude, MSB first.
//!
//! ## Feature Flags
//!
//! - `serde_json`: Enables conversion between [`Value`] and `serde_json::Value`.
//!
//! ## Example
//! ```rust
//! use binmsg::{deserialize, serialize, ScalarType, Schema, Value};
//!
//! let mut schema = Schema::new();
//! let person = schema.declare();
//! let id = schema.scalar(ScalarType::U8);
//! let name = schema.scalar(ScalarType::Str);
//! schema
//!     .define_object(person, [("id", id), ("name", name), ("mentor", person)])
//!     .unwrap();
//!
//! let value = Value::map([
//!     ("id", Value::U8(1)),
//!     ("name", Value::from("John")),
//!     ("mentor", Value::Null),
//! ]);
//! let bytes = serialize(&value, &schema, person).unwrap();
//! assert_eq!(deserialize(&bytes, &schema, person).unwrap(), value);
//! ```

pub mod bits;
pub mod buffer;
pub mod config;
pub mod core;
mod features;
pub mod packed;
pub mod schema;
pub mod size_tag;
pub mod stream;
pub mod value;

use bytes::Bytes;

pub use crate::buffer::{GrowableBuffer, NumberType};
pub use crate::config::Options;
pub use crate::packed::{PackReader, PackWriter, TypeTag};
pub use crate::schema::{Field, Node, NodeId, ScalarType, Schema};
pub use crate::stream::{BufferReader, BufferWriter};
pub use crate::value::Value;

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// The bytes could not be decoded (e.g., invalid UTF-8).
    #[error("Decode error: {0}")]
    Decode(String),
    /// The buffer did not contain enough data to complete the operation.
    #[error("Insufficient data in buffer")]
    InsufficientData,
    /// A size or length does not fit the field it has to be written into.
    #[error("Size {0} does not fit the size field")]
    SizeOverflow(usize),
    /// The top bits of a size tag did not hold a known width discriminant.
    #[error("Invalid size tag discriminant: {0}")]
    InvalidSizeTag(u8),
    /// A packed type discriminant that this codec does not read.
    #[error("Unsupported type tag: {0}")]
    UnsupportedTag(u8),
    /// The value does not have the shape the schema node asks for.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A declared object field is absent from the value being encoded.
    #[error("Required field '{0}' not found")]
    MissingField(String),
    /// A present object was read with a field count other than the declared one.
    #[error("Field count mismatch: expected {expected}, got {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },
    /// A node id that is out of range or was declared but never defined.
    #[error("Undefined schema node: {0}")]
    UndefinedNode(u32),
    /// No node is registered under the given name.
    #[error("Unknown schema node name: '{0}'")]
    UnknownNodeName(String),
    /// Nesting went deeper than [`Options::max_depth`].
    #[error("Exceeded maximum nesting depth of {0}")]
    DepthLimitExceeded(usize),
    /// A decoded integer does not fit the 32-bit range of [`Value`].
    #[error("Integer out of range")]
    IntegerOverflow,
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Serializes `value` against the schema node `root` with default [`Options`].
///
/// # Example
/// ```rust
/// use binmsg::{deserialize, serialize, ScalarType, Schema, Value};
///
/// let mut schema = Schema::new();
/// let u8_node = schema.scalar(ScalarType::U8);
/// let list = schema.list(u8_node);
///
/// let value = Value::List(vec![Value::U8(10), Value::U8(255)]);
/// let bytes = serialize(&value, &schema, list).unwrap();
/// assert_eq!(&bytes[..], &[0x22, 10, 255]);
/// assert_eq!(deserialize(&bytes, &schema, list).unwrap(), value);
/// ```
pub fn serialize(value: &Value, schema: &Schema, root: NodeId) -> Result<Bytes> {
    crate::core::serialize_with(value, schema, root, &Options::default())
}

/// Deserializes bytes produced by [`serialize`] with the same schema node.
pub fn deserialize(bytes: &[u8], schema: &Schema, root: NodeId) -> Result<Value> {
    crate::core::deserialize_with(bytes, schema, root, &Options::default())
}

/// Packs `value` into the self-describing bitstream format.
///
/// # Example
/// ```rust
/// use binmsg::{pack, unpack, Value};
///
/// let value = Value::List(vec![
///     Value::from("sffs"),
///     Value::Bool(true),
///     Value::U32(3848),
///     Value::I32(-43),
/// ]);
/// let bytes = pack(&value).unwrap();
/// assert_eq!(unpack(&bytes).unwrap(), value);
/// ```
pub fn pack(value: &Value) -> Result<Bytes> {
    packed::pack_with(value, &Options::packed())
}

/// Unpacks one value from bytes produced by [`pack`].
pub fn unpack(bytes: &[u8]) -> Result<Value> {
    packed::unpack_with(bytes, &Options::packed())
}
