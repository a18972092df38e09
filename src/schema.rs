//! Type descriptors for the schema codec.
//!
//! Descriptors live in a [`Schema`] arena and refer to each other by [`NodeId`]. A node may
//! reference itself or any other node, so recursive shapes are expressed by declaring a node
//! first and defining it afterwards in terms of its own id:
//!
//! ```rust
//! use binmsg::{ScalarType, Schema};
//!
//! let mut schema = Schema::new();
//! let person = schema.declare();
//! let name = schema.scalar(ScalarType::Str);
//! let students = schema.list(person);
//! schema
//!     .define_object(person, [("name", name), ("mentor", person), ("students", students)])
//!     .unwrap();
//! schema.name(person, "Person");
//! assert_eq!(schema.lookup("Person").unwrap(), person);
//! ```
//!
//! The descriptor graph may be cyclic. Only the value tree being encoded has to be finite.

use std::collections::HashMap;
use std::fmt;

use crate::buffer::NumberType;
use crate::{CodecError, Result};

/// Scalar leaf types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
    Bool,
    Str,
}

impl ScalarType {
    /// The fixed-width numeric layout, or `None` for `Bool` and `Str`.
    pub fn number_type(self) -> Option<NumberType> {
        match self {
            ScalarType::U8 => Some(NumberType::U8),
            ScalarType::U16 => Some(NumberType::U16),
            ScalarType::U32 => Some(NumberType::U32),
            ScalarType::I8 => Some(NumberType::I8),
            ScalarType::I16 => Some(NumberType::I16),
            ScalarType::I32 => Some(NumberType::I32),
            ScalarType::F32 => Some(NumberType::F32),
            ScalarType::F64 => Some(NumberType::F64),
            ScalarType::Bool | ScalarType::Str => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::Bool => "bool",
            ScalarType::Str => "str",
        }
    }
}

impl From<NumberType> for ScalarType {
    fn from(ty: NumberType) -> Self {
        match ty {
            NumberType::U8 => ScalarType::U8,
            NumberType::U16 => ScalarType::U16,
            NumberType::U32 => ScalarType::U32,
            NumberType::I8 => ScalarType::I8,
            NumberType::I16 => ScalarType::I16,
            NumberType::I32 => ScalarType::I32,
            NumberType::F32 => ScalarType::F32,
            NumberType::F64 => ScalarType::F64,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable handle to a node in a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A named object field and the node describing its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: NodeId,
}

/// One type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(ScalarType),
    /// Homogeneous list; every element uses the referenced node.
    List(NodeId),
    /// Object with fields in declaration order. The order fixes the wire layout.
    Object(Vec<Field>),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(ty) => ty.name(),
            Node::List(_) => "list",
            Node::Object(_) => "object",
        }
    }
}

/// Arena of type descriptors.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: Vec<Option<Node>>,
    names: HashMap<String, NodeId>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes, declared or defined.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Option<Node>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Reserves an id to be defined later with [`Schema::define`]. Until then the id can
    /// already be referenced by other nodes, including its own definition.
    pub fn declare(&mut self) -> NodeId {
        self.push(None)
    }

    /// Gives a declared node its descriptor.
    ///
    /// # Errors
    /// Returns [`CodecError::UndefinedNode`] if `id` is not part of this schema.
    pub fn define(&mut self, id: NodeId, node: Node) -> Result<()> {
        let slot = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or(CodecError::UndefinedNode(id.0))?;
        *slot = Some(node);
        Ok(())
    }

    /// Defines a declared node as an object with the given fields.
    pub fn define_object<K, I>(&mut self, id: NodeId, fields: I) -> Result<()>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, NodeId)>,
    {
        self.define(id, Node::Object(collect_fields(fields)))
    }

    /// Adds a node and returns its id.
    pub fn add(&mut self, node: Node) -> NodeId {
        self.push(Some(node))
    }

    pub fn scalar(&mut self, ty: ScalarType) -> NodeId {
        self.add(Node::Scalar(ty))
    }

    pub fn list(&mut self, element: NodeId) -> NodeId {
        self.add(Node::List(element))
    }

    pub fn object<K, I>(&mut self, fields: I) -> NodeId
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, NodeId)>,
    {
        self.add(Node::Object(collect_fields(fields)))
    }

    /// Registers `name` for `id`, replacing any previous registration of the name.
    pub fn name(&mut self, id: NodeId, name: impl Into<String>) {
        self.names.insert(name.into(), id);
    }

    pub fn lookup(&self, name: &str) -> Result<NodeId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| CodecError::UnknownNodeName(name.to_string()))
    }

    /// Resolves an id to its descriptor.
    ///
    /// # Errors
    /// Returns [`CodecError::UndefinedNode`] for ids from another schema and for nodes that
    /// were declared but never defined.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(CodecError::UndefinedNode(id.0))
    }

    /// Checks that every node is defined and every reference resolves.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                None => return Err(CodecError::UndefinedNode(index as u32)),
                Some(Node::Scalar(_)) => {}
                Some(Node::List(element)) => {
                    self.get(*element)?;
                }
                Some(Node::Object(fields)) => {
                    for field in fields {
                        self.get(field.ty)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn collect_fields<K, I>(fields: I) -> Vec<Field>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, NodeId)>,
{
    fields
        .into_iter()
        .map(|(name, ty)| Field {
            name: name.into(),
            ty,
        })
        .collect()
}
