//! Writer and reader configuration.

/// Initial capacity of a schema codec writer buffer.
pub const DEFAULT_SCHEMA_CAPACITY: usize = 128;
/// Initial capacity of packed and stream writer buffers.
pub const DEFAULT_PACKED_CAPACITY: usize = 16;
/// Maximum nesting of lists and objects before a codec gives up.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Tunables shared by both codecs.
///
/// # Example
/// ```rust
/// use binmsg::Options;
///
/// let options = Options::default().with_initial_capacity(4).with_max_depth(8);
/// assert_eq!(options.initial_capacity, 4);
/// assert_eq!(options.max_depth, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Bytes allocated up front by a writer. The buffer grows past this on demand.
    pub initial_capacity: usize,
    /// Deepest list/object nesting accepted while encoding or decoding.
    /// The root value sits at depth 0.
    pub max_depth: usize,
}

impl Options {
    /// Defaults for the packed codec, which starts with a smaller buffer.
    pub fn packed() -> Self {
        Self {
            initial_capacity: DEFAULT_PACKED_CAPACITY,
            ..Self::default()
        }
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_SCHEMA_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
