//! # Tree Node Model
//!
//! The radix tree's node kinds as a closed enum. A node is either materialized
//! in memory (`Null`, `Internal`, `Leaf`) or a lazy `Hash` reference that has
//! to be resolved through a [`TreeStore`](super::TreeStore) before its content
//! is known.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key length in bytes; keys are digests.
pub const KEY_SIZE: usize = 32;

/// Key length in bits.
pub const KEY_BITS: usize = KEY_SIZE * 8;

/// Tree key: a fixed-length digest.
pub type Key = [u8; KEY_SIZE];

/// Node or value hash.
pub type Hash = [u8; 32];

/// Hash of an empty subtree.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Physical location of a stored region: backing file index (starting at 1),
/// byte offset within that file and region length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    pub file: u32,
    pub offset: u64,
    pub size: u32,
}

impl Pointer {
    pub fn new(file: u32, offset: u64, size: u32) -> Self {
        Self { file, offset, size }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}:{}({})", self.file, self.offset, self.size)
    }
}

/// Read bit `index` of `key`, most significant bit first.
pub fn key_bit(key: &Key, index: usize) -> bool {
    (key[index >> 3] >> (7 - (index & 7))) & 1 == 1
}

/// A run of bits, packed most significant bit first.
///
/// Internal nodes use this for the prefix skipped at their branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bits {
    len: u16,
    data: Vec<u8>,
}

impl Bits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy key bits `start..end`.
    pub fn from_key(key: &Key, start: usize, end: usize) -> Self {
        let mut bits = Self::new();
        for i in start..end {
            bits.push(key_bit(key, i));
        }
        bits
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> bool {
        (self.data[index >> 3] >> (7 - (index & 7))) & 1 == 1
    }

    pub fn push(&mut self, bit: bool) {
        let index = self.len as usize;
        if index & 7 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[index >> 3] |= 1 << (7 - (index & 7));
        }
        self.len += 1;
    }

    /// Bits `start..end` as a new run.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let mut bits = Self::new();
        for i in start..end {
            bits.push(self.get(i));
        }
        bits
    }

    /// Number of leading bits shared with `key` starting at key bit `depth`.
    pub fn common_prefix(&self, key: &Key, depth: usize) -> usize {
        let mut n = 0;
        while n < self.len() && depth + n < KEY_BITS && self.get(n) == key_bit(key, depth + n) {
            n += 1;
        }
        n
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Lazy reference to a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashRef {
    pub hash: Hash,
    pub ptr: Pointer,
}

/// A leaf's value: already stored, or pending until the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Stored { hash: Hash, ptr: Pointer },
    Pending(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Internal {
    /// Bits skipped at this branch, shared by both subtrees.
    pub prefix: Bits,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

impl Internal {
    pub fn new(prefix: Bits, left: Node, right: Node) -> Self {
        Self {
            prefix,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Child on side `bit` (`false` = left).
    pub fn child(&self, bit: bool) -> &Node {
        if bit {
            &self.right
        } else {
            &self.left
        }
    }

    pub fn set_child(&mut self, bit: bool, node: Node) {
        if bit {
            *self.right = node;
        } else {
            *self.left = node;
        }
    }

    /// Take the child on side `bit`, leaving `Null` in its place.
    pub fn take_child(&mut self, bit: bool) -> Node {
        let slot = if bit { &mut self.right } else { &mut self.left };
        std::mem::replace(slot.as_mut(), Node::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub key: Key,
    pub value: Value,
}

impl Leaf {
    pub fn pending(key: Key, value: Vec<u8>) -> Self {
        Self {
            key,
            value: Value::Pending(value),
        }
    }

    /// Location of the stored value, if it has been written.
    pub fn value_ptr(&self) -> Option<&Pointer> {
        match &self.value {
            Value::Stored { ptr, .. } => Some(ptr),
            Value::Pending(_) => None,
        }
    }
}

/// Kind tag used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Internal,
    Leaf,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Node {
    #[default]
    Null,
    Internal(Internal),
    Leaf(Leaf),
    Hash(HashRef),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Internal(_) => NodeKind::Internal,
            Node::Leaf(_) => NodeKind::Leaf,
            Node::Hash(_) => NodeKind::Hash,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }
}
