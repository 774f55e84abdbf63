//! # On-Disk Node Records
//!
//! Node records are `bincode`-encoded. Children are stored as hash + pointer
//! pairs, so a decoded internal node only ever holds lazy references; values
//! live in their own region and are referenced by pointer.

use serde::{Deserialize, Serialize};

use super::merkle;
use super::node::{Bits, Hash, HashRef, Internal, Key, Leaf, Node, Pointer, Value, ZERO_HASH};

/// Child slot of an internal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildRef {
    Null,
    Stored { hash: Hash, ptr: Pointer },
}

impl ChildRef {
    pub fn hash(&self) -> Hash {
        match self {
            ChildRef::Null => ZERO_HASH,
            ChildRef::Stored { hash, .. } => *hash,
        }
    }

    /// Lazy node for this slot.
    pub fn into_node(self) -> Node {
        match self {
            ChildRef::Null => Node::Null,
            ChildRef::Stored { hash, ptr } => Node::Hash(HashRef { hash, ptr }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Internal {
        prefix: Bits,
        left: ChildRef,
        right: ChildRef,
    },
    Leaf {
        key: Key,
        value_hash: Hash,
        value: Pointer,
    },
}

impl Record {
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }

    /// Hash of the node this record encodes.
    pub fn hash(&self) -> Hash {
        match self {
            Record::Internal {
                prefix,
                left,
                right,
            } => merkle::hash_internal(prefix, &left.hash(), &right.hash()),
            Record::Leaf {
                key, value_hash, ..
            } => merkle::hash_leaf(key, value_hash),
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            Record::Internal {
                prefix,
                left,
                right,
            } => Node::Internal(Internal::new(prefix, left.into_node(), right.into_node())),
            Record::Leaf {
                key,
                value_hash,
                value,
            } => Node::Leaf(Leaf {
                key,
                value: Value::Stored {
                    hash: value_hash,
                    ptr: value,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_record() -> Record {
        Record::Leaf {
            key: [3u8; 32],
            value_hash: merkle::hash_value(b"payload"),
            value: Pointer::new(1, 10, 7),
        }
    }

    #[test]
    fn test_leaf_record_decodes_to_stored_leaf() {
        let record = leaf_record();
        let bytes = record.encode().unwrap();
        assert_eq!(Record::decode(&bytes).unwrap(), record);

        match record.into_node() {
            Node::Leaf(leaf) => {
                assert_eq!(leaf.key, [3u8; 32]);
                assert_eq!(leaf.value_ptr(), Some(&Pointer::new(1, 10, 7)));
            }
            other => panic!("expected leaf, got {:?}", other),
        }
    }

    #[test]
    fn test_leaf_records_have_fixed_size() {
        let a = leaf_record().encode().unwrap();
        let b = Record::Leaf {
            key: [0xffu8; 32],
            value_hash: [0u8; 32],
            value: Pointer::new(9, u64::MAX, u32::MAX),
        }
        .encode()
        .unwrap();
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_internal_children_become_lazy_refs() {
        let ptr = Pointer::new(2, 0, 80);
        let record = Record::Internal {
            prefix: Bits::from_key(&[0xaau8; 32], 0, 5),
            left: ChildRef::Stored { hash: [1u8; 32], ptr },
            right: ChildRef::Null,
        };
        let decoded = Record::decode(&record.encode().unwrap()).unwrap();
        let hash = decoded.hash();
        assert_eq!(hash, record.hash());

        match decoded.into_node() {
            Node::Internal(internal) => {
                assert_eq!(internal.prefix.len(), 5);
                assert_eq!(
                    *internal.left,
                    Node::Hash(HashRef {
                        hash: [1u8; 32],
                        ptr
                    })
                );
                assert!(internal.right.is_null());
            }
            other => panic!("expected internal, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(Record::decode(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
