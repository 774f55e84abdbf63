//! # Storage Module
//!
//! The persisted Merkle radix tree the tools operate on:
//!
//! - **`tree_trait`**: read-side contract (`root`, `resolve`) used by traversals
//! - **`node`**: node kinds, pointers and key bit helpers
//! - **`merkle`**: node and key hashing (SHA-256)
//! - **`codec`**: on-disk node records
//! - **`file_tree`**: the append-only, file-backed engine with transactions
//!
//! Traversals only ever see the tree through `TreeStore`, so they can run
//! against any engine that exposes root and lazy resolution.

pub mod codec;
pub mod file_tree;
pub mod merkle;
pub mod node;
pub mod tree_trait;

pub use file_tree::{FileTree, Transaction, TreeOptions, DEFAULT_MAX_FILE_SIZE};
pub use node::{HashRef, Key, Node, Pointer};
pub use tree_trait::TreeStore;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::HashMap;

    use super::node::{HashRef, Node, Pointer};
    use super::TreeStore;
    use crate::error::{Error, Result};

    /// Hand-built tree for traversal tests. Nodes registered with `stored`
    /// sit behind lazy references.
    pub struct MemStore {
        pub root: Node,
        nodes: HashMap<Pointer, Node>,
    }

    impl MemStore {
        pub fn new() -> Self {
            Self {
                root: Node::Null,
                nodes: HashMap::new(),
            }
        }

        pub fn stored(&mut self, ptr: Pointer, node: Node) -> Node {
            self.nodes.insert(ptr, node);
            Node::Hash(HashRef {
                hash: [ptr.file as u8; 32],
                ptr,
            })
        }
    }

    #[async_trait]
    impl TreeStore for MemStore {
        async fn root(&self) -> Result<Node> {
            Ok(self.root.clone())
        }

        async fn resolve(&self, node: &HashRef) -> Result<Node> {
            self.nodes
                .get(&node.ptr)
                .cloned()
                .ok_or_else(|| Error::resolution(node.ptr, "no such node"))
        }
    }
}
