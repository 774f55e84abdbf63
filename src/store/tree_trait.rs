//! # Tree Storage Trait
//!
//! The read-side contract the traversal tools need from a persisted tree.
//! Anything that can hand out a root and resolve lazy references can be
//! audited or dumped.
//!
//! ## Implementations
//!
//! - `FileTree`: append-only backing files with a meta root record

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::node::{HashRef, Node};
use crate::error::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Current root. A persisted root comes back as a lazy reference so its
    /// own storage location is known; an empty tree returns `Node::Null`.
    ///
    /// # Returns
    /// * `Result<Node>` - `Node::Hash` for a committed root, `Node::Null` when
    ///   nothing was ever committed
    async fn root(&self) -> Result<Node>;

    /// Load the node behind a lazy reference.
    ///
    /// This is the only operation that performs I/O during a traversal.
    ///
    /// # Arguments
    /// * `node` - Reference carrying the expected hash and the stored location
    ///
    /// # Returns
    /// * `Result<Node>` - The concrete node, or `Error::Resolution` when the
    ///   referenced region is missing or corrupt
    async fn resolve(&self, node: &HashRef) -> Result<Node>;
}
