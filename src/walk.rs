//! # Tree Walker
//!
//! Depth-first traversal over a [`TreeStore`] driven by an explicit work
//! stack instead of recursion, so tree depth never touches the call stack.
//!
//! Each stack entry carries the node, its physical depth (bits consumed from
//! the key, 0 at the root) and its origin pointer: where the node itself is
//! stored, known only when the node was reached through a lazy reference.
//!
//! - `Null` / `Leaf`: visited, nothing pushed.
//! - `Internal`: visited, both children pushed at
//!   `depth + prefix_len + 1` without an origin.
//! - `Hash`: not visited. It is resolved (the walk's only await point, one
//!   resolution at a time) and the result is pushed back at the same depth
//!   with the reference's pointer as its origin.
//!
//! The first resolution error ends the walk. A visitor can also end it
//! early through [`Visit::is_done`].

use crate::error::Result;
use crate::store::node::{Node, Pointer};
use crate::store::TreeStore;

/// Callbacks for a walk. `visit` sees every materialized node, `resolved`
/// fires once per lazy reference.
pub trait Visit {
    fn visit(&mut self, node: &Node, depth: u32, origin: Option<&Pointer>);

    fn resolved(&mut self, _ptr: &Pointer) {}

    /// Checked after every visit; returning true ends the walk without
    /// resolving anything further.
    fn is_done(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct WorkItem {
    node: Node,
    depth: u32,
    origin: Option<Pointer>,
}

/// Owns the work stack so its allocation is reused across walks.
#[derive(Debug, Default)]
pub struct Walker {
    stack: Vec<WorkItem>,
}

impl Walker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn walk<S, V>(&mut self, store: &S, visitor: &mut V) -> Result<()>
    where
        S: TreeStore + ?Sized,
        V: Visit + ?Sized,
    {
        self.stack.clear();
        self.stack.push(WorkItem {
            node: store.root().await?,
            depth: 0,
            origin: None,
        });

        while let Some(WorkItem {
            node,
            depth,
            origin,
        }) = self.stack.pop()
        {
            if let Node::Hash(r) = node {
                let resolved = store.resolve(&r).await?;
                visitor.resolved(&r.ptr);
                self.stack.push(WorkItem {
                    node: resolved,
                    depth,
                    origin: Some(r.ptr),
                });
                continue;
            }

            visitor.visit(&node, depth, origin.as_ref());
            if visitor.is_done() {
                self.stack.clear();
                return Ok(());
            }

            if let Node::Internal(internal) = node {
                let child_depth = depth + internal.prefix.len() as u32 + 1;
                self.stack.push(WorkItem {
                    node: *internal.left,
                    depth: child_depth,
                    origin: None,
                });
                self.stack.push(WorkItem {
                    node: *internal.right,
                    depth: child_depth,
                    origin: None,
                });
            }
        }

        Ok(())
    }
}
