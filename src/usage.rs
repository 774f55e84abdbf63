//! # Tree Usage Auditor
//!
//! Folds every node reached by a [`Walker`] into three aggregate scopes at
//! once: the global total, one table per physical depth, and one table per
//! backing file.
//!
//! A node's own bytes are known only when it was reached through a lazy
//! reference (its origin pointer). Those bytes go to the total, to its depth
//! and to the origin's file. A node without an origin is still counted, with
//! zero bytes and no file. A leaf also adds its value to the `data` bucket of
//! all three scopes, and the per-file share goes to the file that holds the
//! value, which need not be the file holding the leaf.

use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::store::node::{Node, Pointer};
use crate::store::TreeStore;
use crate::walk::{Visit, Walker};

/// Count and byte size of one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub count: u64,
    pub size: u64,
}

impl Bucket {
    fn add(&mut self, size: u64) {
        self.count += 1;
        self.size += size;
    }
}

/// One aggregate scope.
///
/// `total_nodes` counts internals, leaves and nulls. `total_size` is their
/// encoded sizes plus the `data` bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TotalStats {
    pub total_nodes: u64,
    pub total_size: u64,
    pub internals: Bucket,
    pub leaves: Bucket,
    pub nulls: Bucket,
    pub data: Bucket,
}

impl TotalStats {
    pub fn add_null(&mut self, size: u64) {
        self.nulls.add(size);
        self.add_node(size);
    }

    pub fn add_internal(&mut self, size: u64) {
        self.internals.add(size);
        self.add_node(size);
    }

    pub fn add_leaf(&mut self, size: u64) {
        self.leaves.add(size);
        self.add_node(size);
    }

    /// Value bytes. Counted in `total_size` but not in `total_nodes`.
    pub fn add_data(&mut self, size: u64) {
        self.data.add(size);
        self.total_size += size;
    }

    fn add_node(&mut self, size: u64) {
        self.total_nodes += 1;
        self.total_size += size;
    }
}

/// Result of one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeUsage {
    /// Lazy references resolved during the walk.
    pub resolves: u64,
    pub max_depth: u32,
    /// Highest backing file index seen; 0 when nothing was attributed to a file.
    pub max_file: u32,
    pub total: TotalStats,
    pub per_depth: BTreeMap<u32, TotalStats>,
    pub per_file: BTreeMap<u32, TotalStats>,
}

impl TreeUsage {
    fn record<F>(&mut self, depth: u32, file: Option<u32>, add: F)
    where
        F: Fn(&mut TotalStats),
    {
        add(&mut self.total);
        add(self.per_depth.entry(depth).or_default());
        if let Some(file) = file {
            add(self.per_file.entry(file).or_default());
            self.max_file = self.max_file.max(file);
        }
    }
}

impl Visit for TreeUsage {
    fn visit(&mut self, node: &Node, depth: u32, origin: Option<&Pointer>) {
        let size = origin.map_or(0, |ptr| ptr.size as u64);
        let file = origin.map(|ptr| ptr.file);
        self.max_depth = self.max_depth.max(depth);

        match node {
            Node::Null => self.record(depth, file, |t| t.add_null(size)),
            Node::Internal(_) => self.record(depth, file, |t| t.add_internal(size)),
            Node::Leaf(leaf) => {
                self.record(depth, file, |t| t.add_leaf(size));
                if let Some(vptr) = leaf.value_ptr() {
                    let vsize = vptr.size as u64;
                    self.record(depth, Some(vptr.file), |t| t.add_data(vsize));
                }
            }
            // The walker resolves references instead of visiting them
            Node::Hash(_) => {}
        }
    }

    fn resolved(&mut self, _ptr: &Pointer) {
        self.resolves += 1;
    }
}

/// Reusable auditor; keeps the walker's stack between runs.
#[derive(Debug, Default)]
pub struct Auditor {
    walker: Walker,
}

impl Auditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn audit<S: TreeStore + ?Sized>(&mut self, store: &S) -> Result<TreeUsage> {
        let mut usage = TreeUsage::default();
        self.walker.walk(store, &mut usage).await?;
        info!(
            "Audited {} nodes ({} bytes) with {} resolves, max depth {}",
            usage.total.total_nodes, usage.total.total_size, usage.resolves, usage.max_depth
        );
        Ok(usage)
    }
}

/// Audit `store` in a single pass.
pub async fn audit<S: TreeStore + ?Sized>(store: &S) -> Result<TreeUsage> {
    Auditor::new().audit(store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::node::{Bits, HashRef, Internal, Leaf, Value};
    use crate::store::testing::MemStore;
    use crate::store::tree_trait::MockTreeStore;

    fn leaf(byte: u8, vptr: Pointer) -> Node {
        Node::Leaf(Leaf {
            key: [byte; 32],
            value: Value::Stored {
                hash: [0u8; 32],
                ptr: vptr,
            },
        })
    }

    fn prefix(len: usize) -> Bits {
        Bits::from_key(&[0u8; 32], 0, len)
    }

    /// root (f1, 100B, prefix 2)
    ///   left:  leaf (f1, 80B) value f2 30B
    ///   right: internal (f2, 90B, no prefix)
    ///            left:  leaf (f2, 80B) value f1 10B
    ///            right: leaf (f3, 80B) value f3 5B
    fn sample_store() -> MemStore {
        let mut store = MemStore::new();
        let a = store.stored(Pointer::new(1, 100, 80), leaf(1, Pointer::new(2, 0, 30)));
        let b = store.stored(Pointer::new(2, 120, 80), leaf(2, Pointer::new(1, 300, 10)));
        let c = store.stored(Pointer::new(3, 0, 80), leaf(3, Pointer::new(3, 80, 5)));
        let inner = Node::Internal(Internal::new(prefix(0), b, c));
        let inner = store.stored(Pointer::new(2, 30, 90), inner);
        let root = Node::Internal(Internal::new(prefix(2), a, inner));
        store.root = store.stored(Pointer::new(1, 0, 100), root);
        store
    }

    #[tokio::test]
    async fn test_sample_totals() {
        let usage = audit(&sample_store()).await.unwrap();

        let total = &usage.total;
        assert_eq!(total.internals, Bucket { count: 2, size: 190 });
        assert_eq!(total.leaves, Bucket { count: 3, size: 240 });
        assert_eq!(total.nulls, Bucket::default());
        assert_eq!(total.data, Bucket { count: 3, size: 45 });
        assert_eq!(total.total_nodes, 5);
        assert_eq!(total.total_size, 475);
        assert_eq!(usage.resolves, 5);
        assert_eq!(usage.max_depth, 4);
        assert_eq!(usage.max_file, 3);
    }

    #[tokio::test]
    async fn test_sample_per_depth() {
        let usage = audit(&sample_store()).await.unwrap();
        let depths: Vec<(u32, u64)> = usage
            .per_depth
            .iter()
            .map(|(d, s)| (*d, s.total_size))
            .collect();
        assert_eq!(depths, vec![(0, 100), (3, 200), (4, 175)]);
        assert_eq!(usage.per_depth[&3].leaves.count, 1);
        assert_eq!(usage.per_depth[&3].internals.count, 1);
        assert_eq!(usage.per_depth[&4].data, Bucket { count: 2, size: 15 });
    }

    #[tokio::test]
    async fn test_values_attributed_to_their_own_file() {
        let usage = audit(&sample_store()).await.unwrap();

        let f1 = &usage.per_file[&1];
        assert_eq!(f1.internals.size, 100);
        assert_eq!(f1.leaves, Bucket { count: 1, size: 80 });
        // The value of the leaf stored in file 2
        assert_eq!(f1.data, Bucket { count: 1, size: 10 });
        assert_eq!(f1.total_size, 190);

        assert_eq!(usage.per_file[&2].total_size, 200);
        assert_eq!(usage.per_file[&3].total_size, 85);
    }

    #[tokio::test]
    async fn test_scopes_sum_to_total() {
        let usage = audit(&sample_store()).await.unwrap();
        let by_depth: u64 = usage.per_depth.values().map(|s| s.total_size).sum();
        let by_file: u64 = usage.per_file.values().map(|s| s.total_size).sum();
        assert_eq!(by_depth, usage.total.total_size);
        assert_eq!(by_file, usage.total.total_size);

        let t = &usage.total;
        assert_eq!(t.total_nodes, t.internals.count + t.leaves.count + t.nulls.count);
    }

    #[tokio::test]
    async fn test_unreferenced_root_has_no_size() {
        let mut store = MemStore::new();
        store.root = leaf(1, Pointer::new(4, 0, 12));

        let usage = audit(&store).await.unwrap();
        assert_eq!(usage.total.leaves, Bucket { count: 1, size: 0 });
        assert_eq!(usage.total.data, Bucket { count: 1, size: 12 });
        assert_eq!(usage.total.total_size, 12);
        // Only the value has a known file
        assert_eq!(usage.per_file[&4].leaves.count, 0);
        assert_eq!(usage.per_file[&4].data.size, 12);
    }

    #[tokio::test]
    async fn test_empty_tree() {
        let usage = audit(&MemStore::new()).await.unwrap();
        assert_eq!(usage.total.total_nodes, 1);
        assert_eq!(usage.total.nulls.count, 1);
        assert_eq!(usage.total.total_size, 0);
        assert_eq!(usage.resolves, 0);
        assert!(usage.per_file.is_empty());
    }

    #[tokio::test]
    async fn test_auditing_twice_is_identical() {
        let store = sample_store();
        let mut auditor = Auditor::new();
        let first = auditor.audit(&store).await.unwrap();
        let second = auditor.audit(&store).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolution_error_aborts_audit() {
        let ptr = Pointer::new(1, 0, 64);
        let mut store = MockTreeStore::new();
        store
            .expect_root()
            .times(1)
            .returning(move || Ok(Node::Hash(HashRef { hash: [0u8; 32], ptr })));
        store
            .expect_resolve()
            .times(1)
            .returning(|r| Err(Error::resolution(r.ptr, "checksum")));

        let err = audit(&store).await.unwrap_err();
        assert!(matches!(err, Error::Resolution { ptr: p, .. } if p == ptr));
    }

    #[tokio::test]
    async fn test_one_resolve_per_reference() {
        let leaf_ptr = Pointer::new(1, 0, 84);
        let mut store = MockTreeStore::new();
        store
            .expect_root()
            .returning(move || Ok(Node::Hash(HashRef { hash: [0u8; 32], ptr: leaf_ptr })));
        store
            .expect_resolve()
            .withf(move |r| r.ptr == leaf_ptr)
            .times(1)
            .returning(|_| Ok(leaf(5, Pointer::new(1, 84, 16))));

        let usage = audit(&store).await.unwrap();
        assert_eq!(usage.resolves, 1);
        assert_eq!(usage.total.total_size, 100);
        assert_eq!(usage.per_file[&1].total_size, 100);
    }
}
