//! # File-Backed Radix Tree
//!
//! A persisted base-2 radix Merkle tree over 256-bit keys. Nodes and values
//! are appended to numbered backing files (`0000000001`, `0000000002`, ...)
//! inside the store directory; a `meta` file records the current root.
//!
//! ## Write Path
//!
//! A [`Transaction`] holds the working root in memory and resolves stored
//! nodes lazily while descending. `commit` writes every new value and node
//! post-order, fsyncs the backing files, then swaps `meta` with a
//! write-and-rename. Until `meta` is replaced nothing from the transaction is
//! reachable, so a failed or dropped transaction leaves the previous root
//! intact.
//!
//! A backing file rolls over to the next index once an append would push it
//! past `max_file_size`. A leaf's value is appended right before the leaf, so
//! the two can straddle a rollover and end up in different files.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::codec::{ChildRef, Record};
use super::merkle;
use super::node::{
    key_bit, Bits, Hash, HashRef, Internal, Key, Leaf, Node, Pointer, Value, KEY_BITS,
};
use super::tree_trait::TreeStore;
use crate::error::{Error, Result};

/// Default backing file size limit (2 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

const META_FILE: &str = "meta";
const META_TMP_FILE: &str = "meta.tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Size at which a backing file stops taking appends.
    pub max_file_size: u64,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Meta {
    root: ChildRef,
}

fn file_name(index: u32) -> String {
    format!("{:010}", index)
}

fn parse_file_name(name: &str) -> Option<u32> {
    if name.len() == 10 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok().filter(|&index| index > 0)
    } else {
        None
    }
}

pub struct FileTree {
    path: PathBuf,
    options: TreeOptions,
    root: ChildRef,
    /// Backing file currently taking appends, and its length.
    file: u32,
    file_len: u64,
    readers: Mutex<HashMap<u32, File>>,
}

impl FileTree {
    /// Open the store at `path`, creating an empty one if the directory does
    /// not exist yet.
    ///
    /// # Arguments
    /// * `path` - Store directory holding the backing files and `meta`
    /// * `options` - Backing file limits used by later commits
    ///
    /// # Returns
    /// * `Result<FileTree>` - The store positioned at its committed root
    pub async fn open<P: AsRef<Path>>(path: P, options: TreeOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)
            .await
            .map_err(|e| Error::open(&path, e.to_string()))?;
        Self::load(path, options).await
    }

    /// Open an already existing store. Inspection tools use this so a typo in
    /// the path is an error instead of a fresh empty tree.
    ///
    /// # Returns
    /// * `Result<FileTree>` - The store, or `Error::StoreMissing` when `path`
    ///   does not exist
    pub async fn open_existing<P: AsRef<Path>>(path: P, options: TreeOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Self::load(path, options).await,
            Ok(_) => Err(Error::open(&path, "not a directory")),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::store_missing(path)),
            Err(e) => Err(Error::open(&path, e.to_string())),
        }
    }

    async fn load(path: PathBuf, options: TreeOptions) -> Result<Self> {
        let root = match fs::read(path.join(META_FILE)).await {
            Ok(bytes) => {
                let meta: Meta = bincode::deserialize(&bytes)
                    .map_err(|e| Error::open(&path, format!("corrupt meta record: {}", e)))?;
                meta.root
            }
            Err(e) if e.kind() == ErrorKind::NotFound => ChildRef::Null,
            Err(e) => return Err(Error::open(&path, e.to_string())),
        };

        let (file, file_len) = Self::latest_file(&path).await?;
        info!(
            "Opened tree at {} (root {}, appending to file {} at {})",
            path.display(),
            hex::encode(root.hash()),
            file,
            file_len
        );

        Ok(Self {
            path,
            options,
            root,
            file,
            file_len,
            readers: Mutex::new(HashMap::new()),
        })
    }

    /// Highest numbered backing file and its current length. Bytes left behind
    /// by a failed commit are counted, so new appends never overlap them.
    async fn latest_file(path: &Path) -> Result<(u32, u64)> {
        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| Error::open(path, e.to_string()))?;
        let mut latest = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::open(path, e.to_string()))?
        {
            if let Some(index) = entry.file_name().to_str().and_then(parse_file_name) {
                latest = latest.max(index);
            }
        }

        if latest == 0 {
            return Ok((1, 0));
        }
        let len = fs::metadata(path.join(file_name(latest)))
            .await
            .map_err(|e| Error::open(path, e.to_string()))?
            .len();
        Ok((latest, len))
    }

    /// Release the store. Committed data is already durable; this only drops
    /// the cached read handles.
    pub async fn close(self) -> Result<()> {
        self.readers.lock().await.clear();
        info!("Closed tree at {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn root_hash(&self) -> Hash {
        self.root.hash()
    }

    fn file_path(&self, index: u32) -> PathBuf {
        self.path.join(file_name(index))
    }

    async fn read_at(&self, ptr: &Pointer) -> std::io::Result<Vec<u8>> {
        let mut readers = self.readers.lock().await;
        if !readers.contains_key(&ptr.file) {
            let file = File::open(self.file_path(ptr.file)).await?;
            readers.insert(ptr.file, file);
        }
        let file = readers
            .get_mut(&ptr.file)
            .ok_or_else(|| std::io::Error::new(ErrorKind::NotFound, "reader vanished"))?;
        file.seek(SeekFrom::Start(ptr.offset)).await?;
        let mut buf = vec![0u8; ptr.size as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Read the raw bytes of a stored value.
    pub async fn read_value(&self, ptr: &Pointer) -> Result<Vec<u8>> {
        self.read_at(ptr)
            .await
            .map_err(|e| Error::resolution(*ptr, e.to_string()))
    }

    /// Look up the committed value for `key`.
    pub async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>> {
        let mut node = self.root.into_node();
        let mut depth = 0;

        loop {
            match node {
                Node::Null => return Ok(None),
                Node::Hash(r) => node = self.resolve(&r).await?,
                Node::Leaf(leaf) => {
                    if leaf.key != *key {
                        return Ok(None);
                    }
                    return match leaf.value {
                        Value::Stored { hash, ptr } => {
                            let value = self.read_value(&ptr).await?;
                            if merkle::hash_value(&value) != hash {
                                return Err(Error::resolution(ptr, "value hash mismatch"));
                            }
                            Ok(Some(value))
                        }
                        Value::Pending(value) => Ok(Some(value)),
                    };
                }
                Node::Internal(mut internal) => {
                    let n = internal.prefix.len();
                    if depth + n >= KEY_BITS || internal.prefix.common_prefix(key, depth) < n {
                        return Ok(None);
                    }
                    let bit = key_bit(key, depth + n);
                    depth += n + 1;
                    node = internal.take_child(bit);
                }
            }
        }
    }

    /// Start a write batch. The mutable borrow keeps a second transaction
    /// from being opened while this one is outstanding.
    pub fn transaction(&mut self) -> Transaction<'_> {
        let root = self.root.into_node();
        Transaction {
            tree: self,
            root,
            inserts: 0,
        }
    }

    async fn write_meta(&self, meta: &Meta) -> Result<()> {
        let bytes = bincode::serialize(meta).map_err(|e| Error::commit(e.to_string()))?;
        let tmp = self.path.join(META_TMP_FILE);

        let mut file = File::create(&tmp)
            .await
            .map_err(|e| Error::commit(format!("create {}: {}", tmp.display(), e)))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| Error::commit(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| Error::commit(e.to_string()))?;
        fs::rename(&tmp, self.path.join(META_FILE))
            .await
            .map_err(|e| Error::commit(format!("replace meta: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl TreeStore for FileTree {
    async fn root(&self) -> Result<Node> {
        Ok(self.root.into_node())
    }

    async fn resolve(&self, node: &HashRef) -> Result<Node> {
        let ptr = node.ptr;
        let bytes = self
            .read_at(&ptr)
            .await
            .map_err(|e| Error::resolution(ptr, e.to_string()))?;
        let record = Record::decode(&bytes)
            .map_err(|e| Error::resolution(ptr, format!("undecodable record: {}", e)))?;
        if record.hash() != node.hash {
            return Err(Error::resolution(ptr, "node hash mismatch"));
        }
        debug!("Resolved node at {}", ptr);
        Ok(record.into_node())
    }
}

/// Reattach a descent path above `node`, innermost entry last.
fn rebuild(mut path: Vec<(Internal, bool)>, mut node: Node) -> Node {
    while let Some((mut internal, bit)) = path.pop() {
        internal.set_child(bit, node);
        node = Node::Internal(internal);
    }
    node
}

fn first_difference(a: &Key, b: &Key, from: usize) -> Option<usize> {
    (from..KEY_BITS).find(|&i| key_bit(a, i) != key_bit(b, i))
}

/// A batch of inserts applied atomically by [`Transaction::commit`].
pub struct Transaction<'a> {
    tree: &'a mut FileTree,
    root: Node,
    inserts: usize,
}

impl<'a> Transaction<'a> {
    /// Number of inserts applied so far.
    pub fn len(&self) -> usize {
        self.inserts
    }

    pub fn is_empty(&self) -> bool {
        self.inserts == 0
    }

    /// Insert or overwrite `key`.
    pub async fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<()> {
        if u32::try_from(value.len()).is_err() {
            return Err(Error::insert(format!(
                "value of {} bytes exceeds the 4 GiB limit",
                value.len()
            )));
        }

        let leaf = Node::Leaf(Leaf::pending(key, value));
        let mut node = std::mem::take(&mut self.root);
        let mut path: Vec<(Internal, bool)> = Vec::new();
        let mut stored: Option<HashRef> = None;
        let mut depth = 0;

        let replacement = loop {
            match node {
                Node::Null => break leaf,
                Node::Hash(r) => match self.tree.resolve(&r).await {
                    Ok(resolved) => {
                        node = resolved;
                        stored = Some(r);
                    }
                    Err(err) => {
                        self.root = rebuild(path, Node::Hash(r));
                        return Err(err);
                    }
                },
                Node::Leaf(existing) => {
                    if existing.key == key {
                        break leaf;
                    }
                    let split = first_difference(&key, &existing.key, depth);
                    let old = match stored.take() {
                        Some(r) => Node::Hash(r),
                        None => Node::Leaf(existing),
                    };
                    let Some(split) = split else {
                        self.root = rebuild(path, old);
                        return Err(Error::insert("leaf placed under a foreign prefix"));
                    };
                    let prefix = Bits::from_key(&key, depth, split);
                    break if key_bit(&key, split) {
                        Node::Internal(Internal::new(prefix, old, leaf))
                    } else {
                        Node::Internal(Internal::new(prefix, leaf, old))
                    };
                }
                Node::Internal(mut internal) => {
                    let n = internal.prefix.len();
                    let common = internal.prefix.common_prefix(&key, depth);
                    if common == n {
                        if depth + n >= KEY_BITS {
                            let restored = match stored.take() {
                                Some(r) => Node::Hash(r),
                                None => Node::Internal(internal),
                            };
                            self.root = rebuild(path, restored);
                            return Err(Error::insert("internal node deeper than the key"));
                        }
                        let bit = key_bit(&key, depth + n);
                        node = internal.take_child(bit);
                        path.push((internal, bit));
                        stored = None;
                        depth += n + 1;
                    } else {
                        // Split the prefix: the shared part moves up, the bit
                        // after it becomes the new branch.
                        let upper = internal.prefix.slice(0, common);
                        internal.prefix = internal.prefix.slice(common + 1, n);
                        let old = Node::Internal(internal);
                        break if key_bit(&key, depth + common) {
                            Node::Internal(Internal::new(upper, old, leaf))
                        } else {
                            Node::Internal(Internal::new(upper, leaf, old))
                        };
                    }
                }
            }
        };

        self.root = rebuild(path, replacement);
        self.inserts += 1;
        Ok(())
    }

    /// Persist every pending write and make the new root current. Returns the
    /// new root hash.
    pub async fn commit(self) -> Result<Hash> {
        let Transaction {
            tree,
            root,
            inserts,
        } = self;

        // Bytes from an earlier failed commit may sit past the remembered end,
        // so pointers are always taken from the files' real lengths.
        let (file, file_len) = FileTree::latest_file(&tree.path)
            .await
            .map_err(|e| Error::commit(e.to_string()))?;
        if (file, file_len) != (tree.file, tree.file_len) {
            warn!(
                "Backing files end at file {} offset {}, expected file {} offset {}",
                file, file_len, tree.file, tree.file_len
            );
            tree.file = file;
            tree.file_len = file_len;
        }

        let mut writer = Writer::new(tree.file, tree.file_len, tree.options.max_file_size);
        let new_root = writer.write_node(root)?;
        writer.flush(&tree.path).await?;
        tree.write_meta(&Meta { root: new_root }).await?;

        tree.root = new_root;
        tree.file = writer.file;
        tree.file_len = writer.file_len;

        info!(
            "Committed {} inserts, root {} (file {} at {})",
            inserts,
            hex::encode(new_root.hash()),
            tree.file,
            tree.file_len
        );
        Ok(new_root.hash())
    }
}

/// Buffers appends per backing file until the commit flushes them.
struct Writer {
    file: u32,
    file_len: u64,
    max_file_size: u64,
    pending: Vec<(u32, Vec<u8>)>,
}

impl Writer {
    fn new(file: u32, file_len: u64, max_file_size: u64) -> Self {
        Self {
            file,
            file_len,
            max_file_size,
            pending: Vec::new(),
        }
    }

    fn append(&mut self, bytes: &[u8]) -> Pointer {
        let len = bytes.len() as u64;
        if self.file_len > 0 && self.file_len + len > self.max_file_size {
            self.file += 1;
            self.file_len = 0;
        }

        let ptr = Pointer::new(self.file, self.file_len, bytes.len() as u32);
        self.file_len += len;

        let file = self.file;
        if let Some((index, buf)) = self.pending.last_mut() {
            if *index == file {
                buf.extend_from_slice(bytes);
                return ptr;
            }
        }
        self.pending.push((file, bytes.to_vec()));
        ptr
    }

    fn write_record(&mut self, record: Record) -> Result<ChildRef> {
        let bytes = record.encode().map_err(|e| Error::commit(e.to_string()))?;
        let hash = record.hash();
        let ptr = self.append(&bytes);
        Ok(ChildRef::Stored { hash, ptr })
    }

    /// Write `node` and everything new beneath it, children first.
    fn write_node(&mut self, node: Node) -> Result<ChildRef> {
        match node {
            Node::Null => Ok(ChildRef::Null),
            Node::Hash(r) => Ok(ChildRef::Stored {
                hash: r.hash,
                ptr: r.ptr,
            }),
            Node::Leaf(leaf) => {
                let (value_hash, value) = match leaf.value {
                    Value::Stored { hash, ptr } => (hash, ptr),
                    Value::Pending(bytes) => (merkle::hash_value(&bytes), self.append(&bytes)),
                };
                self.write_record(Record::Leaf {
                    key: leaf.key,
                    value_hash,
                    value,
                })
            }
            Node::Internal(internal) => {
                let Internal {
                    prefix,
                    left,
                    right,
                } = internal;
                let left = self.write_node(*left)?;
                let right = self.write_node(*right)?;
                self.write_record(Record::Internal {
                    prefix,
                    left,
                    right,
                })
            }
        }
    }

    async fn flush(&mut self, dir: &Path) -> Result<()> {
        for (index, buf) in self.pending.drain(..) {
            let path = dir.join(file_name(index));
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| Error::commit(format!("open {}: {}", path.display(), e)))?;
            file.write_all(&buf)
                .await
                .map_err(|e| Error::commit(format!("append {}: {}", path.display(), e)))?;
            file.sync_all()
                .await
                .map_err(|e| Error::commit(format!("sync {}: {}", path.display(), e)))?;
            debug!("Flushed {} bytes to {}", buf.len(), path.display());
        }
        Ok(())
    }
}
