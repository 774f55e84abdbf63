//! Line-per-node listing of a tree, indented two spaces per physical depth.

use std::io::Write;

use crate::error::Result;
use crate::store::node::{Node, Pointer};
use crate::store::TreeStore;
use crate::walk::{Visit, Walker};

fn format_origin(origin: Option<&Pointer>) -> String {
    origin.map(|ptr| format!("@{}", ptr)).unwrap_or_default()
}

/// Writes one line per visited node to `out`.
pub struct Dump<W: Write> {
    out: W,
    error: Option<std::io::Error>,
}

impl<W: Write> Dump<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(node: &Node, origin: Option<&Pointer>) -> String {
        let origin = format_origin(origin);
        match node {
            Node::Null => format!("NULL{}", origin),
            Node::Internal(internal) => format!("Internal: :{}{}", internal.prefix, origin),
            Node::Leaf(leaf) => {
                let value = format_origin(leaf.value_ptr());
                format!("Leaf: {} -> value{}{}", hex::encode(leaf.key), value, origin)
            }
            Node::Hash(r) => format!("Hash: {}{}", hex::encode(r.hash), origin),
        }
    }
}

impl<W: Write> Visit for Dump<W> {
    fn visit(&mut self, node: &Node, depth: u32, origin: Option<&Pointer>) {
        if self.error.is_some() {
            return;
        }
        let indent = "  ".repeat(depth as usize);
        if let Err(e) = writeln!(self.out, "{}{}", indent, Self::line(node, origin)) {
            self.error = Some(e);
        }
    }

    fn is_done(&self) -> bool {
        self.error.is_some()
    }
}

/// Walk `store` and print every node to `out`.
pub async fn dump<S, W>(store: &S, out: W) -> Result<W>
where
    S: TreeStore + ?Sized,
    W: Write,
{
    let mut dump = Dump::new(out);
    Walker::new().walk(store, &mut dump).await?;
    if let Some(e) = dump.error.take() {
        return Err(e.into());
    }
    Ok(dump.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::node::{Bits, Internal, Leaf, Value};
    use crate::error::Error;
    use crate::store::testing::MemStore;
    use crate::store::HashRef;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dump_lines() {
        let mut store = MemStore::new();
        let leaf = Node::Leaf(Leaf {
            key: [0xab; 32],
            value: Value::Stored {
                hash: [0u8; 32],
                ptr: Pointer::new(2, 8, 3),
            },
        });
        let left = store.stored(Pointer::new(1, 0, 84), leaf);
        let prefix = Bits::from_key(&[0b1010_0000; 32], 0, 3);
        let root = Node::Internal(Internal::new(prefix, left, Node::Null));
        store.root = store.stored(Pointer::new(1, 84, 120), root);

        let out = dump(&store, Vec::new()).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Internal: :101@file-1:84(120)");
        assert_eq!(lines[1], "        NULL");
        assert_eq!(
            lines[2],
            format!(
                "        Leaf: {} -> value@file-2:8(3)@file-1:0(84)",
                "ab".repeat(32)
            )
        );
    }

    #[tokio::test]
    async fn test_write_error_stops_before_resolving_more() {
        let mut store = MemStore::new();
        // Children point nowhere; resolving either would fail the walk
        let dangling = |file| {
            Node::Hash(HashRef {
                hash: [0u8; 32],
                ptr: Pointer::new(file, 0, 1),
            })
        };
        let root = Node::Internal(Internal::new(Bits::new(), dangling(8), dangling(9)));
        store.root = store.stored(Pointer::new(1, 0, 40), root);

        let err = dump(&store, BrokenPipe).await.err().unwrap();
        assert!(matches!(err, Error::Io { .. }), "{err}");
    }
}
