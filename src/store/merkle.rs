use sha2::{Digest, Sha256};

use super::node::{Bits, Hash, Key, ZERO_HASH};

const LEAF_TAG: u8 = 0x00;
const INTERNAL_TAG: u8 = 0x01;

/// Digest of arbitrary bytes. Also used to derive tree keys.
pub fn digest(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

pub fn hash_value(value: &[u8]) -> Hash {
    digest(value)
}

pub fn hash_leaf(key: &Key, value_hash: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_TAG]);
    hasher.update(key);
    hasher.update(value_hash);
    hasher.finalize().into()
}

pub fn hash_internal(prefix: &Bits, left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([INTERNAL_TAG]);
    hasher.update((prefix.len() as u16).to_be_bytes());
    hasher.update(prefix.as_bytes());
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

pub fn hash_null() -> Hash {
    ZERO_HASH
}
