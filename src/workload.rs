//! # Workload Synthesizer
//!
//! Turns the deterministic byte stream into tree writes. Keys are digests of
//! random-length byte strings, values are random-length byte strings, and
//! every write picks its key from a fixed pool so the same keys are
//! overwritten again and again.
//!
//! All draws come from one [`ByteGenerator`], in a fixed order: the pool is
//! built first, then each write draws one byte for the pool index followed by
//! its value. A seed therefore pins down the whole run.

use log::{debug, info, warn};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::rng::ByteGenerator;
use crate::store::merkle;
use crate::store::node::Key;
use crate::store::FileTree;

/// Source of keys and values for one run.
#[derive(Debug, Clone)]
pub struct Workload {
    rng: ByteGenerator,
}

impl Workload {
    pub fn new(seed: i32) -> Self {
        Self {
            rng: ByteGenerator::new(seed),
        }
    }

    pub fn next_byte(&mut self) -> u8 {
        self.rng.next_byte()
    }

    /// Exactly `n` drawn bytes.
    pub fn random_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.rng.fill(&mut buf);
        buf
    }

    /// One byte picks the length (0-255), then that many bytes follow.
    pub fn random_length_bytes(&mut self) -> Vec<u8> {
        let n = self.next_byte() as usize;
        self.random_bytes(n)
    }

    pub fn random_key(&mut self) -> Key {
        merkle::digest(&self.random_length_bytes())
    }

    pub fn random_value(&mut self) -> Vec<u8> {
        self.random_length_bytes()
    }
}

/// Keys generated once up front and reused by every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPool {
    keys: Vec<Key>,
}

impl KeyPool {
    pub fn generate(workload: &mut Workload, n: usize) -> Self {
        if n > 256 {
            warn!(
                "Key pool of {} keys: picks use one byte, only the first 256 are reachable",
                n
            );
        }
        let keys = (0..n).map(|_| workload.random_key()).collect();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Index of the next pick: one drawn byte reduced modulo the pool size.
    pub fn pick_index(&self, workload: &mut Workload) -> usize {
        workload.next_byte() as usize % self.keys.len()
    }

    pub fn pick(&self, workload: &mut Workload) -> Key {
        self.keys[self.pick_index(workload)]
    }
}

/// Fold a seed written as either a signed or an unsigned 32-bit integer into
/// the generator's signed state. `3000000000` and `-1294967296` select the
/// same stream.
pub fn wrap_seed(seed: i64) -> Result<i32> {
    if seed < i32::MIN as i64 || seed > u32::MAX as i64 {
        return Err(Error::config(format!(
            "seed {} does not fit in 32 bits",
            seed
        )));
    }
    Ok(seed as i32)
}

/// Parameters of a stress fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateParams {
    pub seed: i32,
    /// Size of the key pool.
    pub items: usize,
    /// Number of transactions.
    pub iters: usize,
    /// Inserts per transaction.
    pub writes: usize,
}

impl GenerateParams {
    pub fn validate(&self) -> Result<()> {
        if self.items == 0 {
            return Err(Error::config("items must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub commits: usize,
    pub writes: usize,
    /// Distinct keys that received at least one write.
    pub distinct_keys: usize,
}

/// Stress-fill `tree`: `iters` transactions of `writes` inserts each.
///
/// Any engine error aborts the run; the transaction in flight is dropped
/// and never becomes visible.
pub async fn generate(tree: &mut FileTree, params: &GenerateParams) -> Result<GenerateSummary> {
    params.validate()?;

    let mut workload = Workload::new(params.seed);
    println!("Seed: {}", params.seed);
    println!("Total: {}", params.items);
    println!("Iterations: {}", params.iters);
    println!("Writes Per Iteration: {}", params.writes);

    println!("Generating items {}...", params.items);
    let pool = KeyPool::generate(&mut workload, params.items);

    let mut summary = GenerateSummary::default();
    let mut written: HashSet<Key> = HashSet::new();

    for i in 0..params.iters {
        println!("Iteration {}...", i);
        let mut txn = tree.transaction();

        for _ in 0..params.writes {
            let key = pool.pick(&mut workload);
            let value = workload.random_value();
            txn.insert(key, value).await?;
            written.insert(key);
            summary.writes += 1;
        }

        let root = txn.commit().await?;
        summary.commits += 1;
        debug!("Iteration {} committed root {}", i, hex::encode(root));
    }

    summary.distinct_keys = written.len();
    info!(
        "Generated {} writes over {} commits ({} distinct keys)",
        summary.writes, summary.commits, summary.distinct_keys
    );
    Ok(summary)
}
