//! # treestat
//!
//! Deterministic stress-filling and storage usage auditing for a persisted
//! Merkle radix tree.
//!
//! - **`rng`**: seeded byte generator that reproduces the same stream forever
//! - **`workload`**: keys, values and key-pool selection built on that stream
//! - **`store`**: the tree contract and its file-backed engine
//! - **`walk`** / **`usage`**: explicit-stack traversal and the three-way
//!   (total / per-depth / per-file) storage aggregates
//! - **`report`** / **`dump`**: text output for the inspection tools

pub mod config;
pub mod dump;
pub mod error;
pub mod report;
pub mod rng;
pub mod store;
pub mod usage;
pub mod walk;
pub mod workload;

pub use error::{Error, Result};
pub use rng::ByteGenerator;
pub use store::{FileTree, TreeOptions, TreeStore};
pub use usage::{audit, Auditor, TotalStats, TreeUsage};
pub use workload::{generate, wrap_seed, GenerateParams, GenerateSummary, KeyPool, Workload};
