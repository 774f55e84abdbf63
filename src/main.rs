//! # treestat
//!
//! Command line front end:
//!
//! - `treestat generate [PATH] [--seed=N] [--items=N] [--iters=N] [--writes=N]`
//!   stress-fills the tree at PATH with a reproducible workload
//! - `treestat usage [PATH] [--json]` reports storage usage per depth, per
//!   backing file and in total
//! - `treestat dump [PATH]` prints every node
//!
//! PATH defaults to `./tree`. Logging goes to stderr and is controlled with
//! `RUST_LOG`, e.g. `RUST_LOG=debug treestat usage`.
//!
//! # Configuration Priority
//! 1. Command line arguments (highest priority)
//! 2. `TREESTAT_*` environment variables
//! 3. Configuration file (`--config <path>`)
//! 4. Default values (lowest priority)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::io::Write;
use std::path::PathBuf;

use treestat::config::Config;
use treestat::{audit, dump, generate, wrap_seed, FileTree, GenerateParams};

#[derive(Debug, Parser)]
#[command(name = "treestat", version, about = "Stress-fill and audit a persisted Merkle tree")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backing file size limit in bytes
    #[arg(long, global = true)]
    max_file_size: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fill the tree with deterministic pseudorandom writes
    Generate {
        /// Store directory
        path: Option<PathBuf>,

        /// Generator seed, signed or unsigned 32-bit (random when omitted)
        #[arg(long, allow_hyphen_values = true)]
        seed: Option<i64>,

        /// Number of distinct keys in the pool
        #[arg(long)]
        items: Option<usize>,

        /// Number of committed transactions
        #[arg(long)]
        iters: Option<usize>,

        /// Inserts per transaction
        #[arg(long)]
        writes: Option<usize>,
    },

    /// Report storage usage per depth, per file and in total
    Usage {
        /// Store directory
        path: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every node of the tree
    Dump {
        /// Store directory
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(size) = cli.max_file_size {
        config.max_file_size = size;
    }

    // Traversal resolves one node at a time, so a single thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli.command, config))
}

async fn run(command: Command, mut config: Config) -> Result<()> {
    match command {
        Command::Generate {
            path,
            seed,
            items,
            iters,
            writes,
        } => {
            let generator = &mut config.generator;
            if seed.is_some() {
                generator.seed = seed;
            }
            if let Some(items) = items {
                generator.items = items;
            }
            if let Some(iters) = iters {
                generator.iters = iters;
            }
            if let Some(writes) = writes {
                generator.writes = writes;
            }
            config.validate()?;

            let seed = match config.generator.seed {
                Some(seed) => wrap_seed(seed)?,
                None => rand::random(),
            };
            let params = GenerateParams {
                seed,
                items: config.generator.items,
                iters: config.generator.iters,
                writes: config.generator.writes,
            };

            let path = path.unwrap_or_else(|| PathBuf::from(&config.store_path));
            let mut tree = FileTree::open(&path, config.tree_options())
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            let summary = generate(&mut tree, &params).await?;
            tree.close().await?;

            info!(
                "{} writes, {} distinct keys, seed {}",
                summary.writes, summary.distinct_keys, params.seed
            );
        }

        Command::Usage { path, json } => {
            config.validate_store()?;
            let path = path.unwrap_or_else(|| PathBuf::from(&config.store_path));
            let tree = FileTree::open_existing(&path, config.tree_options()).await?;
            let usage = audit(&tree).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&usage)?);
            } else {
                println!("{}", usage);
            }
            tree.close().await?;
        }

        Command::Dump { path } => {
            config.validate_store()?;
            let path = path.unwrap_or_else(|| PathBuf::from(&config.store_path));
            let tree = FileTree::open_existing(&path, config.tree_options()).await?;

            let stdout = std::io::stdout();
            let out = std::io::BufWriter::new(stdout.lock());
            let mut out = dump::dump(&tree, out).await?;
            out.flush()?;
            tree.close().await?;
        }
    }

    Ok(())
}
