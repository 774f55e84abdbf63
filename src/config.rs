//! # Configuration Management
//!
//! Settings for the treestat tools, layered lowest to highest:
//! built-in defaults, an optional TOML file, `TREESTAT_*` environment
//! variables. Command line flags are applied on top by the binary.
//!
//! ## Example Configuration File (treestat.toml)
//! ```toml
//! store_path = "./tree"
//! max_file_size = 2097152
//!
//! [generator]
//! items = 100
//! iters = 1000
//! writes = 100
//! seed = 42
//! ```
//!
//! Environment overrides use `__` between sections, e.g.
//! `TREESTAT_GENERATOR__ITEMS=10`.

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::store::{TreeOptions, DEFAULT_MAX_FILE_SIZE};
use crate::workload::wrap_seed;

/// Stress-fill settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of keys in the pool
    pub items: usize,

    /// Number of transactions
    pub iters: usize,

    /// Inserts per transaction
    pub writes: usize,

    /// Fixed seed, signed or unsigned 32-bit; a random one is chosen per run
    /// when absent
    #[serde(default)]
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the tree's backing files
    pub store_path: String,

    /// Size at which a backing file stops taking appends
    pub max_file_size: u64,

    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: "./tree".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            generator: GeneratorConfig {
                items: 100,
                iters: 1000,
                writes: 100,
                seed: None,
            },
        }
    }
}

impl Config {
    /// Load configuration, reading `path` when given.
    ///
    /// A named file must exist; without one only defaults and environment
    /// apply. Only the store settings are checked here, so generator settings
    /// never stop the inspection tools.
    ///
    /// # Arguments
    /// * `path` - Optional TOML file layered over the defaults
    ///
    /// # Returns
    /// * `Result<Config>` - Merged configuration or `Error::Config`
    ///
    /// # Example
    /// ```no_run
    /// use std::path::Path;
    /// use treestat::config::Config;
    /// let config = Config::load(Some(Path::new("treestat.toml")))?;
    /// # Ok::<(), treestat::Error>(())
    /// ```
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::default();
        let mut builder = ConfigLib::builder()
            .set_default("store_path", defaults.store_path)?
            .set_default("max_file_size", defaults.max_file_size as i64)?
            .set_default("generator.items", defaults.generator.items as i64)?
            .set_default("generator.iters", defaults.generator.iters as i64)?
            .set_default("generator.writes", defaults.generator.writes as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("TREESTAT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate_store()?;
        Ok(config)
    }

    /// Check the settings every tool depends on.
    pub fn validate_store(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(Error::config("max_file_size must be positive"));
        }
        Ok(())
    }

    /// Check everything, including the generator settings.
    pub fn validate(&self) -> Result<()> {
        self.validate_store()?;
        if self.generator.items == 0 {
            return Err(Error::config("generator.items must be at least 1"));
        }
        if let Some(seed) = self.generator.seed {
            wrap_seed(seed)?;
        }
        Ok(())
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            max_file_size: self.max_file_size,
        }
    }
}
