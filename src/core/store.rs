//! Store abstraction for Mnemo's state management.

use crate::core::config::StoreConfig;
use crate::core::db;
use crate::core::error;
use std::path::{Path, PathBuf};

/// Handle to a Mnemo store: the root directory holding `memory.db`, the
/// broker audit log, and the optional `mnemo.toml`.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
    /// Loaded configuration (defaults when no `mnemo.toml` is present).
    pub config: StoreConfig,
}

impl Store {
    /// Open a store rooted at `root`, creating the database and schema on
    /// first use.
    pub fn open(root: &Path) -> Result<Self, error::MnemoError> {
        let config = StoreConfig::load(root)?;
        db::initialize_memory_db(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        db::memory_db_path(&self.root)
    }
}
