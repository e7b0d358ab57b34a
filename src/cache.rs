//! Disk-backed plan cache
//!
//! One file per fingerprint at `{dir}/{key}.plan`, binary content being the
//! serialized compiled plan. Stores write through a temporary file and
//! rename, so a reader never observes a partially written plan even when
//! another session overwrites the same key. No cross-process locking beyond
//! that; the key is content-derived, so concurrent writers produce identical
//! bytes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::PlanResult;

/// Extension of persisted plan files
pub const PLAN_FILE_EXT: &str = "plan";

/// Cache of serialized plans keyed by fingerprint
#[derive(Debug, Clone)]
pub struct PlanCache {
    dir: PathBuf,
}

impl PlanCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a given fingerprint maps to
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, PLAN_FILE_EXT))
    }

    /// Persist a serialized plan, overwriting any existing file for the key.
    /// Returns the final path.
    pub fn store(&self, key: &str, bytes: &[u8]) -> PlanResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.{}.tmp", key, PLAN_FILE_EXT));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        info!(key, bytes = bytes.len(), path = %path.display(), "stored plan");
        Ok(path)
    }

    /// Load the serialized plan for a fingerprint, if one was persisted
    pub fn load(&self, key: &str) -> PlanResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(key, "plan cache miss");
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        info!(key, bytes = bytes.len(), "plan cache hit");
        Ok(Some(bytes))
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
