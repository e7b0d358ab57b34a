//! Session configuration
//!
//! [`SessionConfig`] controls batching, device selection, precision policy,
//! and plan caching. Its deterministic serialized form participates verbatim
//! in the plan fingerprint, so any config change invalidates cached plans.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for an inference session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Batch size used at execution time
    pub batch_size: usize,

    /// Batch-size ceiling applied when building the plan
    pub max_batch_size: usize,

    /// Target device index
    pub device_id: usize,

    /// Record per-phase timings during build and run
    pub enable_profiler: bool,

    /// Allow reduced precision when the device supports it
    pub allow_reduced_precision: bool,

    /// Require reduced precision; build fails if unsupported
    pub force_reduced_precision: bool,

    /// Persist compiled plans keyed by fingerprint
    pub enable_plan_caching: bool,

    /// Directory holding cached plan files
    pub plan_cache_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            batch_size: 1,
            max_batch_size: 1,
            device_id: 0,
            enable_profiler: false,
            allow_reduced_precision: false,
            force_reduced_precision: false,
            enable_plan_caching: false,
            plan_cache_dir: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the build-time batch ceiling
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the target device index
    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    /// Enable per-phase profiling
    pub fn with_profiler(mut self, enable: bool) -> Self {
        self.enable_profiler = enable;
        self
    }

    /// Allow reduced precision opportunistically
    pub fn with_allow_reduced_precision(mut self, allow: bool) -> Self {
        self.allow_reduced_precision = allow;
        self
    }

    /// Require reduced precision
    pub fn with_force_reduced_precision(mut self, force: bool) -> Self {
        self.force_reduced_precision = force;
        self
    }

    /// Enable plan caching into `dir`
    pub fn with_plan_caching(mut self, dir: impl Into<PathBuf>) -> Self {
        self.enable_plan_caching = true;
        self.plan_cache_dir = dir.into();
        self
    }

    /// Deterministic serialized form used verbatim in fingerprinting.
    ///
    /// serde_json emits struct fields in declaration order, so two configs
    /// with equal fields always produce identical strings.
    pub fn raw_config(&self) -> String {
        serde_json::to_string(self).expect("config serialization cannot fail")
    }
}
