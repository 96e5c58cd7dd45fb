//! Configuration for the cache.

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between prune sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// File name of the namespace manifest, stored directly under the cache root.
pub const MANIFEST_FILE: &str = "cachemanifest";

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory for all persisted cache data.
    /// Default: the platform cache directory, e.g. `~/.cache/larder`
    ///
    /// Can be overridden by the `LARDER_CACHE_PATH` environment variable.
    pub root: Option<PathBuf>,

    /// Interval between prune sweeps when a scheduler is running.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache root directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the interval between prune sweeps.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Get the effective cache root, checking environment variable first.
    ///
    /// Resolution order:
    /// 1. `LARDER_CACHE_PATH` environment variable
    /// 2. Configured `root` value
    /// 3. Default: platform cache directory + `larder`
    pub fn effective_root(&self) -> PathBuf {
        // Check environment variable first
        if let Ok(env_path) = std::env::var("LARDER_CACHE_PATH") {
            return PathBuf::from(env_path);
        }

        // Use configured value or default
        self.root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("larder")
        })
    }
}
