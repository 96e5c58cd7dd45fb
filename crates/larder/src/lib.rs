//! Disk-persisted cache with per-entry TTLs and periodic pruning.
//!
//! This crate provides a process-wide cache for expensive lookups with:
//! - Named namespaces so unrelated features share one cache without
//!   colliding
//! - A time-to-live per entry, fixed at write time; expired entries are
//!   never served and are evicted by the read that finds them
//! - A background scheduler that prunes whatever reads never touch and
//!   deregisters namespaces that end up empty
//! - Pluggable persistence, with a file backend as the default
//!
//! The cache is fail-open: storage trouble degrades to cache misses and a
//! log line, never an error at the call site.
//!
//! # Example
//!
//! ```rust,ignore
//! use larder::{CacheConfig, CacheStore, PruneScheduler};
//!
//! let config = CacheConfig::new().with_root("/var/cache/app");
//! let store = CacheStore::new(&config)?;
//! let scheduler = PruneScheduler::start(store.clone(), config.sweep_interval);
//!
//! store.put("resolver", "track:42", bytes, Duration::from_secs(3600)).await;
//! let cached = store.get("resolver", "track:42").await;
//!
//! scheduler.shutdown().await;
//! ```

mod config;
mod entry;
mod error;
mod manifest;
mod persistence;
mod scheduler;
mod store;

pub use config::{CacheConfig, DEFAULT_SWEEP_INTERVAL, MANIFEST_FILE};
pub use entry::{CacheEntry, NamespaceStore};
pub use error::{CacheError, Result};
pub use manifest::Manifest;
pub use persistence::{FileBackend, MemoryBackend, PersistenceBackend};
pub use scheduler::{PruneScheduler, SweepStats};
pub use store::{CacheStore, NamespaceSweep};
