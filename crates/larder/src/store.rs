//! The cache store: namespaced reads and writes with expiry on read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{CacheConfig, MANIFEST_FILE};
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::persistence::{FileBackend, PersistenceBackend};

/// Outcome of pruning one namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceSweep {
    /// Entries dropped because their deadline had passed.
    pub entries_removed: usize,

    /// Whether the namespace ended the prune empty and was deregistered.
    pub namespace_removed: bool,
}

/// Disk-persisted cache of opaque values with per-entry TTLs.
///
/// Values live in named namespaces so unrelated features can share one cache
/// without key collisions. Every read and write goes through the persistence
/// backend, so state is durable across handles and process restarts, and
/// cloned handles observe each other's writes.
///
/// The store is fail-open: once constructed, no operation returns an error.
/// Storage failures are logged and collapse to cache misses.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Arc<dyn PersistenceBackend>,
    manifest: Manifest,

    /// One async mutex per namespace. Operations on the same namespace
    /// serialize; operations on different namespaces never contend.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CacheStore {
    /// Create a file-backed store rooted at the configured cache directory.
    ///
    /// Fails only if the root directory cannot be created.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let root = config.effective_root();
        std::fs::create_dir_all(&root)?;
        Ok(Self::with_backend(Arc::new(FileBackend::new(root))))
    }

    /// Create a store over an arbitrary persistence backend.
    pub fn with_backend(backend: Arc<dyn PersistenceBackend>) -> Self {
        let manifest = Manifest::load(backend.clone());
        Self {
            inner: Arc::new(StoreInner {
                backend,
                manifest,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The namespace registry backing this store.
    pub fn manifest(&self) -> &Manifest {
        &self.inner.manifest
    }

    /// Look up a value.
    ///
    /// Returns `None` for unknown keys and for entries whose deadline has
    /// passed. A stale entry observed here is removed from the persisted
    /// store before returning, so at most one read ever sees it.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        if !valid_namespace(namespace) || key.is_empty() {
            return None;
        }

        let lock = self.namespace_lock(namespace);
        let _guard = lock.lock().await;

        let mut entries = match self.inner.backend.load_namespace(namespace) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Failed to load namespace store, treating as empty");
                return None;
            }
        };

        let entry = entries.remove(key)?;
        if entry.is_expired() {
            // `entries` no longer holds the key; persisting it completes
            // the eviction
            if let Err(e) = self.inner.backend.save_namespace(namespace, &entries) {
                warn!(namespace = %namespace, error = %e, "Failed to persist stale entry eviction");
            }
            debug!(namespace = %namespace, key = %key, "Evicted stale entry on read");
            return None;
        }

        Some(entry.value)
    }

    /// Write a value with a time-to-live.
    ///
    /// Overwrites any previous entry under the key, deadline included, and
    /// registers the namespace in the manifest before returning. Storage
    /// failures are logged and swallowed; a failed write surfaces later as
    /// a miss.
    pub async fn put(&self, namespace: &str, key: &str, value: Vec<u8>, ttl: Duration) {
        if !valid_namespace(namespace) || key.is_empty() {
            warn!(namespace = %namespace, key = %key, "Ignoring cache write with unusable namespace or key");
            return;
        }

        let lock = self.namespace_lock(namespace);
        let _guard = lock.lock().await;

        let mut entries = match self.inner.backend.load_namespace(namespace) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Failed to load namespace store, starting fresh");
                Default::default()
            }
        };

        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        if let Err(e) = self.inner.backend.save_namespace(namespace, &entries) {
            warn!(namespace = %namespace, error = %e, "Failed to persist cache write");
        }

        self.inner.manifest.add(namespace).await;
    }

    /// Remove one entry, persisting the removal. Absent keys are a no-op.
    ///
    /// The namespace stays registered even if this empties it; the next
    /// sweep reclaims empty namespaces.
    pub async fn delete(&self, namespace: &str, key: &str) {
        if !valid_namespace(namespace) || key.is_empty() {
            return;
        }

        let lock = self.namespace_lock(namespace);
        let _guard = lock.lock().await;

        let mut entries = match self.inner.backend.load_namespace(namespace) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Failed to load namespace store, treating as empty");
                return;
            }
        };

        if entries.remove(key).is_some() {
            if let Err(e) = self.inner.backend.save_namespace(namespace, &entries) {
                warn!(namespace = %namespace, error = %e, "Failed to persist entry removal");
            }
            debug!(namespace = %namespace, key = %key, "Removed entry");
        }
    }

    /// Drop every expired entry in a namespace. A namespace that ends the
    /// prune with no entries is deregistered and its backing store removed.
    ///
    /// The namespace lock is held from the load through the manifest update,
    /// so a concurrent `put` either lands before the prune reads the store
    /// or waits and re-registers the namespace afterwards. Either way its
    /// entry survives.
    pub async fn prune_namespace(&self, namespace: &str) -> NamespaceSweep {
        let mut outcome = NamespaceSweep::default();
        if !valid_namespace(namespace) {
            return outcome;
        }

        let lock = self.namespace_lock(namespace);
        let _guard = lock.lock().await;

        let mut entries = match self.inner.backend.load_namespace(namespace) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Failed to load namespace store, treating as empty");
                Default::default()
            }
        };

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        outcome.entries_removed = before - entries.len();

        if entries.is_empty() {
            if let Err(e) = self.inner.backend.remove_namespace(namespace) {
                warn!(namespace = %namespace, error = %e, "Failed to remove empty namespace store");
            }
            self.inner.manifest.remove(namespace).await;
            outcome.namespace_removed = true;
        } else if outcome.entries_removed > 0 {
            if let Err(e) = self.inner.backend.save_namespace(namespace, &entries) {
                warn!(namespace = %namespace, error = %e, "Failed to persist pruned namespace store");
            }
        }

        if outcome.entries_removed > 0 {
            debug!(
                namespace = %namespace,
                removed = outcome.entries_removed,
                "Pruned stale entries"
            );
        }

        outcome
    }

    fn namespace_lock(&self, namespace: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.locks.lock();
        locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Namespaces double as storage file names. Reject anything that could
/// escape the cache root, collide with the manifest file, or shadow backend
/// bookkeeping (leading dot).
fn valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace != MANIFEST_FILE
        && !namespace.starts_with('.')
        && !namespace.contains('/')
        && !namespace.contains('\\')
}
