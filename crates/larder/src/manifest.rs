//! Durable registry of cache namespaces.
//!
//! The manifest records which namespaces hold persisted entries, so a prune
//! sweep knows where to look without scanning the storage layout. It is the
//! only index the cache keeps; namespace stores themselves are opaque to it.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::persistence::PersistenceBackend;

/// Registry of namespace identifiers, persisted through the backend on every
/// mutation.
///
/// `add` and `remove` are idempotent. `list` returns a point-in-time
/// snapshot; namespaces registered or deregistered afterwards do not show up
/// in an already-returned snapshot.
pub struct Manifest {
    backend: Arc<dyn PersistenceBackend>,
    namespaces: RwLock<HashSet<String>>,
}

impl Manifest {
    /// Load the manifest from the backend. A missing or unreadable manifest
    /// starts empty; the sweep re-learns namespaces as writes register them.
    pub fn load(backend: Arc<dyn PersistenceBackend>) -> Self {
        let namespaces = match backend.load_manifest() {
            Ok(list) => list.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load cache manifest, starting empty");
                HashSet::new()
            }
        };

        Self {
            backend,
            namespaces: RwLock::new(namespaces),
        }
    }

    /// Register a namespace. Registering one that is already present leaves
    /// the manifest unchanged.
    pub async fn add(&self, namespace: &str) {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.insert(namespace.to_string()) {
            debug!(namespace = %namespace, "Registered cache namespace");
            self.persist(&namespaces);
        }
    }

    /// Deregister a namespace. Removing an absent one leaves the manifest
    /// unchanged.
    pub async fn remove(&self, namespace: &str) {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.remove(namespace) {
            debug!(namespace = %namespace, "Deregistered cache namespace");
            self.persist(&namespaces);
        }
    }

    /// Check if a namespace is currently registered.
    pub async fn contains(&self, namespace: &str) -> bool {
        self.namespaces.read().await.contains(namespace)
    }

    /// Snapshot of all registered namespaces, in no particular order.
    pub async fn list(&self) -> Vec<String> {
        self.namespaces.read().await.iter().cloned().collect()
    }

    /// Number of registered namespaces.
    pub async fn len(&self) -> usize {
        self.namespaces.read().await.len()
    }

    /// Check if no namespaces are registered.
    pub async fn is_empty(&self) -> bool {
        self.namespaces.read().await.is_empty()
    }

    fn persist(&self, namespaces: &HashSet<String>) {
        let list: Vec<String> = namespaces.iter().cloned().collect();
        if let Err(e) = self.backend.save_manifest(&list) {
            warn!(error = %e, "Failed to persist cache manifest");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, Result};
    use crate::persistence::MemoryBackend;

    /// Backend whose manifest operations always fail.
    struct BrokenBackend;

    impl PersistenceBackend for BrokenBackend {
        fn load_namespace(&self, _namespace: &str) -> Result<crate::NamespaceStore> {
            Err(unavailable())
        }
        fn save_namespace(
            &self,
            _namespace: &str,
            _entries: &crate::NamespaceStore,
        ) -> Result<()> {
            Err(unavailable())
        }
        fn remove_namespace(&self, _namespace: &str) -> Result<()> {
            Err(unavailable())
        }
        fn load_manifest(&self) -> Result<Vec<String>> {
            Err(unavailable())
        }
        fn save_manifest(&self, _namespaces: &[String]) -> Result<()> {
            Err(unavailable())
        }
    }

    fn unavailable() -> CacheError {
        CacheError::Io(std::io::Error::other("storage unavailable"))
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let manifest = Manifest::load(Arc::new(MemoryBackend::new()));

        manifest.add("resolver").await;
        manifest.add("resolver").await;

        assert_eq!(manifest.len().await, 1);
        assert!(manifest.contains("resolver").await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let manifest = Manifest::load(Arc::new(MemoryBackend::new()));

        manifest.add("resolver").await;
        manifest.remove("resolver").await;
        manifest.remove("resolver").await;

        assert!(manifest.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_is_a_snapshot() {
        let manifest = Manifest::load(Arc::new(MemoryBackend::new()));

        manifest.add("resolver").await;
        let snapshot = manifest.list().await;

        manifest.add("artwork").await;

        assert_eq!(snapshot, vec!["resolver".to_string()]);
        assert_eq!(manifest.len().await, 2);
    }

    #[tokio::test]
    async fn test_mutations_persist_through_backend() {
        let backend = Arc::new(MemoryBackend::new());

        let manifest = Manifest::load(backend.clone());
        manifest.add("resolver").await;
        manifest.add("artwork").await;
        manifest.remove("artwork").await;

        // A fresh manifest over the same backend sees the surviving entries
        let reloaded = Manifest::load(backend);
        assert!(reloaded.contains("resolver").await);
        assert!(!reloaded.contains("artwork").await);
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_unreadable_manifest_starts_empty() {
        let manifest = Manifest::load(Arc::new(BrokenBackend));
        assert!(manifest.is_empty().await);

        // Mutations still work in memory even when persistence fails
        manifest.add("resolver").await;
        assert!(manifest.contains("resolver").await);
    }
}
