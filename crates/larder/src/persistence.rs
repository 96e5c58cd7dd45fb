//! Persistence backends for cache storage.
//!
//! This module defines the trait that decouples the cache from specific
//! storage. The cache reads and writes whole namespace stores and the
//! manifest as units; backends decide how those units live on disk (or
//! don't, for [`MemoryBackend`]).

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MANIFEST_FILE;
use crate::entry::{CacheEntry, NamespaceStore};
use crate::error::Result;

/// Trait for persistence backends.
///
/// Implement this trait to keep cache contents somewhere other than the
/// default file layout. Methods are synchronous; stores are expected to be
/// small enough that a blocking load or save per call is acceptable.
pub trait PersistenceBackend: Send + Sync {
    /// Load all entries of a namespace.
    ///
    /// A namespace with no persisted data yields an empty store, not an
    /// error. Errors mean the data exists but could not be read.
    fn load_namespace(&self, namespace: &str) -> Result<NamespaceStore>;

    /// Persist all entries of a namespace, replacing whatever was stored.
    fn save_namespace(&self, namespace: &str, entries: &NamespaceStore) -> Result<()>;

    /// Drop all persisted data of a namespace. Absent namespaces are a no-op.
    fn remove_namespace(&self, namespace: &str) -> Result<()>;

    /// Load the namespace manifest. A missing manifest yields an empty list.
    fn load_manifest(&self) -> Result<Vec<String>>;

    /// Persist the namespace manifest, replacing whatever was stored.
    fn save_manifest(&self, namespaces: &[String]) -> Result<()>;
}

/// Staging directory for atomic rewrites, kept under the cache root so the
/// final rename never crosses a filesystem boundary.
const TMP_DIR: &str = ".tmp";

/// On-disk form of one cache entry. One JSON record per line.
#[derive(Serialize, Deserialize)]
struct EntryRecord {
    key: String,
    expires_at: DateTime<Utc>,
    value: String,
}

/// File-backed persistence.
///
/// Layout: one JSONL file per namespace at `{root}/{namespace}` and the
/// manifest as a JSON array at `{root}/cachemanifest`. Every write goes
/// through a temp file and a rename, so a crash mid-write leaves the old
/// contents intact rather than a truncated file.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this backend stores under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()> {
        let tmp_dir = self.root.join(TMP_DIR);
        fs::create_dir_all(&tmp_dir)?;

        let tmp_path = tmp_dir.join(name);
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        // Ensure data is persisted to disk before the rename makes it visible
        file.sync_all()?;

        fs::rename(&tmp_path, self.root.join(name))?;
        Ok(())
    }
}

impl PersistenceBackend for FileBackend {
    fn load_namespace(&self, namespace: &str) -> Result<NamespaceStore> {
        let path = self.namespace_path(namespace);
        if !path.exists() {
            return Ok(NamespaceStore::new());
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut entries = NamespaceStore::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: EntryRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "Skipping unreadable cache record");
                    continue;
                }
            };
            let value = match STANDARD.decode(&record.value) {
                Ok(value) => value,
                Err(e) => {
                    warn!(namespace = %namespace, key = %record.key, error = %e, "Skipping undecodable cache value");
                    continue;
                }
            };
            entries.insert(
                record.key,
                CacheEntry {
                    value,
                    expires_at: record.expires_at,
                },
            );
        }

        Ok(entries)
    }

    fn save_namespace(&self, namespace: &str, entries: &NamespaceStore) -> Result<()> {
        let mut data = String::new();
        for (key, entry) in entries {
            let record = EntryRecord {
                key: key.clone(),
                expires_at: entry.expires_at,
                value: STANDARD.encode(&entry.value),
            };
            data.push_str(&serde_json::to_string(&record)?);
            data.push('\n');
        }
        self.write_atomic(namespace, data.as_bytes())
    }

    fn remove_namespace(&self, namespace: &str) -> Result<()> {
        let path = self.namespace_path(namespace);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn load_manifest(&self) -> Result<Vec<String>> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save_manifest(&self, namespaces: &[String]) -> Result<()> {
        let data = serde_json::to_vec(namespaces)?;
        self.write_atomic(MANIFEST_FILE, &data)
    }
}

/// In-memory persistence for tests and throwaway caches. Nothing survives
/// the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: Mutex<HashMap<String, NamespaceStore>>,
    manifest: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn load_namespace(&self, namespace: &str) -> Result<NamespaceStore> {
        Ok(self
            .namespaces
            .lock()
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    fn save_namespace(&self, namespace: &str, entries: &NamespaceStore) -> Result<()> {
        self.namespaces
            .lock()
            .insert(namespace.to_string(), entries.clone());
        Ok(())
    }

    fn remove_namespace(&self, namespace: &str) -> Result<()> {
        self.namespaces.lock().remove(namespace);
        Ok(())
    }

    fn load_manifest(&self) -> Result<Vec<String>> {
        Ok(self.manifest.lock().clone())
    }

    fn save_manifest(&self, namespaces: &[String]) -> Result<()> {
        *self.manifest.lock() = namespaces.to_vec();
        Ok(())
    }
}
