//! On-disk shard storage with hashed directory fan-out.
//!
//! Shards live at `<cache>/index/<h[0..2]>/<h[2..4]>/<h>.shard` where `h`
//! is the SHA256 of the URI, a 256x256 fan-out that keeps directory sizes
//! reasonable on very large workspaces. Writes go to a temp file and are
//! renamed into place so no reader ever sees a partial shard. All access
//! for one URI is serialized through a reference-counted per-URI lock.

use crate::error::{IndexError, IndexResult};
use crate::utils::calculate_hash;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ShardStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl ShardStore {
    /// `root` is the `index/` directory under the cache dir.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn shard_path(&self, uri: &str) -> PathBuf {
        let hash = calculate_hash(uri);
        self.root
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(format!("{hash}.shard"))
    }

    /// Per-URI lock, created on demand and dropped once no holder remains.
    fn uri_lock(&self, uri: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(uri.to_string()).or_default().clone()
    }

    /// Write a shard atomically. A transient write failure is retried once;
    /// persistent failure surfaces to the caller, whose in-memory state
    /// stays correct.
    pub fn save(&self, uri: &str, bytes: &[u8]) -> IndexResult<()> {
        let lock = self.uri_lock(uri);
        let _guard = lock.write();

        match self.write_atomic(uri, bytes) {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!("[shard-store] retrying write for '{uri}': {first}");
                self.write_atomic(uri, bytes)
            }
        }
    }

    fn write_atomic(&self, uri: &str, bytes: &[u8]) -> IndexResult<()> {
        let path = self.shard_path(uri);
        let parent = path.parent().expect("shard path has fan-out parents");
        fs::create_dir_all(parent).map_err(|e| IndexError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;

        let temp = path.with_extension("shard.tmp");
        fs::write(&temp, bytes).map_err(|e| IndexError::FileWrite {
            path: temp.clone(),
            source: e,
        })?;
        fs::rename(&temp, &path).map_err(|e| IndexError::FileWrite { path, source: e })
    }

    /// Read a shard's bytes. Absent shards return None.
    pub fn load(&self, uri: &str) -> IndexResult<Option<Vec<u8>>> {
        let lock = self.uri_lock(uri);
        let _guard = lock.read();

        let path = self.shard_path(uri);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::FileRead { path, source: e }),
        }
    }

    pub fn delete(&self, uri: &str) -> IndexResult<()> {
        let lock = self.uri_lock(uri);
        let _guard = lock.write();

        let path = self.shard_path(uri);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IndexError::FileWrite { path, source: e }),
        }
    }

    pub fn exists(&self, uri: &str) -> bool {
        self.shard_path(uri).exists()
    }

    /// Drop every shard on disk.
    pub fn clear(&self) -> IndexResult<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| IndexError::FileWrite {
                path: self.root.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// All shard files currently on disk, keyed by URI hash. Used on
    /// startup to reconcile disk state with the metadata table.
    pub fn list(&self) -> Vec<(String, PathBuf)> {
        let mut found = Vec::new();
        let Ok(level1) = fs::read_dir(&self.root) else {
            return found;
        };
        for l1 in level1.filter_map(Result::ok) {
            let Ok(level2) = fs::read_dir(l1.path()) else {
                continue;
            };
            for l2 in level2.filter_map(Result::ok) {
                let Ok(entries) = fs::read_dir(l2.path()) else {
                    continue;
                };
                for entry in entries.filter_map(Result::ok) {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("shard")
                        && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                    {
                        found.push((stem.to_string(), path));
                    }
                }
            }
        }
        found
    }

    /// Total bytes of shard data, for the soft cache-size check.
    pub fn total_size_bytes(&self) -> u64 {
        self.list()
            .iter()
            .filter_map(|(_, path)| fs::metadata(path).ok())
            .map(|m| m.len())
            .sum()
    }
}

/// Remove shard files that no metadata entry claims (stale leftovers from
/// crashes or older runs).
pub fn remove_unclaimed(store: &ShardStore, claimed_uris: impl Iterator<Item = impl AsRef<str>>) {
    let claimed: std::collections::HashSet<String> = claimed_uris
        .map(|uri| calculate_hash(uri.as_ref()))
        .collect();
    for (hash, path) in store.list() {
        if !claimed.contains(&hash) {
            tracing::debug!("[shard-store] removing stale shard {}", path.display());
            let _ = fs::remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ShardStore {
        ShardStore::new(dir.path().join("index"))
    }

    #[test]
    fn test_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save("/w/a.ts", b"payload").unwrap();
        assert!(store.exists("/w/a.ts"));
        assert_eq!(store.load("/w/a.ts").unwrap().unwrap(), b"payload");

        store.delete("/w/a.ts").unwrap();
        assert!(!store.exists("/w/a.ts"));
        assert!(store.load("/w/a.ts").unwrap().is_none());
        // Deleting again is fine
        store.delete("/w/a.ts").unwrap();
    }

    #[test]
    fn test_fan_out_layout() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save("/w/a.ts", b"x").unwrap();

        let hash = calculate_hash("/w/a.ts");
        let expected = dir
            .path()
            .join("index")
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(format!("{hash}.shard"));
        assert!(expected.exists());
    }

    #[test]
    fn test_list_and_reconcile() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save("/w/a.ts", b"a").unwrap();
        store.save("/w/b.ts", b"b").unwrap();
        assert_eq!(store.list().len(), 2);

        // Only /w/a.ts is claimed; the other shard is stale
        remove_unclaimed(&store, ["/w/a.ts"].iter());
        assert_eq!(store.list().len(), 1);
        assert!(store.exists("/w/a.ts"));
        assert!(!store.exists("/w/b.ts"));
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save("/w/a.ts", b"a").unwrap();
        store.clear().unwrap();
        assert!(store.list().is_empty());
        assert!(store.load("/w/a.ts").unwrap().is_none());
    }

    #[test]
    fn test_no_partial_reads_after_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save("/w/a.ts", b"first").unwrap();
        store.save("/w/a.ts", b"second-version").unwrap();
        assert_eq!(store.load("/w/a.ts").unwrap().unwrap(), b"second-version");
    }
}
