//! Metadata file persistence.
//!
//! One JSON file under the cache dir mirrors the resident bookkeeping: the
//! shard table, the folder-digest table, and the shard format version.
//! Rewritten atomically (write temp + rename), loaded on startup and
//! reconciled against the shards actually on disk.

use crate::error::{IndexError, IndexResult};
use crate::scanner::folder_hash::DigestTable;
use crate::storage::shard::SHARD_VERSION;
use crate::symbol::ShardMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFile {
    pub shard_version: u32,
    pub shards: BTreeMap<String, ShardMetadata>,
    pub folder_digests: DigestTable,
}

impl Default for MetadataFile {
    fn default() -> Self {
        Self {
            shard_version: SHARD_VERSION,
            shards: BTreeMap::new(),
            folder_digests: DigestTable::new(),
        }
    }
}

impl MetadataFile {
    /// Load from `<cache>/metadata.json`. A missing file yields None; a
    /// corrupt file is treated the same way and the index rebuilds.
    pub fn load(cache_dir: &Path) -> IndexResult<Option<Self>> {
        let path = cache_dir.join(METADATA_FILE_NAME);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::FileRead { path, source: e }),
        };
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(loaded) => Ok(Some(loaded)),
            Err(e) => {
                tracing::warn!("[metadata] corrupt metadata file, forcing rebuild: {e}");
                Ok(None)
            }
        }
    }

    pub fn save(&self, cache_dir: &Path) -> IndexResult<()> {
        fs::create_dir_all(cache_dir).map_err(|e| IndexError::FileWrite {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        let path = cache_dir.join(METADATA_FILE_NAME);
        let bytes = serde_json::to_vec(self)
            .map_err(|e| IndexError::General(format!("metadata encode failed: {e}")))?;

        let temp = path.with_extension("json.tmp");
        fs::write(&temp, bytes).map_err(|e| IndexError::FileWrite {
            path: temp.clone(),
            source: e,
        })?;
        fs::rename(&temp, &path).map_err(|e| IndexError::FileWrite { path, source: e })
    }

    /// True when the persisted format differs from what this build writes;
    /// the caller forces a full rebuild.
    pub fn version_mismatch(&self) -> bool {
        self.shard_version != SHARD_VERSION
    }
}
