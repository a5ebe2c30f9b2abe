//! Workspace file discovery: directory walking, exclusion policy, and
//! Merkle-style folder digests for skipping unchanged subtrees.

pub mod folder_hash;
pub mod walker;

pub use folder_hash::FolderHasher;
pub use walker::FileScanner;

use crate::config::{HARD_EXCLUDES, Settings};
use std::path::Path;

/// Decides whether a path is excluded from indexing.
///
/// Combines the unconditional hard excludes (dependency stores, VCS
/// metadata, build outputs, the cache directory itself) with user glob
/// patterns. Applied before any `stat` call.
pub struct ExcludePolicy {
    cache_dir_name: String,
    patterns: Vec<glob::Pattern>,
}

impl ExcludePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        let patterns = settings
            .indexing
            .exclude_patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("[scanner] invalid exclude pattern '{p}': {e}");
                    None
                }
            })
            .collect();

        let cache_dir_name = settings
            .cache_directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".smart-index".to_string());

        Self {
            cache_dir_name,
            patterns,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        for component in path.components() {
            let name = component.as_os_str().to_string_lossy();
            if name == self.cache_dir_name.as_str() {
                return true;
            }
            if HARD_EXCLUDES.contains(&name.as_ref()) {
                return true;
            }
        }
        let text = path.to_string_lossy();
        self.patterns.iter().any(|p| p.matches(&text))
    }
}
