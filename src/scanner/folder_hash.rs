//! Merkle-style folder digests.
//!
//! A folder's digest is a hash over its sorted entries: for files the name
//! and mtime, for subfolders the child digest. Comparing a stored digest
//! against a fresh one answers "has anything under this folder changed?"
//! in O(1), letting full scans skip entire unchanged subtrees.

use super::ExcludePolicy;
use crate::scanner::walker::has_indexable_extension;
use crate::utils::mtime_millis;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Digest table for one scan: folder path -> digest hex.
pub type DigestTable = BTreeMap<String, String>;

pub struct FolderHasher<'a> {
    exclude: &'a ExcludePolicy,
}

impl<'a> FolderHasher<'a> {
    pub fn new(exclude: &'a ExcludePolicy) -> Self {
        Self { exclude }
    }

    /// Compute digests for every folder under `root`, bottom-up.
    ///
    /// Excluded entries do not contribute, so changes inside excluded
    /// directories never invalidate a digest.
    pub fn digest_tree(&self, root: &Path) -> DigestTable {
        let mut table = DigestTable::new();
        self.digest_folder(root, &mut table);
        table
    }

    fn digest_folder(&self, folder: &Path, table: &mut DigestTable) -> Option<String> {
        let entries = std::fs::read_dir(folder).ok()?;

        let mut names: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| !self.exclude.matches(p))
            .collect();
        names.sort();

        let mut hasher = Sha256::new();
        for path in names {
            let name = match path.file_name() {
                Some(n) => n.to_string_lossy().into_owned(),
                None => continue,
            };
            let meta = match std::fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if meta.is_dir() {
                if let Some(child) = self.digest_folder(&path, table) {
                    hasher.update(b"D");
                    hasher.update(name.as_bytes());
                    hasher.update(child.as_bytes());
                }
            } else if meta.is_file() && has_indexable_extension(&path) {
                hasher.update(b"F");
                hasher.update(name.as_bytes());
                hasher.update(mtime_millis(&meta).to_le_bytes());
            }
        }

        let digest = format!("{:x}", hasher.finalize());
        table.insert(folder.to_string_lossy().into_owned(), digest.clone());
        Some(digest)
    }
}

/// Folders whose digest is unchanged between `previous` and `current`.
pub fn unchanged_folders(previous: &DigestTable, current: &DigestTable) -> Vec<String> {
    current
        .iter()
        .filter(|(folder, digest)| previous.get(*folder) == Some(digest))
        .map(|(folder, _)| folder.clone())
        .collect()
}
