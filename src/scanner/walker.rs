//! File system walker for discovering source files to index.
//!
//! Built on the `ignore` crate so .gitignore rules and custom patterns are
//! honored during traversal, before any per-file work happens.

use super::ExcludePolicy;
use crate::config::{HARD_EXCLUDES, Settings};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const INDEXABLE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Walks the workspace root and returns indexable files in stable order.
pub struct FileScanner {
    settings: Arc<Settings>,
    exclude: ExcludePolicy,
}

impl FileScanner {
    pub fn new(settings: Arc<Settings>) -> Self {
        let exclude = ExcludePolicy::from_settings(&settings);
        Self { settings, exclude }
    }

    pub fn exclude_policy(&self) -> &ExcludePolicy {
        &self.exclude
    }

    /// Enumerate indexable files under `root`, honoring exclude patterns
    /// and the max-file-size policy. The result is sorted so successive
    /// scans of an unchanged tree produce identical lists.
    pub fn scan(&self, root: &Path) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false);

        // Prune excluded directories during traversal, before stat
        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for dir in HARD_EXCLUDES {
            let _ = override_builder.add(&format!("!**/{dir}/**"));
            let _ = override_builder.add(&format!("!**/{dir}"));
        }
        for pattern in &self.settings.indexing.exclude_patterns {
            if let Err(e) = override_builder.add(&format!("!{pattern}")) {
                tracing::warn!("[scanner] invalid exclude pattern '{pattern}': {e}");
            }
        }
        if let Ok(overrides) = override_builder.build() {
            builder.overrides(overrides);
        }

        let max_size = self.settings.indexing.max_file_size;
        let mut files: Vec<PathBuf> = builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|entry| {
                let path = entry.path();
                if !has_indexable_extension(path) || self.exclude.matches(path) {
                    return None;
                }
                if let Ok(meta) = entry.metadata() {
                    if meta.len() > max_size {
                        tracing::info!(
                            "[scanner] skipping oversized file ({} bytes): {}",
                            meta.len(),
                            path.display()
                        );
                        return None;
                    }
                }
                Some(path.to_path_buf())
            })
            .collect();

        files.sort();
        files
    }

    /// Count files that would be indexed (useful for dry runs)
    pub fn count_files(&self, root: &Path) -> usize {
        self.scan(root).len()
    }
}

pub fn has_indexable_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INDEXABLE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> FileScanner {
        FileScanner::new(Arc::new(Settings::default()))
    }

    #[test]
    fn test_scan_filters_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("app.ts"), "export const x = 1;").unwrap();
        fs::write(root.join("view.tsx"), "export const V = 1;").unwrap();
        fs::write(root.join("notes.md"), "# notes").unwrap();
        fs::write(root.join("data.json"), "{}").unwrap();

        let files = scanner().scan(root);
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.ends_with("app.ts")));
        assert!(files.iter().any(|p| p.ends_with("view.tsx")));
    }

    #[test]
    fn test_scan_skips_hard_excluded_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = {}").unwrap();
        fs::write(root.join("main.ts"), "export {};").unwrap();

        let files = scanner().scan(root);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.ts"));
    }

    #[test]
    fn test_scan_skips_oversized_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let mut settings = Settings::default();
        settings.indexing.max_file_size = 16;
        let scanner = FileScanner::new(Arc::new(settings));

        fs::write(root.join("small.ts"), "let a = 1;").unwrap();
        fs::write(root.join("big.ts"), "a".repeat(64)).unwrap();

        let files = scanner.scan(root);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.ts"));
    }

    #[test]
    fn test_scan_order_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("b.ts"), "export {};").unwrap();
        fs::write(root.join("a.ts"), "export {};").unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/c.ts"), "export {};").unwrap();

        let first = scanner().scan(root);
        let second = scanner().scan(root);
        assert_eq!(first, second);
    }
}
