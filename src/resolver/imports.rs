//! Module specifier resolution.
//!
//! Maps import specifiers to concrete file URIs: relative paths with
//! extension probing and `/index.*`, project path aliases, and bare
//! package names through the nearest `node_modules` ancestor. Re-export
//! chains are followed best-effort with a depth cap and a visited set;
//! returning None is normal.

use crate::symbol::IndexedFile;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Probe order for extensionless specifiers.
const EXTENSION_ORDER: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Barrel chains deeper than this stop resolving.
const MAX_RE_EXPORT_DEPTH: usize = 8;

/// Source of per-file records for re-export traversal. Implemented by the
/// index tiers.
pub trait FileRecords {
    fn record(&self, uri: &str) -> Option<Arc<IndexedFile>>;
}

impl FileRecords for crate::index::BackgroundIndex {
    fn record(&self, uri: &str) -> Option<Arc<IndexedFile>> {
        self.indexed_file(uri)
    }
}

impl FileRecords for crate::index::MergedIndex {
    fn record(&self, uri: &str) -> Option<Arc<IndexedFile>> {
        self.indexed_file(uri)
    }
}

pub struct ImportResolver {
    workspace_root: PathBuf,
    /// Alias prefix -> expansion targets, longest prefix first.
    aliases: Vec<(String, Vec<String>)>,
}

impl ImportResolver {
    pub fn new(workspace_root: PathBuf, aliases: &BTreeMap<String, Vec<String>>) -> Self {
        let mut aliases: Vec<(String, Vec<String>)> = aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            workspace_root,
            aliases,
        }
    }

    /// Resolve a module specifier against the importing file.
    pub fn resolve(&self, specifier: &str, from_uri: &str) -> Option<String> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = Path::new(from_uri).parent()?;
            return self.resolve_as_file(&normalize(&base.join(specifier)));
        }

        for (prefix, targets) in &self.aliases {
            if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
                for target in targets {
                    let candidate = self.workspace_root.join(target).join(rest);
                    if let Some(found) = self.resolve_as_file(&normalize(&candidate)) {
                        return Some(found);
                    }
                }
            }
        }

        self.resolve_package(specifier, from_uri)
    }

    /// Try the path as given, with probed extensions, as a directory with
    /// an index file, and with the ESM `.js` -> `.ts` mapping.
    fn resolve_as_file(&self, path: &Path) -> Option<String> {
        if path.is_file() {
            return Some(path.to_string_lossy().into_owned());
        }

        // ESM specifiers name the emitted .js; the source on disk is .ts
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let mapped = match ext {
                "js" | "mjs" | "cjs" => Some("ts"),
                "jsx" => Some("tsx"),
                _ => None,
            };
            if let Some(mapped) = mapped {
                let candidate = path.with_extension(mapped);
                if candidate.is_file() {
                    return Some(candidate.to_string_lossy().into_owned());
                }
            }
        }

        let raw = path.to_string_lossy();
        for ext in EXTENSION_ORDER {
            let candidate = PathBuf::from(format!("{raw}.{ext}"));
            if candidate.is_file() {
                return Some(candidate.to_string_lossy().into_owned());
            }
        }

        if path.is_dir() {
            for ext in EXTENSION_ORDER {
                let candidate = path.join(format!("index.{ext}"));
                if candidate.is_file() {
                    return Some(candidate.to_string_lossy().into_owned());
                }
            }
        }
        None
    }

    /// Bare package specifier: nearest `node_modules` ancestor, manifest
    /// entry point, then index fallbacks.
    fn resolve_package(&self, specifier: &str, from_uri: &str) -> Option<String> {
        let (package, subpath) = split_package_specifier(specifier);

        let mut dir = Path::new(from_uri).parent();
        while let Some(current) = dir {
            let package_dir = current.join("node_modules").join(package);
            if package_dir.is_dir() {
                if let Some(subpath) = subpath {
                    return self.resolve_as_file(&package_dir.join(subpath));
                }
                if let Some(entry) = manifest_entry(&package_dir)
                    && let Some(found) = self.resolve_as_file(&normalize(&package_dir.join(entry)))
                {
                    return Some(found);
                }
                return self.resolve_as_file(&package_dir.join("index"));
            }
            if current == self.workspace_root {
                break;
            }
            dir = current.parent();
        }
        None
    }

    /// Follow re-export chains until a module that actually defines
    /// `exported` turns up.
    pub fn follow_re_exports(
        &self,
        records: &dyn FileRecords,
        uri: &str,
        exported: &str,
    ) -> Option<String> {
        let mut visited = HashSet::new();
        self.follow_inner(records, uri, exported, 0, &mut visited)
    }

    fn follow_inner(
        &self,
        records: &dyn FileRecords,
        uri: &str,
        exported: &str,
        depth: usize,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        if depth > MAX_RE_EXPORT_DEPTH || !visited.insert(uri.to_string()) {
            return None;
        }
        let file = records.record(uri)?;

        if file
            .symbols
            .iter()
            .any(|s| s.name.as_ref() == exported && s.full_container_path.is_empty())
        {
            return Some(uri.to_string());
        }

        for re_export in file.re_exports.iter().filter(|r| r.exports(exported)) {
            let Some(target) = self.resolve(&re_export.module_specifier, uri) else {
                continue;
            };
            if let Some(found) = self.follow_inner(records, &target, exported, depth + 1, visited) {
                return Some(found);
            }
        }
        None
    }
}

/// `@scope/pkg/sub` -> (`@scope/pkg`, Some("sub")); `pkg` -> (`pkg`, None).
fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let boundary = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(i, _)| i)
    } else {
        specifier.find('/')
    };
    match boundary {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

fn manifest_entry(package_dir: &Path) -> Option<String> {
    let manifest = std::fs::read_to_string(package_dir.join("package.json")).ok()?;
    let parsed: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    for key in ["types", "module", "main"] {
        if let Some(entry) = parsed.get(key).and_then(|v| v.as_str()) {
            return Some(entry.to_string());
        }
    }
    None
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
