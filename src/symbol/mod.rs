//! Core data model: symbols, references, imports, and the per-file record
//! that shards persist.

use crate::types::{CompactString, Location, Range, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed key-value bag for plugin data. Framework patterns annotate symbols
/// through this instead of arbitrary dynamic objects.
pub type MetadataMap = BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

/// File-level record of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Stable identifier: `{fileHash}:{semanticPath}[#{sigHash}]`. Does not
    /// encode positions, so edits that only shift lines preserve it.
    pub id: String,
    pub name: CompactString,
    pub kind: SymbolKind,
    pub location: Location,
    pub range: Range,
    /// Immediate parent name (class or function), if any.
    pub container_name: Option<CompactString>,
    /// Dotted qualified path from file root, empty at top level.
    pub full_container_path: CompactString,
    pub is_static: bool,
    /// Overload discriminator for methods and functions.
    pub parameters_count: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: MetadataMap,
}

impl Symbol {
    /// Qualified path used in the stable id: `container.name` or `name` at
    /// file root.
    pub fn semantic_path(&self) -> String {
        if self.full_container_path.is_empty() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.full_container_path, self.name)
        }
    }
}

/// Occurrence of an identifier that is not itself a declaration position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub symbol_name: CompactString,
    pub location: Location,
    pub range: Range,
    /// Name of the enclosing scope, if any.
    pub container_name: Option<CompactString>,
    /// True when this reference is an import binding.
    pub is_import: bool,
    /// Canonical scope path (`A::b`) or `<global>`.
    pub scope_id: CompactString,
    /// True when the name was introduced in the current scope chain.
    pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Binding name in the importing file.
    pub local_name: CompactString,
    pub module_specifier: CompactString,
    /// Original name in the source module, when renamed or re-exported.
    pub exported_name: Option<CompactString>,
    pub is_default: bool,
    pub is_namespace: bool,
    /// `import()` call; creates no local binding.
    pub is_dynamic: bool,
    /// `require()` form.
    pub is_cjs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReExportNames {
    /// `export * from "m"`
    All,
    /// `export { a, b } from "m"`
    Named(Vec<CompactString>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReExport {
    pub module_specifier: CompactString,
    pub exported_names: ReExportNames,
    /// `export * as ns from "m"`
    pub as_name: Option<CompactString>,
}

impl ReExport {
    /// Whether this re-export can provide `name`.
    pub fn exports(&self, name: &str) -> bool {
        match &self.exported_names {
            ReExportNames::All => self.as_name.is_none(),
            ReExportNames::Named(names) => names.iter().any(|n| n.as_ref() == name),
        }
    }
}

/// Everything extracted from one file. Produced by the extractor, consumed
/// by the indices and the shard store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub uri: String,
    pub content_hash: String,
    /// Milliseconds since UNIX_EPOCH.
    pub mtime: u64,
    pub symbols: Vec<Symbol>,
    pub references: Vec<Reference>,
    pub imports: Vec<Import>,
    pub re_exports: Vec<ReExport>,
    pub last_indexed_at: u64,
    pub shard_version: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: MetadataMap,
}

impl IndexedFile {
    /// Empty record for a file whose parse failed. Indexing continues; the
    /// flag lets callers distinguish "empty file" from "unparseable file".
    pub fn parse_failed(uri: impl Into<String>, mtime: u64, shard_version: u32) -> Self {
        let mut metadata = MetadataMap::new();
        metadata.insert("parseFailed".into(), MetadataValue::Bool(true));
        Self {
            uri: uri.into(),
            content_hash: String::new(),
            mtime,
            symbols: Vec::new(),
            references: Vec::new(),
            imports: Vec::new(),
            re_exports: Vec::new(),
            last_indexed_at: crate::utils::get_utc_timestamp(),
            shard_version,
            metadata,
        }
    }
}

/// Resident bookkeeping for one shard. Small: O(n_files) in RAM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardMetadata {
    pub uri: String,
    pub content_hash: String,
    pub mtime: u64,
    pub symbol_count: u32,
    pub last_indexed_at: u64,
    pub shard_version: u32,
}

impl ShardMetadata {
    pub fn for_file(file: &IndexedFile) -> Self {
        Self {
            uri: file.uri.clone(),
            content_hash: file.content_hash.clone(),
            mtime: file.mtime,
            symbol_count: file.symbols.len() as u32,
            last_indexed_at: file.last_indexed_at,
            shard_version: file.shard_version,
        }
    }
}
