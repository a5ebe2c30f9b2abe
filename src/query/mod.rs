//! The query contract: the boundary between the indexing core and an
//! editor-protocol surface.
//!
//! Every request carries an optional deadline; expiry degrades to partial
//! or empty results, never an error. Results are deduplicated by
//! `(uri, line, character)` with a near-duplicate filter that merges
//! locations within two lines in the same file.

use crate::config::{ResolverMode, Settings};
use crate::error::IndexResult;
use crate::extractor::parse_source;
use crate::index::{BackgroundStats, FindReferencesOptions, IndexStats, MergedIndex};
use crate::resolver::{FsReader, ImportResolver, RecursiveResolver, SourceReader, TypeFallback};
use crate::search::fuzzy;
use crate::symbol::Symbol;
use crate::types::{CancellationToken, Location};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tree_sitter::Node;

/// Locations closer than this in the same file collapse into one result.
const NEAR_DUPLICATE_LINES: u32 = 2;

/// Per-request context. The open URI feeds search ranking boosts.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub deadline: Option<Instant>,
    pub open_uri: Option<String>,
}

impl QueryContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            open_uri: None,
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

pub struct QueryEngine {
    settings: Arc<Settings>,
    workspace_root: PathBuf,
    merged: MergedIndex,
    import_resolver: ImportResolver,
    reader: Box<dyn SourceReader>,
    type_fallback: Option<Arc<dyn TypeFallback>>,
}

impl QueryEngine {
    pub fn new(settings: Arc<Settings>, workspace_root: PathBuf, merged: MergedIndex) -> Self {
        let import_resolver =
            ImportResolver::new(workspace_root.clone(), &settings.resolver.path_aliases);
        Self {
            settings,
            workspace_root,
            merged,
            import_resolver,
            reader: Box::new(FsReader),
            type_fallback: None,
        }
    }

    /// Install the type-backed delegate used by hybrid-mode resolution.
    pub fn with_type_fallback(mut self, fallback: Arc<dyn TypeFallback>) -> Self {
        self.type_fallback = Some(fallback);
        self
    }

    pub fn merged(&self) -> &MergedIndex {
        &self.merged
    }

    pub fn find_definitions(&self, name: &str, _ctx: &QueryContext) -> Vec<Symbol> {
        self.merged.find_definitions(name)
    }

    /// All reference locations for the name at a position. Import-binding
    /// references count as declarations: they surface only when
    /// `include_declaration` is set.
    pub fn find_references(
        &self,
        uri: &str,
        line: u32,
        character: u32,
        include_declaration: bool,
        ctx: &QueryContext,
    ) -> Vec<Location> {
        let Some(name) = self.token_at(uri, line, character) else {
            return Vec::new();
        };

        let mut locations = Vec::new();
        if include_declaration {
            for definition in self.merged.find_definitions(&name) {
                locations.push(definition.location);
            }
        }
        if ctx.expired() {
            return dedupe_locations(locations);
        }

        for reference in self
            .merged
            .find_references_by_name(&name, &FindReferencesOptions::default())
        {
            if reference.is_import && !include_declaration {
                continue;
            }
            locations.push(reference.location);
        }
        dedupe_locations(locations)
    }

    /// Fuzzy-ranked workspace symbol search with context boosts.
    pub fn search_symbols(&self, query: &str, limit: usize, ctx: &QueryContext) -> Vec<Symbol> {
        let open_dir = ctx
            .open_uri
            .as_deref()
            .and_then(|u| Path::new(u).parent().map(|p| p.to_path_buf()));

        let mut scored: Vec<(i32, String, String)> = Vec::new();
        for (name, uris) in self.merged.symbol_names_with_uris() {
            if ctx.expired() {
                break;
            }
            let base = fuzzy::score(query, &name);
            if base == 0 {
                continue;
            }
            for uri in uris {
                let mut score = base + fuzzy::uri_penalty(&uri);
                if ctx.open_uri.as_deref() == Some(uri.as_str()) {
                    score += 100;
                } else if let Some(open_dir) = &open_dir
                    && Path::new(&uri).parent() == Some(open_dir.as_path())
                {
                    score += 10;
                }
                scored.push((score, name.clone(), uri));
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut results = Vec::new();
        for (_, name, uri) in scored {
            if results.len() >= limit {
                break;
            }
            results.extend(
                self.merged
                    .file_symbols(&uri)
                    .into_iter()
                    .filter(|s| s.name.as_ref() == name),
            );
        }
        results.truncate(limit);
        results
    }

    pub fn get_file_symbols(&self, uri: &str) -> Vec<Symbol> {
        self.merged.file_symbols(uri)
    }

    /// Go-to-definition. A member-access head goes through the recursive
    /// property resolver; a plain identifier goes through the merged index
    /// with import-resolution filtering.
    pub fn find_definition_at(
        &self,
        uri: &str,
        line: u32,
        character: u32,
        _ctx: &QueryContext,
    ) -> Vec<Location> {
        let Some(code) = self.reader.read(uri) else {
            return Vec::new();
        };
        let Some(tree) = parse_source(uri, &code) else {
            return Vec::new();
        };
        let point = tree_sitter::Point {
            row: line as usize,
            column: character as usize,
        };
        let Some(node) = tree
            .root_node()
            .named_descendant_for_point_range(point, point)
        else {
            return Vec::new();
        };

        if node.kind() == "property_identifier"
            && let Some((base, chain)) = member_chain(node, &code)
        {
            return self.resolve_property_chain(&base, &chain);
        }

        if matches!(node.kind(), "identifier" | "type_identifier") {
            let name = &code[node.byte_range()];
            return self.definitions_for_identifier(name, uri);
        }
        Vec::new()
    }

    fn resolve_property_chain(&self, base: &str, chain: &[String]) -> Vec<Location> {
        let chain: Vec<&str> = chain.iter().map(|s| s.as_str()).collect();
        let mut resolver = RecursiveResolver::new(&self.merged, self.reader.as_ref());
        if self.settings.resolver.mode == ResolverMode::Hybrid
            && let Some(fallback) = &self.type_fallback
        {
            resolver = resolver.with_fallback(
                fallback.clone(),
                Duration::from_millis(self.settings.resolver.hybrid_timeout_ms),
            );
        }

        for definition in self.merged.find_definitions(base) {
            if let Some(found) = resolver.resolve_chain(&definition, &chain) {
                return vec![found];
            }
        }
        Vec::new()
    }

    /// Definitions of a bare identifier, narrowed by the file's imports:
    /// when the name is imported, only definitions in the resolved module
    /// (following barrel re-exports) survive.
    fn definitions_for_identifier(&self, name: &str, from_uri: &str) -> Vec<Location> {
        let definitions = self.merged.find_definitions(name);
        if definitions.is_empty() {
            return Vec::new();
        }

        if let Some(file) = self.merged.indexed_file(from_uri) {
            let import = file.imports.iter().find(|i| {
                i.local_name.as_ref() == name
                    || i.exported_name.as_deref() == Some(name)
            });
            if let Some(import) = import {
                let exported = import.exported_name.as_deref().unwrap_or(name);
                if let Some(target) = self
                    .import_resolver
                    .resolve(&import.module_specifier, from_uri)
                {
                    let resolved = self
                        .import_resolver
                        .follow_re_exports(&self.merged, &target, exported)
                        .unwrap_or(target);
                    let narrowed: Vec<Location> = definitions
                        .iter()
                        .filter(|d| d.location.uri == resolved)
                        .map(|d| d.location.clone())
                        .collect();
                    if !narrowed.is_empty() {
                        return dedupe_locations(narrowed);
                    }
                }
            }
        }

        // Same-file definitions first, each file's results position-deduped
        let mut locations: Vec<Location> = definitions
            .iter()
            .filter(|d| d.location.uri == from_uri)
            .map(|d| d.location.clone())
            .collect();
        if locations.is_empty() {
            locations = definitions.into_iter().map(|d| d.location).collect();
        }
        dedupe_locations(locations)
    }

    /// Drop everything and re-index the workspace from scratch.
    pub fn rebuild(&self, cancel: &CancellationToken) -> IndexResult<IndexStats> {
        self.merged.background().clear()?;
        self.merged
            .background()
            .index_workspace(&self.workspace_root, cancel)
    }

    pub fn clear_cache(&self) -> IndexResult<()> {
        self.merged.background().clear()
    }

    pub fn stats(&self) -> BackgroundStats {
        self.merged.background().stats()
    }

    /// Name of the symbol or reference at a position, from the indexed
    /// record when available, else from a fresh parse.
    fn token_at(&self, uri: &str, line: u32, character: u32) -> Option<String> {
        if let Some(file) = self.merged.indexed_file(uri) {
            for symbol in &file.symbols {
                if symbol.range.contains(line, character) {
                    return Some(symbol.name.to_string());
                }
            }
            for reference in &file.references {
                if reference.range.contains(line, character) {
                    return Some(reference.symbol_name.to_string());
                }
            }
        }

        let code = self.reader.read(uri)?;
        let tree = parse_source(uri, &code)?;
        let point = tree_sitter::Point {
            row: line as usize,
            column: character as usize,
        };
        let node = tree
            .root_node()
            .named_descendant_for_point_range(point, point)?;
        if matches!(
            node.kind(),
            "identifier" | "type_identifier" | "property_identifier" | "shorthand_property_identifier"
        ) {
            return Some(code[node.byte_range()].to_string());
        }
        None
    }
}

/// For a clicked property inside `a.b.c`, the base identifier and the
/// property chain from the base up to and including the clicked token.
fn member_chain(property: Node, code: &str) -> Option<(String, Vec<String>)> {
    let member = property.parent()?;
    if member.kind() != "member_expression" {
        return None;
    }

    let mut below = Vec::new();
    let mut object = member.child_by_field_name("object")?;
    loop {
        match object.kind() {
            "member_expression" => {
                let inner_property = object.child_by_field_name("property")?;
                below.push(code[inner_property.byte_range()].to_string());
                object = object.child_by_field_name("object")?;
            }
            "identifier" => break,
            _ => return None,
        }
    }

    let base = code[object.byte_range()].to_string();
    below.reverse();
    below.push(code[property.byte_range()].to_string());
    Some((base, below))
}

/// Exact-position dedup, then the near-duplicate merge: a location within
/// two lines of an earlier one in the same file is dropped.
fn dedupe_locations(locations: Vec<Location>) -> Vec<Location> {
    let mut seen = HashSet::new();
    let mut exact: Vec<Location> = Vec::new();
    for location in locations {
        if seen.insert((location.uri.clone(), location.line, location.character)) {
            exact.push(location);
        }
    }

    let mut merged: Vec<Location> = Vec::new();
    for location in exact {
        let near = merged.iter().any(|kept| {
            kept.uri == location.uri && kept.line.abs_diff(location.line) <= NEAR_DUPLICATE_LINES
        });
        if !near {
            merged.push(location);
        }
    }
    merged
}
