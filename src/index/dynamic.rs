//! In-memory overlay for currently open files.
//!
//! Holds full IndexedFile records for a small set of URIs and re-extracts
//! synchronously on every update; no disk IO, no locking. Callers (one
//! editor event loop) serialize access; debouncing, if any, happens
//! upstream.

use crate::error::IndexResult;
use crate::extractor::{ExtractorFactory, Language, SymbolExtractor};
use crate::index::background::FindReferencesOptions;
use crate::index::collect_references_matching;
use crate::symbol::{IndexedFile, Reference, Symbol};
use crate::utils::get_utc_timestamp;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct DynamicIndex {
    factory: ExtractorFactory,
    extractors: HashMap<Language, SymbolExtractor>,
    files: HashMap<String, Arc<IndexedFile>>,
}

impl DynamicIndex {
    pub fn new(factory: ExtractorFactory) -> Self {
        Self {
            factory,
            extractors: HashMap::new(),
            files: HashMap::new(),
        }
    }

    pub fn open(&mut self, uri: &str, content: &str) -> IndexResult<()> {
        self.update(uri, content)
    }

    /// Re-extract the file from the given buffer. Synchronous relative to
    /// the caller.
    pub fn update(&mut self, uri: &str, content: &str) -> IndexResult<()> {
        let Some(language) = Language::from_path(Path::new(uri)) else {
            return Ok(());
        };
        let extractor = match self.extractors.entry(language) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                v.insert(self.factory.create(language)?)
            }
        };
        let file = extractor.extract(content, uri, get_utc_timestamp() * 1000)?;
        self.files.insert(uri.to_string(), Arc::new(file));
        Ok(())
    }

    pub fn close(&mut self, uri: &str) {
        self.files.remove(uri);
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.files.contains_key(uri)
    }

    pub fn open_uris(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn indexed_file(&self, uri: &str) -> Option<Arc<IndexedFile>> {
        self.files.get(uri).cloned()
    }

    pub fn find_definitions(&self, name: &str) -> Vec<Symbol> {
        self.files
            .values()
            .flat_map(|file| file.symbols.iter().filter(|s| s.name.as_ref() == name))
            .cloned()
            .collect()
    }

    pub fn find_references_by_name(
        &self,
        name: &str,
        options: &FindReferencesOptions,
    ) -> Vec<Reference> {
        let mut found = Vec::new();
        for (uri, file) in &self.files {
            if options.exclude_uri.as_deref() == Some(uri.as_str()) {
                continue;
            }
            collect_references_matching(file, name, options, &mut found);
        }
        found
    }

    pub fn file_symbols(&self, uri: &str) -> Vec<Symbol> {
        self.files
            .get(uri)
            .map(|f| f.symbols.clone())
            .unwrap_or_default()
    }

    /// Defined names across open files, for search candidates.
    pub fn symbol_names_with_uris(&self) -> Vec<(String, Vec<String>)> {
        let mut names: HashMap<String, Vec<String>> = HashMap::new();
        for (uri, file) in &self.files {
            for symbol in &file.symbols {
                let entry = names.entry(symbol.name.to_string()).or_default();
                if !entry.contains(uri) {
                    entry.push(uri.clone());
                }
            }
        }
        names.into_iter().collect()
    }
}
