//! Query facade over the dynamic overlay and the persistent index.
//!
//! Reads fan out to both; dynamic results fully override background
//! results for any URI that is currently open, and everything is
//! deduplicated by `(name, uri, line, character)`.

use crate::index::background::{BackgroundIndex, FindReferencesOptions};
use crate::index::dynamic::DynamicIndex;
use crate::symbol::{IndexedFile, Reference, Symbol};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone)]
pub struct MergedIndex {
    dynamic: Arc<Mutex<DynamicIndex>>,
    background: Arc<BackgroundIndex>,
}

impl MergedIndex {
    pub fn new(dynamic: Arc<Mutex<DynamicIndex>>, background: Arc<BackgroundIndex>) -> Self {
        Self {
            dynamic,
            background,
        }
    }

    pub fn background(&self) -> &Arc<BackgroundIndex> {
        &self.background
    }

    pub fn dynamic(&self) -> &Arc<Mutex<DynamicIndex>> {
        &self.dynamic
    }

    pub fn find_definitions(&self, name: &str) -> Vec<Symbol> {
        let (mut found, open_uris) = {
            let dynamic = self.dynamic.lock();
            (dynamic.find_definitions(name), dynamic.open_uris())
        };
        let open: HashSet<String> = open_uris.into_iter().collect();

        for symbol in self.background.find_definitions(name) {
            if !open.contains(&symbol.location.uri) {
                found.push(symbol);
            }
        }

        let mut seen = HashSet::new();
        found.retain(|s| {
            seen.insert((
                s.name.clone(),
                s.location.uri.clone(),
                s.location.line,
                s.location.character,
            ))
        });
        found
    }

    pub fn find_references_by_name(
        &self,
        name: &str,
        options: &FindReferencesOptions,
    ) -> Vec<Reference> {
        let (mut found, open_uris) = {
            let dynamic = self.dynamic.lock();
            (
                dynamic.find_references_by_name(name, options),
                dynamic.open_uris(),
            )
        };
        let open: HashSet<String> = open_uris.into_iter().collect();

        for reference in self.background.find_references_by_name(name, options) {
            if !open.contains(&reference.location.uri) {
                found.push(reference);
            }
        }

        let mut seen = HashSet::new();
        found.retain(|r| {
            seen.insert((
                r.symbol_name.clone(),
                r.location.uri.clone(),
                r.location.line,
                r.location.character,
            ))
        });
        found
    }

    pub fn file_symbols(&self, uri: &str) -> Vec<Symbol> {
        {
            let dynamic = self.dynamic.lock();
            if dynamic.contains(uri) {
                return dynamic.file_symbols(uri);
            }
        }
        self.background.file_symbols(uri)
    }

    pub fn indexed_file(&self, uri: &str) -> Option<Arc<IndexedFile>> {
        {
            let dynamic = self.dynamic.lock();
            if let Some(file) = dynamic.indexed_file(uri) {
                return Some(file);
            }
        }
        self.background.indexed_file(uri)
    }

    /// Candidate names for fuzzy search: the union of both indices, with
    /// open files contributing their dynamic state only.
    pub fn symbol_names_with_uris(&self) -> Vec<(String, Vec<String>)> {
        let (dynamic_names, open_uris) = {
            let dynamic = self.dynamic.lock();
            (dynamic.symbol_names_with_uris(), dynamic.open_uris())
        };
        let open: HashSet<String> = open_uris.into_iter().collect();

        let mut merged: HashMap<String, Vec<String>> = dynamic_names.into_iter().collect();
        for (name, uris) in self.background.symbol_names_with_uris() {
            let kept: Vec<String> = uris.into_iter().filter(|u| !open.contains(u)).collect();
            if kept.is_empty() {
                continue;
            }
            merged.entry(name).or_default().extend(kept);
        }
        merged.into_iter().collect()
    }
}
