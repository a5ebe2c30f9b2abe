//! String interning for symbol names, container paths, and file URIs.
//!
//! The inverted maps key on compact `NameId`/`UriId` values instead of owned
//! strings. Shards on disk stay self-contained; interning is an in-memory
//! concern only and ids are not stable across process restarts.

use crate::types::{NameId, UriId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct InternTable {
    map: HashMap<Arc<str>, u32>,
    values: Vec<Arc<str>>,
}

impl InternTable {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        let value: Arc<str> = Arc::from(s);
        // Ids start at 1 so they fit the NonZeroU32 newtypes.
        let id = self.values.len() as u32 + 1;
        self.values.push(value.clone());
        self.map.insert(value, id);
        id
    }

    fn lookup(&self, s: &str) -> Option<u32> {
        self.map.get(s).copied()
    }

    fn resolve(&self, id: u32) -> Option<Arc<str>> {
        self.values.get(id.checked_sub(1)? as usize).cloned()
    }
}

/// Deduplicates names and URIs into compact identifiers.
#[derive(Default)]
pub struct Interner {
    names: RwLock<InternTable>,
    uris: RwLock<InternTable>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self, s: &str) -> NameId {
        NameId::new(self.names.write().intern(s)).expect("intern ids start at 1")
    }

    /// Lookup without inserting. Queries use this so unknown names never
    /// grow the table.
    pub fn lookup_name(&self, s: &str) -> Option<NameId> {
        self.names.read().lookup(s).and_then(NameId::new)
    }

    pub fn resolve_name(&self, id: NameId) -> Option<Arc<str>> {
        self.names.read().resolve(id.value())
    }

    pub fn uri(&self, s: &str) -> UriId {
        UriId::new(self.uris.write().intern(s)).expect("intern ids start at 1")
    }

    pub fn lookup_uri(&self, s: &str) -> Option<UriId> {
        self.uris.read().lookup(s).and_then(UriId::new)
    }

    pub fn resolve_uri(&self, id: UriId) -> Option<Arc<str>> {
        self.uris.read().resolve(id.value())
    }
}
