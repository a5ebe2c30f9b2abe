//! The persistent workspace-wide index.
//!
//! BackgroundIndex owns the shard metadata table, the inverted maps, and
//! the worker pool. All map mutations funnel through `update_file` and
//! `remove_file`, each a single critical section under a per-URI lock, so
//! a concurrent query sees the pre-update or post-update snapshot for a
//! URI, never a mix. Workers only parse; they hand IndexedFile values back
//! and never touch this state.

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::index::stats::{BackgroundStats, IndexStats};
use crate::intern::Interner;
use crate::pool::{ParseTask, WorkerPool};
use crate::scanner::folder_hash::{DigestTable, FolderHasher, unchanged_folders};
use crate::scanner::{ExcludePolicy, FileScanner};
use crate::storage::shard_store::remove_unclaimed;
use crate::storage::{
    MetadataFile, ShardHeader, ShardStore, decode_shard, decode_shard_header, encode_shard,
};
use crate::symbol::{IndexedFile, Reference, ShardMetadata, Symbol};
use crate::types::{CancellationToken, NameId, UriId};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hard cap on candidate files examined per reference query, bounding tail
/// latency on very common names.
pub const REFERENCE_CANDIDATE_CAP: usize = 2000;

/// Lazy-loaded shard bodies kept in memory.
const SHARD_CACHE_CAP: usize = 256;

/// Dispatch wave size multiplier; waves keep cancellation and progress
/// callbacks interleaved with worker traffic.
const WAVE_FACTOR: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct FindReferencesOptions {
    pub exclude_local: bool,
    pub scope_id: Option<String>,
    pub exclude_uri: Option<String>,
}

/// Per-URI record of what was merged into the inverted maps, so the next
/// update or removal can cleanly take exactly those entries out again.
#[derive(Default)]
struct UriContribution {
    names: Vec<NameId>,
    ids: Vec<String>,
    reference_names: Vec<NameId>,
}

#[derive(Default)]
struct IndexState {
    shards: HashMap<String, ShardMetadata>,
    folder_digests: DigestTable,
    symbol_names: HashMap<NameId, HashSet<UriId>>,
    symbol_ids: HashMap<String, UriId>,
    references: HashMap<NameId, HashSet<UriId>>,
    contributions: HashMap<UriId, UriContribution>,
}

pub struct BackgroundIndex {
    settings: Arc<Settings>,
    cache_dir: PathBuf,
    interner: Arc<Interner>,
    store: ShardStore,
    state: RwLock<IndexState>,
    uri_locks: DashMap<String, Arc<Mutex<()>>>,
    shard_cache: DashMap<String, Arc<IndexedFile>>,
    pool: WorkerPool,
}

impl BackgroundIndex {
    /// Load shard metadata, rebuild the inverted maps from shard headers,
    /// and start the worker pool. A shard-format version mismatch forces a
    /// full rebuild.
    pub fn init(settings: Arc<Settings>, cache_dir: PathBuf) -> IndexResult<Self> {
        std::fs::create_dir_all(&cache_dir).map_err(|e| IndexError::FileWrite {
            path: cache_dir.clone(),
            source: e,
        })?;

        let store = ShardStore::new(cache_dir.join("index"));
        let pool = WorkerPool::new(
            settings.indexing.max_concurrent_jobs,
            Duration::from_millis(settings.indexing.task_timeout_ms),
            crate::extractor::ExtractorFactory::new(),
        );

        let index = Self {
            settings,
            cache_dir,
            interner: Arc::new(Interner::new()),
            store,
            state: RwLock::new(IndexState::default()),
            uri_locks: DashMap::new(),
            shard_cache: DashMap::new(),
            pool,
        };
        index.load_persisted()?;
        Ok(index)
    }

    fn load_persisted(&self) -> IndexResult<()> {
        let loaded = MetadataFile::load(&self.cache_dir)?;
        let meta = match loaded {
            Some(meta) if !meta.version_mismatch() => meta,
            Some(meta) => {
                tracing::info!(
                    "[background] shard format {} != {}, forcing full rebuild",
                    meta.shard_version,
                    crate::storage::SHARD_VERSION
                );
                self.store.clear()?;
                return Ok(());
            }
            None => {
                // No metadata: anything on disk is unclaimed
                self.store.clear()?;
                return Ok(());
            }
        };

        // Disk and metadata must agree: drop shards nobody claims, drop
        // claims nobody backs
        remove_unclaimed(&self.store, meta.shards.keys());

        let mut state = self.state.write();
        state.folder_digests = meta.folder_digests;
        for (uri, shard_meta) in meta.shards {
            let header = match self.load_header(&uri) {
                Some(header) if header.content_hash == shard_meta.content_hash => header,
                Some(_) => {
                    tracing::debug!("[background] stale shard body for '{uri}', re-indexing");
                    continue;
                }
                None => continue,
            };
            let uri_id = self.interner.uri(&uri);
            Self::insert_entries(&mut state, &self.interner, uri_id, &header);
            state.shards.insert(uri, shard_meta);
        }
        tracing::info!("[background] loaded {} shards", state.shards.len());
        Ok(())
    }

    fn load_header(&self, uri: &str) -> Option<ShardHeader> {
        let bytes = self.store.load(uri).ok()??;
        decode_shard_header(&bytes)
    }

    fn insert_entries(
        state: &mut IndexState,
        interner: &Interner,
        uri_id: UriId,
        header: &ShardHeader,
    ) {
        let mut contribution = UriContribution::default();
        for name in &header.symbol_names {
            let name_id = interner.name(name);
            state.symbol_names.entry(name_id).or_default().insert(uri_id);
            contribution.names.push(name_id);
        }
        for id in &header.symbol_ids {
            state.symbol_ids.insert(id.clone(), uri_id);
            contribution.ids.push(id.clone());
        }
        for name in &header.reference_names {
            let name_id = interner.name(name);
            state.references.entry(name_id).or_default().insert(uri_id);
            contribution.reference_names.push(name_id);
        }
        state.contributions.insert(uri_id, contribution);
    }

    fn remove_entries(state: &mut IndexState, uri_id: UriId) {
        let Some(contribution) = state.contributions.remove(&uri_id) else {
            return;
        };
        for name_id in contribution.names {
            if let Some(uris) = state.symbol_names.get_mut(&name_id) {
                uris.remove(&uri_id);
                if uris.is_empty() {
                    state.symbol_names.remove(&name_id);
                }
            }
        }
        for id in contribution.ids {
            if state.symbol_ids.get(&id) == Some(&uri_id) {
                state.symbol_ids.remove(&id);
            }
        }
        for name_id in contribution.reference_names {
            if let Some(uris) = state.references.get_mut(&name_id) {
                uris.remove(&uri_id);
                if uris.is_empty() {
                    state.references.remove(&name_id);
                }
            }
        }
    }

    fn uri_lock(&self, uri: &str) -> Arc<Mutex<()>> {
        self.uri_locks
            .entry(uri.to_string())
            .or_default()
            .clone()
    }

    /// Merge one file's extraction result: take out every entry the prior
    /// result contributed, insert the new ones, persist the shard.
    pub fn update_file(&self, uri: &str, result: IndexedFile) -> IndexResult<()> {
        let lock = self.uri_lock(uri);
        let _guard = lock.lock();

        let uri_id = self.interner.uri(uri);
        let header = ShardHeader::for_file(&result);
        {
            let mut state = self.state.write();
            Self::remove_entries(&mut state, uri_id);
            Self::insert_entries(&mut state, &self.interner, uri_id, &header);
            state
                .shards
                .insert(uri.to_string(), ShardMetadata::for_file(&result));
        }

        let bytes = encode_shard(&result)?;
        self.shard_cache.insert(uri.to_string(), Arc::new(result));
        self.trim_cache();

        if let Err(e) = self.store.save(uri, &bytes) {
            // The maps stay correct; the stale shard is caught by the
            // content-hash check on next startup
            tracing::warn!("[background] shard write failed for '{uri}': {e}");
        }
        Ok(())
    }

    /// Purge a URI from every map and delete its shard.
    pub fn remove_file(&self, uri: &str) -> IndexResult<()> {
        let lock = self.uri_lock(uri);
        let _guard = lock.lock();

        if let Some(uri_id) = self.interner.lookup_uri(uri) {
            let mut state = self.state.write();
            Self::remove_entries(&mut state, uri_id);
            state.shards.remove(uri);
        }
        self.shard_cache.remove(uri);
        self.store.delete(uri)?;
        Ok(())
    }

    fn trim_cache(&self) {
        while self.shard_cache.len() > SHARD_CACHE_CAP {
            let victim = match self.shard_cache.iter().next() {
                Some(entry) => entry.key().clone(),
                None => break,
            };
            self.shard_cache.remove(&victim);
        }
    }

    /// Lazy-load a file's full record, via the cache when warm.
    pub fn indexed_file(&self, uri: &str) -> Option<Arc<IndexedFile>> {
        if let Some(cached) = self.shard_cache.get(uri) {
            return Some(cached.clone());
        }
        let bytes = self.store.load(uri).ok()??;
        let file = Arc::new(decode_shard(&bytes)?);
        self.shard_cache.insert(uri.to_string(), file.clone());
        self.trim_cache();
        Some(file)
    }

    // -- queries ------------------------------------------------------------

    /// All symbols with this exact name across the workspace.
    pub fn find_definitions(&self, name: &str) -> Vec<Symbol> {
        let Some(name_id) = self.interner.lookup_name(name) else {
            return Vec::new();
        };
        let uris = {
            let state = self.state.read();
            match state.symbol_names.get(&name_id) {
                Some(uris) => self.resolve_uris(uris),
                None => return Vec::new(),
            }
        };

        let mut found = Vec::new();
        for uri in uris {
            if let Some(file) = self.indexed_file(&uri) {
                found.extend(
                    file.symbols
                        .iter()
                        .filter(|s| s.name.as_ref() == name)
                        .cloned(),
                );
            }
        }
        found
    }

    /// URI that defines the symbol with this stable id, if any.
    pub fn find_definition_by_id(&self, symbol_id: &str) -> Option<String> {
        let state = self.state.read();
        let uri_id = state.symbol_ids.get(symbol_id)?;
        self.interner.resolve_uri(*uri_id).map(|u| u.to_string())
    }

    /// All references with this name, with the import-aware path: a file
    /// importing `name` under a local alias L also matches on its uses of
    /// L. Candidates are capped to bound tail latency.
    pub fn find_references_by_name(
        &self,
        name: &str,
        options: &FindReferencesOptions,
    ) -> Vec<Reference> {
        let Some(name_id) = self.interner.lookup_name(name) else {
            return Vec::new();
        };
        let mut uris = {
            let state = self.state.read();
            match state.references.get(&name_id) {
                Some(uris) => self.resolve_uris(uris),
                None => return Vec::new(),
            }
        };
        uris.sort();
        uris.truncate(REFERENCE_CANDIDATE_CAP);

        let mut found = Vec::new();
        for uri in uris {
            if options.exclude_uri.as_deref() == Some(uri.as_str()) {
                continue;
            }
            let Some(file) = self.indexed_file(&uri) else {
                continue;
            };
            crate::index::collect_references_matching(&file, name, options, &mut found);
        }
        found
    }

    pub fn file_symbols(&self, uri: &str) -> Vec<Symbol> {
        self.indexed_file(uri)
            .map(|f| f.symbols.clone())
            .unwrap_or_default()
    }

    /// Every defined name with the URIs defining it, for the fuzzy search
    /// candidate set.
    pub fn symbol_names_with_uris(&self) -> Vec<(String, Vec<String>)> {
        let state = self.state.read();
        state
            .symbol_names
            .iter()
            .filter_map(|(name_id, uris)| {
                let name = self.interner.resolve_name(*name_id)?;
                Some((name.to_string(), self.resolve_uris(uris)))
            })
            .collect()
    }

    fn resolve_uris(&self, uris: &HashSet<UriId>) -> Vec<String> {
        uris.iter()
            .filter_map(|id| self.interner.resolve_uri(*id))
            .map(|u| u.to_string())
            .collect()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.state.read().shards.contains_key(uri)
    }

    pub fn shard_mtime(&self, uri: &str) -> Option<u64> {
        self.state.read().shards.get(uri).map(|m| m.mtime)
    }

    // -- incremental pipeline ----------------------------------------------

    /// Bring the index up to date against the candidate file set.
    ///
    /// Exclusion gate first, then folder-digest skips, then per-file mtime
    /// comparison; stale and newly-excluded entries are purged; surviving
    /// work is dispatched through the pool, individual failures isolated.
    pub fn ensure_up_to_date(
        &self,
        workspace_root: &Path,
        all_files: &[PathBuf],
        progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
        cancel: &CancellationToken,
    ) -> IndexResult<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats {
            files_scanned: all_files.len(),
            ..Default::default()
        };
        let exclude = ExcludePolicy::from_settings(&self.settings);

        // Exclusion gate: no read, no hash, no task for excluded paths
        let candidates: Vec<&PathBuf> = all_files
            .iter()
            .filter(|path| !exclude.matches(path))
            .collect();

        // Folder digests, bottom-up; unchanged folders skip their files
        // without further inspection
        let hasher = FolderHasher::new(&exclude);
        let fresh_digests = hasher.digest_tree(workspace_root);
        let unchanged: HashSet<String> = {
            let state = self.state.read();
            unchanged_folders(&state.folder_digests, &fresh_digests)
                .into_iter()
                .collect()
        };

        let mut to_index: Vec<String> = Vec::new();
        for path in candidates {
            if cancel.is_cancelled() {
                self.persist_metadata(None)?;
                return Err(IndexError::Cancelled);
            }
            let parent = path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            if unchanged.contains(&parent) {
                stats.files_skipped += 1;
                continue;
            }
            let uri = path.to_string_lossy().into_owned();
            let mtime = std::fs::metadata(path)
                .map(|m| crate::utils::mtime_millis(&m))
                .unwrap_or(0);
            if self.shard_mtime(&uri) == Some(mtime) {
                stats.files_skipped += 1;
                continue;
            }
            to_index.push(uri);
        }

        // Remove entries for files gone from the candidate set or newly
        // matching the exclusion gate
        let current: HashSet<String> = all_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let stale: Vec<String> = {
            let state = self.state.read();
            state
                .shards
                .keys()
                .filter(|uri| !current.contains(*uri) || exclude.matches(Path::new(uri)))
                .cloned()
                .collect()
        };
        for uri in stale {
            if cancel.is_cancelled() {
                self.persist_metadata(None)?;
                return Err(IndexError::Cancelled);
            }
            self.remove_file(&uri)?;
            stats.files_removed += 1;
        }

        // Dispatch in waves so progress and cancellation interleave
        let total = to_index.len();
        let wave = (self.settings.indexing.max_concurrent_jobs * WAVE_FACTOR).max(1);
        let mut done = 0;
        for chunk in to_index.chunks(wave) {
            if cancel.is_cancelled() {
                self.persist_metadata(None)?;
                return Err(IndexError::Cancelled);
            }
            let handles: Vec<_> = chunk
                .iter()
                .map(|uri| {
                    (
                        uri.clone(),
                        self.pool.submit(ParseTask {
                            uri: uri.clone(),
                            text: None,
                        }),
                    )
                })
                .collect();

            for (uri, handle) in handles {
                match self.pool.wait(handle) {
                    Ok(file) => {
                        self.update_file(&uri, file)?;
                        stats.files_indexed += 1;
                    }
                    Err(e) => {
                        tracing::warn!("[background] indexing '{uri}' failed: {e}");
                        stats.files_failed += 1;
                    }
                }
                done += 1;
                if let Some(progress) = progress {
                    progress(done, total);
                }
            }
        }

        self.persist_metadata(Some(fresh_digests))?;
        self.check_cache_size();

        stats.elapsed = started.elapsed();
        tracing::info!("[background] {stats}");
        Ok(stats)
    }

    /// Re-index one file immediately, bypassing change detection. Used by
    /// the watcher for saves and debounced edits.
    pub fn reindex_file(&self, uri: &str, text: Option<String>) -> IndexResult<()> {
        let handle = self.pool.submit(ParseTask {
            uri: uri.to_string(),
            text,
        });
        let file = self.pool.wait(handle)?;
        self.update_file(uri, file)
    }

    /// Persist the metadata table; digests only update on a completed run
    /// so a cancelled scan re-examines what it never reached.
    fn persist_metadata(&self, fresh_digests: Option<DigestTable>) -> IndexResult<()> {
        let mut state = self.state.write();
        if let Some(digests) = fresh_digests {
            state.folder_digests = digests;
        }
        let meta = MetadataFile {
            shard_version: crate::storage::SHARD_VERSION,
            shards: state
                .shards
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            folder_digests: state.folder_digests.clone(),
        };
        drop(state);
        meta.save(&self.cache_dir)
    }

    /// Flush metadata on clean shutdown.
    pub fn shutdown(&self) {
        if let Err(e) = self.persist_metadata(None) {
            tracing::warn!("[background] metadata flush failed on shutdown: {e}");
        }
    }

    fn check_cache_size(&self) {
        let limit = self.settings.indexing.max_cache_size_mb * 1024 * 1024;
        let used = self.store.total_size_bytes();
        if used > limit {
            tracing::warn!(
                "[background] cache size {:.1} MB exceeds the {} MB limit",
                used as f64 / (1024.0 * 1024.0),
                self.settings.indexing.max_cache_size_mb
            );
        }
    }

    /// Drop all shards and reset resident state.
    pub fn clear(&self) -> IndexResult<()> {
        {
            let mut state = self.state.write();
            *state = IndexState::default();
        }
        self.shard_cache.clear();
        self.store.clear()?;
        self.persist_metadata(None)
    }

    pub fn stats(&self) -> BackgroundStats {
        let state = self.state.read();
        BackgroundStats {
            files: state.shards.len(),
            symbol_names: state.symbol_names.len(),
            symbol_ids: state.symbol_ids.len(),
            reference_names: state.references.len(),
            cache_size_bytes: self.store.total_size_bytes(),
            pool: self.pool.stats(),
        }
    }

    /// Convenience: scan the workspace and run the incremental pipeline.
    pub fn index_workspace(
        &self,
        workspace_root: &Path,
        cancel: &CancellationToken,
    ) -> IndexResult<IndexStats> {
        let scanner = FileScanner::new(self.settings.clone());
        let files = scanner.scan(workspace_root);
        self.ensure_up_to_date(workspace_root, &files, None, cancel)
    }
}
