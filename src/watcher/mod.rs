//! Keeps the background index fresh under live edits.
//!
//! Four inputs: editor change events, editor save events, out-of-band
//! filesystem events (via notify, and VCS change sets when git integration
//! is on), and deletions. Changes debounce per URI; a save cancels the
//! pending timer and re-indexes immediately; a delete cancels and purges.
//! An in-progress set prevents overlapping re-indexes of one URI; a second
//! trigger during execution defers until completion.

pub mod debouncer;

pub use debouncer::Debouncer;

use crate::index::BackgroundIndex;
use crate::scanner::walker::has_indexable_extension;
use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::{DashMap, DashSet};
use notify::{RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the loop sweeps the debouncer for ready URIs.
const TICK_MS: u64 = 50;

#[derive(Debug)]
enum WatchEvent {
    Changed { uri: String, text: Option<String> },
    Saved { uri: String, text: Option<String> },
    External { uri: String },
    Deleted { uri: String },
    Shutdown,
}

pub struct FileWatcher {
    tx: Sender<WatchEvent>,
    handle: Option<JoinHandle<()>>,
    fs_watcher: Option<notify::RecommendedWatcher>,
}

impl FileWatcher {
    pub fn spawn(index: Arc<BackgroundIndex>, debounce_ms: u64) -> Self {
        let (tx, rx) = unbounded();
        let handle = std::thread::spawn(move || run_loop(index, rx, debounce_ms));
        Self {
            tx,
            handle: Some(handle),
            fs_watcher: None,
        }
    }

    /// Subscribe to out-of-band filesystem events under `root`.
    pub fn watch_filesystem(&mut self, root: &Path) -> notify::Result<()> {
        let tx = self.tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                let Ok(event) = result else {
                    return;
                };
                for path in &event.paths {
                    if !has_indexable_extension(path) {
                        continue;
                    }
                    let uri = path.to_string_lossy().into_owned();
                    let send = match event.kind {
                        notify::EventKind::Remove(_) => WatchEvent::Deleted { uri },
                        _ => WatchEvent::External { uri },
                    };
                    let _ = tx.send(send);
                }
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        self.fs_watcher = Some(watcher);
        Ok(())
    }

    /// Editor buffer changed; re-index after the debounce window.
    pub fn notify_change(&self, uri: &str, text: Option<String>) {
        let _ = self.tx.send(WatchEvent::Changed {
            uri: uri.to_string(),
            text,
        });
    }

    /// Editor saved; cancel any pending timer and re-index now.
    pub fn notify_save(&self, uri: &str, text: Option<String>) {
        let _ = self.tx.send(WatchEvent::Saved {
            uri: uri.to_string(),
            text,
        });
    }

    pub fn notify_delete(&self, uri: &str) {
        let _ = self.tx.send(WatchEvent::Deleted {
            uri: uri.to_string(),
        });
    }

    /// Change set from an external VCS watcher (git integration).
    pub fn notify_external_changes<I, S>(&self, uris: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for uri in uris {
            let _ = self.tx.send(WatchEvent::External { uri: uri.into() });
        }
    }

    pub fn stop(mut self) {
        let _ = self.tx.send(WatchEvent::Shutdown);
        self.fs_watcher = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(index: Arc<BackgroundIndex>, rx: Receiver<WatchEvent>, debounce_ms: u64) {
    let mut debouncer = Debouncer::new(debounce_ms);
    let mut pending_text: HashMap<String, Option<String>> = HashMap::new();
    let in_progress: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let deferred: Arc<DashMap<String, Option<String>>> = Arc::new(DashMap::new());

    crate::log_event!("watcher", "started");

    loop {
        match rx.recv_timeout(Duration::from_millis(TICK_MS)) {
            Ok(WatchEvent::Shutdown) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                break;
            }
            Ok(WatchEvent::Changed { uri, text }) => {
                debouncer.touch(&uri);
                pending_text.insert(uri, text);
            }
            Ok(WatchEvent::External { uri }) => {
                crate::debug_event!("watcher", "external change: {uri}");
                debouncer.touch(&uri);
                pending_text.insert(uri, None);
            }
            Ok(WatchEvent::Saved { uri, text }) => {
                debouncer.cancel(&uri);
                pending_text.remove(&uri);
                schedule_reindex(&index, &in_progress, &deferred, uri, text);
            }
            Ok(WatchEvent::Deleted { uri }) => {
                debouncer.cancel(&uri);
                pending_text.remove(&uri);
                deferred.remove(&uri);
                crate::log_event!("watcher", "deleted {uri}");
                if let Err(e) = index.remove_file(&uri) {
                    tracing::warn!("[watcher] removal of '{uri}' failed: {e}");
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
        }

        for uri in debouncer.drain_ready() {
            let text = pending_text.remove(&uri).flatten();
            schedule_reindex(&index, &in_progress, &deferred, uri, text);
        }
    }

    crate::log_event!("watcher", "stopped");
}

/// Run one re-index off the event loop. A URI already being indexed defers
/// its new trigger until the running one completes.
fn schedule_reindex(
    index: &Arc<BackgroundIndex>,
    in_progress: &Arc<DashSet<String>>,
    deferred: &Arc<DashMap<String, Option<String>>>,
    uri: String,
    text: Option<String>,
) {
    if !in_progress.insert(uri.clone()) {
        deferred.insert(uri, text);
        return;
    }

    let index = index.clone();
    let in_progress = in_progress.clone();
    let deferred = deferred.clone();
    std::thread::spawn(move || {
        let mut next = Some(text);
        while let Some(text) = next.take() {
            if let Err(e) = index.reindex_file(&uri, text) {
                tracing::warn!("[watcher] re-index of '{uri}' failed: {e}");
            }
            if let Some((_, text)) = deferred.remove(&uri) {
                next = Some(text);
                continue;
            }
            in_progress.remove(&uri);
            // A trigger may have slipped in between the check and the
            // removal; claim it back if so
            if let Some((_, text)) = deferred.remove(&uri)
                && in_progress.insert(uri.clone())
            {
                next = Some(text);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn background(dir: &TempDir) -> Arc<BackgroundIndex> {
        Arc::new(
            BackgroundIndex::init(
                Arc::new(Settings::default()),
                dir.path().join(".smart-index"),
            )
            .unwrap(),
        )
    }

    fn wait_for(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_debounced_change_reindexes() {
        let dir = TempDir::new().unwrap();
        let index = background(&dir);
        let path = dir.path().join("a.ts");
        fs::write(&path, "export function fresh() {}").unwrap();
        let uri = path.to_string_lossy().into_owned();

        let watcher = FileWatcher::spawn(index.clone(), 40);
        watcher.notify_change(&uri, None);

        assert!(wait_for(2000, || !index.find_definitions("fresh").is_empty()));
        watcher.stop();
    }

    #[test]
    fn test_save_bypasses_debounce() {
        let dir = TempDir::new().unwrap();
        let index = background(&dir);
        let path = dir.path().join("a.ts");
        fs::write(&path, "export function onSave() {}").unwrap();
        let uri = path.to_string_lossy().into_owned();

        // Long debounce; the save must not wait for it
        let watcher = FileWatcher::spawn(index.clone(), 10_000);
        watcher.notify_save(&uri, None);

        assert!(wait_for(2000, || !index.find_definitions("onSave").is_empty()));
        watcher.stop();
    }

    #[test]
    fn test_delete_purges() {
        let dir = TempDir::new().unwrap();
        let index = background(&dir);
        let path = dir.path().join("a.ts");
        fs::write(&path, "export function gone() {}").unwrap();
        let uri = path.to_string_lossy().into_owned();

        index.reindex_file(&uri, None).unwrap();
        assert_eq!(index.find_definitions("gone").len(), 1);

        let watcher = FileWatcher::spawn(index.clone(), 40);
        watcher.notify_delete(&uri);

        assert!(wait_for(2000, || index.find_definitions("gone").is_empty()));
        assert!(!index.contains(&uri));
        watcher.stop();
    }

    #[test]
    fn test_unsaved_buffer_overrides_disk() {
        let dir = TempDir::new().unwrap();
        let index = background(&dir);
        let path = dir.path().join("a.ts");
        fs::write(&path, "export function onDisk() {}").unwrap();
        let uri = path.to_string_lossy().into_owned();

        let watcher = FileWatcher::spawn(index.clone(), 40);
        watcher.notify_change(&uri, Some("export function inBuffer() {}".to_string()));

        assert!(wait_for(2000, || !index
            .find_definitions("inBuffer")
            .is_empty()));
        assert!(index.find_definitions("onDisk").is_empty());
        watcher.stop();
    }
}
