//! Worker pool for CPU-bound parsing.
//!
//! A FIFO queue over N worker threads. Tasks carry only a URI (plus an
//! optional unsaved text buffer) to keep cross-thread transfer small;
//! workers read the file, parse it, and hand an IndexedFile value back to
//! the coordinator. Workers never touch shared index state.
//!
//! A task that exceeds its deadline fails with a timeout and the pool
//! spawns a replacement worker; the stuck worker retires itself once its
//! parse finally completes. Worker panics fail only the task at hand.

use crate::error::{IndexError, IndexResult};
use crate::extractor::{ExtractorFactory, Language, SymbolExtractor};
use crate::symbol::IndexedFile;
use crate::utils::mtime_millis;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A unit of work: index one file.
#[derive(Debug, Clone)]
pub struct ParseTask {
    pub uri: String,
    /// In-memory buffer for unsaved edits; None means read from disk.
    pub text: Option<String>,
}

struct Envelope {
    task: ParseTask,
    result_tx: Sender<IndexResult<IndexedFile>>,
}

/// Pending result for a submitted task.
pub struct TaskHandle {
    uri: String,
    rx: Receiver<IndexResult<IndexedFile>>,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub processed: usize,
    pub errors: usize,
    pub queued: usize,
    pub idle: usize,
}

struct PoolShared {
    factory: ExtractorFactory,
    target_workers: AtomicUsize,
    active_workers: AtomicUsize,
    busy_workers: AtomicUsize,
    processed: AtomicUsize,
    errors: AtomicUsize,
}

pub struct WorkerPool {
    task_tx: Sender<Envelope>,
    task_rx: Receiver<Envelope>,
    shared: Arc<PoolShared>,
    task_timeout: Duration,
}

impl WorkerPool {
    /// `size` is clamped to 1..=16, matching the configuration contract.
    pub fn new(size: usize, task_timeout: Duration, factory: ExtractorFactory) -> Self {
        let size = size.clamp(1, 16);
        let (task_tx, task_rx) = unbounded();
        let shared = Arc::new(PoolShared {
            factory,
            target_workers: AtomicUsize::new(size),
            active_workers: AtomicUsize::new(0),
            busy_workers: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });

        let pool = Self {
            task_tx,
            task_rx,
            shared,
            task_timeout,
        };
        for _ in 0..size {
            pool.spawn_worker();
        }
        pool
    }

    pub fn with_default_size(task_timeout: Duration, factory: ExtractorFactory) -> Self {
        let size = num_cpus::get().saturating_sub(1).clamp(1, 16);
        Self::new(size, task_timeout, factory)
    }

    fn spawn_worker(&self) {
        let rx = self.task_rx.clone();
        let shared = self.shared.clone();
        shared.active_workers.fetch_add(1, Ordering::SeqCst);

        std::thread::spawn(move || {
            let mut extractors: HashMap<Language, SymbolExtractor> = HashMap::new();
            loop {
                // Retire surplus workers left behind by timeout replacement
                let active = shared.active_workers.load(Ordering::SeqCst);
                if active > shared.target_workers.load(Ordering::SeqCst) {
                    shared.active_workers.fetch_sub(1, Ordering::SeqCst);
                    return;
                }

                let Ok(envelope) = rx.recv() else {
                    shared.active_workers.fetch_sub(1, Ordering::SeqCst);
                    return;
                };

                shared.busy_workers.fetch_add(1, Ordering::SeqCst);
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    run_task(&shared.factory, &mut extractors, &envelope.task)
                }));
                shared.busy_workers.fetch_sub(1, Ordering::SeqCst);

                let result = match outcome {
                    Ok(result) => result,
                    Err(panic) => {
                        let reason = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "worker panicked".to_string());
                        tracing::error!(
                            "[pool] worker panicked on '{}': {reason}",
                            envelope.task.uri
                        );
                        Err(IndexError::WorkerPool { reason })
                    }
                };

                match &result {
                    Ok(_) => shared.processed.fetch_add(1, Ordering::SeqCst),
                    Err(_) => shared.errors.fetch_add(1, Ordering::SeqCst),
                };
                // Receiver may have timed out and gone away
                let _ = envelope.result_tx.send(result);
            }
        });
    }

    pub fn submit(&self, task: ParseTask) -> TaskHandle {
        let (result_tx, rx) = crossbeam_channel::bounded(1);
        let uri = task.uri.clone();
        let deadline = Instant::now() + self.task_timeout;
        // Send fails only after all workers are gone; the handle then
        // reports the disconnect
        let _ = self.task_tx.send(Envelope { task, result_tx });
        TaskHandle { uri, rx, deadline }
    }

    /// Wait for a task. A deadline miss terminates the wait, counts as a
    /// task failure, and provisions a replacement worker.
    pub fn wait(&self, handle: TaskHandle) -> IndexResult<IndexedFile> {
        let remaining = handle.deadline.saturating_duration_since(Instant::now());
        match handle.rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                self.shared.errors.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("[pool] task for '{}' timed out, replacing worker", handle.uri);
                self.spawn_worker();
                Err(IndexError::Timeout {
                    operation: format!("index {}", handle.uri),
                    millis: self.task_timeout.as_millis() as u64,
                })
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(IndexError::WorkerPool {
                reason: format!("worker dropped task for '{}'", handle.uri),
            }),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let active = self.shared.active_workers.load(Ordering::SeqCst);
        let busy = self.shared.busy_workers.load(Ordering::SeqCst);
        PoolStats {
            processed: self.shared.processed.load(Ordering::SeqCst),
            errors: self.shared.errors.load(Ordering::SeqCst),
            queued: self.task_tx.len(),
            idle: active.saturating_sub(busy),
        }
    }
}

fn run_task(
    factory: &ExtractorFactory,
    extractors: &mut HashMap<Language, SymbolExtractor>,
    task: &ParseTask,
) -> IndexResult<IndexedFile> {
    let path = Path::new(&task.uri);
    let Some(language) = Language::from_path(path) else {
        return Err(IndexError::General(format!(
            "no grammar for '{}'",
            task.uri
        )));
    };

    let mtime = std::fs::metadata(path).map(|m| mtime_millis(&m)).unwrap_or(0);
    let code = match &task.text {
        Some(text) => text.clone(),
        None => std::fs::read_to_string(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?,
    };

    let extractor = match extractors.entry(language) {
        std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
        std::collections::hash_map::Entry::Vacant(v) => v.insert(factory.create(language)?),
    };

    match extractor.extract(&code, &task.uri, mtime) {
        Ok(file) => Ok(file),
        Err(IndexError::Parse { uri, reason }) => {
            // Parse failures never abort a run: record an empty file with
            // the failure flagged
            tracing::warn!("[pool] parse failed for '{uri}': {reason}");
            Ok(IndexedFile::parse_failed(
                uri,
                mtime,
                crate::storage::SHARD_VERSION,
            ))
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pool(size: usize) -> WorkerPool {
        WorkerPool::new(size, Duration::from_secs(5), ExtractorFactory::new())
    }

    #[test]
    fn test_submit_and_wait() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.ts");
        fs::write(&path, "export function foo() {}").unwrap();

        let pool = pool(2);
        let handle = pool.submit(ParseTask {
            uri: path.to_string_lossy().into_owned(),
            text: None,
        });
        let file = pool.wait(handle).unwrap();
        assert_eq!(file.symbols.len(), 1);
        assert_eq!(file.symbols[0].name.as_ref(), "foo");

        let stats = pool.stats();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_text_buffer_overrides_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.ts");
        fs::write(&path, "export function onDisk() {}").unwrap();

        let pool = pool(1);
        let handle = pool.submit(ParseTask {
            uri: path.to_string_lossy().into_owned(),
            text: Some("export function inBuffer() {}".to_string()),
        });
        let file = pool.wait(handle).unwrap();
        assert_eq!(file.symbols[0].name.as_ref(), "inBuffer");
    }

    #[test]
    fn test_missing_file_fails_only_that_task() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.ts");
        fs::write(&good, "export const x = 1;").unwrap();

        let pool = pool(2);
        let bad_handle = pool.submit(ParseTask {
            uri: dir.path().join("missing.ts").to_string_lossy().into_owned(),
            text: None,
        });
        let good_handle = pool.submit(ParseTask {
            uri: good.to_string_lossy().into_owned(),
            text: None,
        });

        assert!(pool.wait(bad_handle).is_err());
        assert!(pool.wait(good_handle).is_ok());

        let stats = pool.stats();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_many_tasks_drain() {
        let dir = TempDir::new().unwrap();
        let pool = pool(4);

        let mut handles = Vec::new();
        for i in 0..32 {
            let path = dir.path().join(format!("f{i}.ts"));
            fs::write(&path, format!("export function fn{i}() {{}}")).unwrap();
            handles.push(pool.submit(ParseTask {
                uri: path.to_string_lossy().into_owned(),
                text: None,
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if pool.wait(handle).is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 32);
        assert_eq!(pool.stats().processed, 32);
    }
}
