//! Incremental pipeline behavior: mtime determinism, folder-digest skips,
//! and cooperative cancellation.

use smartindex::config::Settings;
use smartindex::index::BackgroundIndex;
use smartindex::scanner::FileScanner;
use smartindex::types::CancellationToken;
use smartindex::IndexError;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn settings_with_one_job() -> Arc<Settings> {
    let mut settings = Settings::default();
    settings.indexing.max_concurrent_jobs = 1;
    Arc::new(settings)
}

fn scan(settings: &Arc<Settings>, root: &std::path::Path) -> Vec<PathBuf> {
    FileScanner::new(settings.clone()).scan(root)
}

#[test]
fn unchanged_files_dispatch_no_work() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    for i in 0..5 {
        fs::write(root.join(format!("f{i}.ts")), format!("export const v{i} = {i};")).unwrap();
    }

    let settings = settings_with_one_job();
    let index =
        BackgroundIndex::init(settings.clone(), root.join(".smart-index")).unwrap();
    let files = scan(&settings, root);

    let first = index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(first.files_indexed, 5);

    let second = index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_failed, 0);
    assert_eq!(second.files_skipped, 5);
}

#[test]
fn unchanged_folder_skips_its_subtree() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("stable")).unwrap();
    fs::create_dir_all(root.join("busy")).unwrap();
    fs::write(root.join("stable/calm.ts"), "export const calm = 1;").unwrap();
    fs::write(root.join("busy/edit.ts"), "export const edit = 1;").unwrap();

    let settings = settings_with_one_job();
    let index =
        BackgroundIndex::init(settings.clone(), root.join(".smart-index")).unwrap();
    let files = scan(&settings, root);

    index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();

    // Touch only the busy folder; a coarse mtime clock needs real delta
    std::thread::sleep(std::time::Duration::from_millis(20));
    fs::write(root.join("busy/edit.ts"), "export const edit = 2;").unwrap();

    let second = index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(second.files_indexed, 1);
    assert_eq!(second.files_skipped, 1);
}

#[test]
fn removed_and_excluded_files_are_purged() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("keep.ts"), "export const keep = 1;").unwrap();
    fs::write(root.join("drop.ts"), "export const dropped = 1;").unwrap();

    let settings = settings_with_one_job();
    let index =
        BackgroundIndex::init(settings.clone(), root.join(".smart-index")).unwrap();
    let files = scan(&settings, root);
    index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(index.find_definitions("dropped").len(), 1);

    fs::remove_file(root.join("drop.ts")).unwrap();
    let files = scan(&settings, root);
    let second = index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();

    assert_eq!(second.files_removed, 1);
    assert!(index.find_definitions("dropped").is_empty());
    assert_eq!(index.find_definitions("keep").len(), 1);
}

#[test]
fn cancellation_is_clean_and_resumable() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let total = 12;
    for i in 0..total {
        fs::write(root.join(format!("f{i:02}.ts")), format!("export const c{i} = {i};")).unwrap();
    }

    let settings = settings_with_one_job();
    let index =
        BackgroundIndex::init(settings.clone(), root.join(".smart-index")).unwrap();
    let files = scan(&settings, root);

    // Cancel after the first completed file; the current wave drains, the
    // next never starts
    let cancel = CancellationToken::new();
    let seen = AtomicUsize::new(0);
    let cancel_in_progress = cancel.clone();
    let progress = move |_done: usize, _total: usize| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            cancel_in_progress.cancel();
        }
    };

    let outcome = index.ensure_up_to_date(root, &files, Some(&progress), &cancel);
    assert!(matches!(outcome, Err(IndexError::Cancelled)));

    let after_cancel = index.stats().files;
    assert!(after_cancel >= 1, "at least the first wave completed");
    assert!(after_cancel < total, "cancellation stopped the batch");

    // Re-run: completed URIs skip on mtime, the rest index
    let resumed = index
        .ensure_up_to_date(root, &files, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(resumed.files_skipped, after_cancel);
    assert_eq!(resumed.files_indexed, total - after_cancel);
    assert_eq!(index.stats().files, total);
}

#[test]
fn excluded_paths_never_reach_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("node_modules/lib")).unwrap();
    fs::write(root.join("node_modules/lib/index.js"), "module.exports = 1;").unwrap();
    fs::write(root.join("app.ts"), "export const app = 1;").unwrap();

    let settings = settings_with_one_job();
    let index =
        BackgroundIndex::init(settings.clone(), root.join(".smart-index")).unwrap();

    // Hand the gate an unfiltered list on purpose
    let all: Vec<PathBuf> = vec![
        root.join("node_modules/lib/index.js"),
        root.join("app.ts"),
    ];
    let stats = index
        .ensure_up_to_date(root, &all, None, &CancellationToken::new())
        .unwrap();

    assert_eq!(stats.files_indexed, 1);
    assert!(!index.contains(&root.join("node_modules/lib/index.js").to_string_lossy()));
}
