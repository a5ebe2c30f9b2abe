//! Startup reconciliation: headers rebuild the maps, unclaimed shards are
//! swept, version mismatches force a rebuild.

use smartindex::config::Settings;
use smartindex::extractor::{ExtractorFactory, Language};
use smartindex::index::{BackgroundIndex, FindReferencesOptions};
use smartindex::storage::{MetadataFile, ShardStore, encode_shard};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn open_index(dir: &TempDir) -> BackgroundIndex {
    BackgroundIndex::init(
        Arc::new(Settings::default()),
        dir.path().join(".smart-index"),
    )
    .unwrap()
}

#[test]
fn restart_rebuilds_maps_from_headers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("svc.ts");
    fs::write(
        &path,
        "export class OrderService { place(order) { validate(order); } }\n",
    )
    .unwrap();
    let uri = path.to_string_lossy().into_owned();

    {
        let index = open_index(&dir);
        index.reindex_file(&uri, None).unwrap();
        index.shutdown();
    }

    let reloaded = open_index(&dir);
    assert_eq!(reloaded.stats().files, 1);
    assert_eq!(reloaded.find_definitions("OrderService").len(), 1);
    assert_eq!(reloaded.find_definitions("place").len(), 1);
    assert_eq!(
        reloaded
            .find_references_by_name("validate", &FindReferencesOptions::default())
            .len(),
        1
    );

    // Lazy body load still works after the header-only startup
    let symbols = reloaded.file_symbols(&uri);
    assert!(symbols.iter().any(|s| s.name.as_ref() == "place"));
}

#[test]
fn unclaimed_shards_are_swept_on_startup() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join(".smart-index");

    let path = dir.path().join("real.ts");
    fs::write(&path, "export const real = 1;\n").unwrap();
    let uri = path.to_string_lossy().into_owned();

    {
        let index = open_index(&dir);
        index.reindex_file(&uri, None).unwrap();
        index.shutdown();
    }

    // A shard nobody's metadata claims (leftover from a crash)
    let store = ShardStore::new(cache.join("index"));
    let mut extractor = ExtractorFactory::new().create(Language::TypeScript).unwrap();
    let ghost = extractor
        .extract("export const ghost = 1;", "/w/ghost.ts", 0)
        .unwrap();
    store.save("/w/ghost.ts", &encode_shard(&ghost).unwrap()).unwrap();
    assert_eq!(store.list().len(), 2);

    let reloaded = open_index(&dir);
    assert_eq!(reloaded.stats().files, 1);
    assert_eq!(store.list().len(), 1, "ghost shard must be swept");
    assert!(reloaded.find_definitions("ghost").is_empty());
    assert_eq!(reloaded.find_definitions("real").len(), 1);
}

#[test]
fn metadata_version_mismatch_forces_rebuild() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join(".smart-index");

    let path = dir.path().join("a.ts");
    fs::write(&path, "export const a = 1;\n").unwrap();
    let uri = path.to_string_lossy().into_owned();

    {
        let index = open_index(&dir);
        index.reindex_file(&uri, None).unwrap();
        index.shutdown();
    }

    // Tamper: bump the persisted format version
    let mut meta = MetadataFile::load(&cache).unwrap().unwrap();
    meta.shard_version += 1;
    meta.save(&cache).unwrap();

    let reloaded = open_index(&dir);
    assert_eq!(reloaded.stats().files, 0, "mismatch must force a rebuild");
    assert!(ShardStore::new(cache.join("index")).list().is_empty());

    // Re-indexing repopulates cleanly
    reloaded.reindex_file(&uri, None).unwrap();
    assert_eq!(reloaded.find_definitions("a").len(), 1);
}
