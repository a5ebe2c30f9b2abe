//! Removing a file purges every trace: maps, queries, and the shard on
//! disk.

use smartindex::config::Settings;
use smartindex::index::{BackgroundIndex, FindReferencesOptions};
use smartindex::storage::ShardStore;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn removal_purges_maps_and_disk() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join(".smart-index");
    let index = BackgroundIndex::init(Arc::new(Settings::default()), cache.clone()).unwrap();

    let path = dir.path().join("victim.ts");
    let source = "export class Alpha {}\n\
                  export class Beta {}\n\
                  export function gamma() {}\n\
                  export const delta = 1;\n\
                  export const epsilon = 2;\n\
                  function caller() {\n\
                    gamma(); gamma();\n\
                    return new Alpha();\n\
                  }\n\
                  const x = new Beta();\n\
                  const y = delta + epsilon;\n";
    fs::write(&path, source).unwrap();
    let uri = path.to_string_lossy().into_owned();
    index.reindex_file(&uri, None).unwrap();

    let names = ["Alpha", "Beta", "gamma", "delta", "epsilon"];
    for name in names {
        assert!(!index.find_definitions(name).is_empty(), "{name} indexed");
    }
    assert!(
        !index
            .find_references_by_name("gamma", &FindReferencesOptions::default())
            .is_empty()
    );

    // The shard exists on disk before removal
    let store = ShardStore::new(cache.join("index"));
    assert!(store.shard_path(&uri).exists());

    index.remove_file(&uri).unwrap();

    for name in names {
        assert!(
            index.find_definitions(name).is_empty(),
            "{name} must be gone from definitions"
        );
        assert!(
            index
                .find_references_by_name(name, &FindReferencesOptions::default())
                .is_empty(),
            "{name} must be gone from references"
        );
    }
    assert!(!store.shard_path(&uri).exists(), "shard must be deleted");
    assert!(!index.contains(&uri));

    let stats = index.stats();
    assert_eq!(stats.files, 0);
    assert_eq!(stats.symbol_names, 0);
    assert_eq!(stats.reference_names, 0);
}

#[test]
fn removal_is_isolated_to_one_file() {
    let dir = TempDir::new().unwrap();
    let index = BackgroundIndex::init(
        Arc::new(Settings::default()),
        dir.path().join(".smart-index"),
    )
    .unwrap();

    let keep = dir.path().join("keep.ts");
    let drop = dir.path().join("drop.ts");
    fs::write(&keep, "export function survivor() {}\n").unwrap();
    fs::write(&drop, "export function casualty() {}\nsurvivor();\n").unwrap();

    let keep_uri = keep.to_string_lossy().into_owned();
    let drop_uri = drop.to_string_lossy().into_owned();
    index.reindex_file(&keep_uri, None).unwrap();
    index.reindex_file(&drop_uri, None).unwrap();

    index.remove_file(&drop_uri).unwrap();

    assert_eq!(index.find_definitions("survivor").len(), 1);
    assert!(index.find_definitions("casualty").is_empty());
    // The reference to survivor lived in the removed file
    assert!(
        index
            .find_references_by_name("survivor", &FindReferencesOptions::default())
            .is_empty()
    );
}
