//! Fuzzy workspace symbol search with ranking and context boosts.

use parking_lot::Mutex;
use smartindex::config::Settings;
use smartindex::extractor::ExtractorFactory;
use smartindex::index::{BackgroundIndex, DynamicIndex, MergedIndex};
use smartindex::query::{QueryContext, QueryEngine};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn engine_for(dir: &TempDir, files: &[(&str, &str)]) -> QueryEngine {
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    let settings = Arc::new(Settings::default());
    let background = Arc::new(
        BackgroundIndex::init(settings.clone(), dir.path().join(".smart-index")).unwrap(),
    );
    for (name, _) in files {
        let uri = dir.path().join(name).to_string_lossy().into_owned();
        background.reindex_file(&uri, None).unwrap();
    }
    let dynamic = Arc::new(Mutex::new(DynamicIndex::new(ExtractorFactory::new())));
    QueryEngine::new(
        settings,
        dir.path().to_path_buf(),
        MergedIndex::new(dynamic, background),
    )
}

#[test]
fn acronym_query_ranks_camel_case_first() {
    let dir = TempDir::new().unwrap();
    let engine = engine_for(
        &dir,
        &[
            ("a.ts", "export class CompatFieldAdapter {}\n"),
            ("b.ts", "export function commonFileAccess() {}\n"),
        ],
    );

    let found = engine.search_symbols("CFA", 10, &QueryContext::default());
    let names: Vec<&str> = found.iter().map(|s| s.name.as_ref()).collect();

    let camel = names.iter().position(|n| *n == "CompatFieldAdapter");
    let flat = names.iter().position(|n| *n == "commonFileAccess");
    assert!(camel.is_some() && flat.is_some(), "both candidates: {names:?}");
    assert!(
        camel.unwrap() < flat.unwrap(),
        "CompatFieldAdapter must rank strictly above commonFileAccess: {names:?}"
    );
}

#[test]
fn limit_truncates_results() {
    let dir = TempDir::new().unwrap();
    let mut sources = Vec::new();
    for i in 0..8 {
        sources.push((
            format!("m{i}.ts"),
            format!("export function loadThing{i}() {{}}\n"),
        ));
    }
    let borrowed: Vec<(&str, &str)> = sources
        .iter()
        .map(|(n, c)| (n.as_str(), c.as_str()))
        .collect();
    let engine = engine_for(&dir, &borrowed);

    let found = engine.search_symbols("loadThing", 3, &QueryContext::default());
    assert_eq!(found.len(), 3);
}

#[test]
fn open_file_boost_wins_over_identical_candidates() {
    let dir = TempDir::new().unwrap();
    let engine = engine_for(
        &dir,
        &[
            ("far/render.ts", "export function renderView() {}\n"),
            ("near/render.ts", "export function renderView() {}\n"),
        ],
    );

    let open = dir
        .path()
        .join("near/render.ts")
        .to_string_lossy()
        .into_owned();
    let ctx = QueryContext {
        deadline: None,
        open_uri: Some(open.clone()),
    };

    let found = engine.search_symbols("renderView", 10, &ctx);
    assert!(!found.is_empty());
    assert_eq!(found[0].location.uri, open);
}

#[test]
fn no_match_returns_empty() {
    let dir = TempDir::new().unwrap();
    let engine = engine_for(&dir, &[("a.ts", "export const alpha = 1;\n")]);
    assert!(
        engine
            .search_symbols("zzz", 10, &QueryContext::default())
            .is_empty()
    );
}
