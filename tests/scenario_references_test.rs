//! Scope-filtered and import-aware reference queries, end to end.

use parking_lot::Mutex;
use smartindex::config::Settings;
use smartindex::extractor::ExtractorFactory;
use smartindex::index::{BackgroundIndex, DynamicIndex, FindReferencesOptions, MergedIndex};
use smartindex::query::{QueryContext, QueryEngine};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    engine: QueryEngine,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
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
        let merged = MergedIndex::new(dynamic, background);
        let engine = QueryEngine::new(settings, dir.path().to_path_buf(), merged);
        Self { dir, engine }
    }

    fn uri(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }
}

#[test]
fn local_variables_are_filtered_by_exclude_local() {
    let ws = Workspace::new(&[
        ("a.ts", "function f(){ let temp = 1; return temp; }"),
        ("b.ts", "function g(){ let temp = 2; return temp; }"),
    ]);

    let excluded = ws.engine.merged().find_references_by_name(
        "temp",
        &FindReferencesOptions {
            exclude_local: true,
            ..Default::default()
        },
    );
    assert!(excluded.is_empty(), "locals must be excluded: {excluded:?}");

    let included = ws
        .engine
        .merged()
        .find_references_by_name("temp", &FindReferencesOptions::default());
    let uris: std::collections::HashSet<&str> = included
        .iter()
        .map(|r| r.location.uri.as_str())
        .collect();
    assert_eq!(included.len(), 2);
    assert_eq!(uris.len(), 2, "references must come from both files");
}

#[test]
fn renamed_import_references_resolve_back_to_original_name() {
    let ws = Workspace::new(&[
        ("u.ts", "export class User {}\n"),
        (
            "c.ts",
            "import { User as Admin } from \"./u\";\n\nconst a = new Admin();\n",
        ),
    ]);

    // One definition, in u.ts
    let definitions = ws
        .engine
        .find_definitions("User", &QueryContext::default());
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].location.uri, ws.uri("u.ts"));

    // References from the User token in u.ts must reach the Admin use in c.ts
    let source = fs::read_to_string(ws.uri("u.ts")).unwrap();
    let character = source.find("User").unwrap() as u32;
    let found = ws
        .engine
        .find_references(&ws.uri("u.ts"), 0, character, false, &QueryContext::default());

    assert!(
        found
            .iter()
            .any(|loc| loc.uri == ws.uri("c.ts") && loc.line == 2),
        "expected the renamed use in c.ts, got {found:?}"
    );
}

#[test]
fn results_are_deduplicated_and_near_duplicates_merged() {
    let ws = Workspace::new(&[
        ("def.ts", "export function widget() {}\n"),
        (
            "use.ts",
            "import { widget } from \"./def\";\nwidget();\nwidget();\n\n\n\nwidget();\n",
        ),
    ]);

    let source = fs::read_to_string(ws.uri("def.ts")).unwrap();
    let character = source.find("widget").unwrap() as u32;
    let found = ws
        .engine
        .find_references(&ws.uri("def.ts"), 0, character, true, &QueryContext::default());

    // No two results share (uri, line, character)
    let mut positions = std::collections::HashSet::new();
    for loc in &found {
        assert!(positions.insert((loc.uri.clone(), loc.line, loc.character)));
    }

    // No two results in the same file within two lines of each other
    for (i, a) in found.iter().enumerate() {
        for b in found.iter().skip(i + 1) {
            if a.uri == b.uri {
                assert!(
                    a.line.abs_diff(b.line) > 2,
                    "near-duplicates must merge: {a:?} vs {b:?}"
                );
            }
        }
    }
}

#[test]
fn scope_id_option_narrows_results() {
    let ws = Workspace::new(&[(
        "s.ts",
        "function outer(){ let v = 1; return v; }\nfunction other(){ let v = 2; return v; }\n",
    )]);

    let scoped = ws.engine.merged().find_references_by_name(
        "v",
        &FindReferencesOptions {
            scope_id: Some("outer".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].scope_id.as_ref(), "outer");
}

#[test]
fn exclude_uri_option_drops_that_file() {
    let ws = Workspace::new(&[
        ("a.ts", "export function shared() {}\nshared();\n"),
        ("b.ts", "import { shared } from \"./a\";\nshared();\n"),
    ]);

    let found = ws.engine.merged().find_references_by_name(
        "shared",
        &FindReferencesOptions {
            exclude_uri: Some(ws.uri("a.ts")),
            ..Default::default()
        },
    );
    assert!(found.iter().all(|r| r.location.uri != ws.uri("a.ts")));
    assert!(!found.is_empty());
}
