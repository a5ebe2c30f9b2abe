//! Recursive property-chain resolution.
//!
//! Resolves `a.b.c` by reading `a`'s declaration initializer and walking
//! it structurally: object literals by key, factory calls through their
//! configuration object and the called function's return objects, and
//! identifier aliases by lookup. Every descent is bounded by a depth limit
//! and a visited set keyed on `(uri, offset)`; an optional type-backed
//! fallback gets a bounded slice of time when the structural walk gives up.

use crate::extractor::parse_source;
use crate::extractor::patterns::{PatternContext, object_property_value, property_key_text};
use crate::symbol::Symbol;
use crate::types::Location;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tree_sitter::Node;

const MAX_RESOLVE_DEPTH: usize = 10;

pub trait SymbolFinder {
    fn find_definitions(&self, name: &str) -> Vec<Symbol>;
}

impl SymbolFinder for crate::index::MergedIndex {
    fn find_definitions(&self, name: &str) -> Vec<Symbol> {
        crate::index::MergedIndex::find_definitions(self, name)
    }
}

pub trait SourceReader: Send + Sync {
    fn read(&self, uri: &str) -> Option<String>;
}

/// Default reader: the file on disk.
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, uri: &str) -> Option<String> {
        std::fs::read_to_string(uri).ok()
    }
}

/// Type-backed resolution delegate, available in hybrid mode.
pub trait TypeFallback: Send + Sync {
    fn resolve(&self, uri: &str, chain: &[String]) -> Option<Location>;
}

pub struct RecursiveResolver<'a> {
    finder: &'a dyn SymbolFinder,
    reader: &'a dyn SourceReader,
    fallback: Option<Arc<dyn TypeFallback>>,
    fallback_timeout: Duration,
    events_key: String,
}

impl<'a> RecursiveResolver<'a> {
    pub fn new(finder: &'a dyn SymbolFinder, reader: &'a dyn SourceReader) -> Self {
        Self {
            finder,
            reader,
            fallback: None,
            fallback_timeout: Duration::from_millis(200),
            events_key: "events".to_string(),
        }
    }

    pub fn with_fallback(
        mut self,
        fallback: Arc<dyn TypeFallback>,
        timeout: Duration,
    ) -> Self {
        self.fallback = Some(fallback);
        self.fallback_timeout = timeout;
        self
    }

    pub fn with_events_key(mut self, key: impl Into<String>) -> Self {
        self.events_key = key.into();
        self
    }

    /// Resolve the property chain starting at `base`'s declaration.
    pub fn resolve_chain(&self, base: &Symbol, chain: &[&str]) -> Option<Location> {
        let mut visited = HashSet::new();
        self.resolve_symbol(base, chain, 0, &mut visited)
    }

    fn resolve_symbol(
        &self,
        symbol: &Symbol,
        chain: &[&str],
        depth: usize,
        visited: &mut HashSet<(String, usize)>,
    ) -> Option<Location> {
        if depth > MAX_RESOLVE_DEPTH {
            return None;
        }
        if chain.is_empty() {
            return Some(symbol.location.clone());
        }

        let uri = symbol.location.uri.clone();
        let code = self.reader.read(&uri)?;
        let tree = parse_source(&uri, &code)?;
        let Some(decl) = find_declaration_value(tree.root_node(), &code, symbol) else {
            return self.try_fallback(&uri, chain);
        };
        self.resolve_in_node(&uri, &code, decl, chain, depth, visited)
    }

    fn resolve_in_node(
        &self,
        uri: &str,
        code: &str,
        node: Node,
        chain: &[&str],
        depth: usize,
        visited: &mut HashSet<(String, usize)>,
    ) -> Option<Location> {
        if depth > MAX_RESOLVE_DEPTH || chain.is_empty() {
            return None;
        }
        if !visited.insert((uri.to_string(), node.start_byte())) {
            return None;
        }

        let ctx = PatternContext { uri, code };
        let head = chain[0];
        let rest = &chain[1..];

        match node.kind() {
            "object" => {
                let (key, value) = object_entry(node, head, &ctx)?;
                if rest.is_empty() {
                    Some(node_location(uri, key))
                } else {
                    self.resolve_in_node(uri, code, value, rest, depth + 1, visited)
                }
            }
            "call_expression" => {
                // Factory configuration object: { ..., events: { head: … } }
                if let Some(args) = node.child_by_field_name("arguments")
                    && let Some(first) = first_named_of_kind(args, "object")
                    && let Some(events) = object_property_value(first, &self.events_key, &ctx)
                    && events.kind() == "object"
                    && let Some((key, value)) = object_entry(events, head, &ctx)
                {
                    return if rest.is_empty() {
                        Some(node_location(uri, key))
                    } else {
                        self.resolve_in_node(uri, code, value, rest, depth + 1, visited)
                    };
                }

                // Returned objects of the called function
                let callee = node.child_by_field_name("function")?;
                if callee.kind() == "identifier" {
                    let callee_name = &code[callee.byte_range()];
                    if let Some(function) = find_function_by_name(root_of(node), code, callee_name)
                        && let Some(found) =
                            self.resolve_through_returns(uri, code, function, chain, depth, visited)
                    {
                        return Some(found);
                    }
                    for definition in self.finder.find_definitions(callee_name) {
                        if definition.kind.is_callable()
                            && let Some(found) =
                                self.resolve_symbol(&definition, chain, depth + 1, visited)
                        {
                            return Some(found);
                        }
                    }
                }
                self.try_fallback(uri, chain)
            }
            "identifier" => {
                // Alias: look the name up and continue with the same chain
                let alias = &code[node.byte_range()];
                let mut definitions = self.finder.find_definitions(alias);
                definitions.sort_by_key(|s| s.location.uri != uri);
                for definition in definitions {
                    if let Some(found) =
                        self.resolve_symbol(&definition, chain, depth + 1, visited)
                    {
                        return Some(found);
                    }
                }
                None
            }
            "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "function"
            | "arrow_function"
            | "method_definition" => {
                self.resolve_through_returns(uri, code, node, chain, depth, visited)
            }
            "parenthesized_expression" | "await_expression" => {
                let inner = node.named_child(0)?;
                self.resolve_in_node(uri, code, inner, chain, depth, visited)
            }
            "as_expression" | "satisfies_expression" | "non_null_expression" => {
                let inner = node.named_child(0)?;
                self.resolve_in_node(uri, code, inner, chain, depth, visited)
            }
            _ => self.try_fallback(uri, chain),
        }
    }

    /// Search each `return <object-literal>` of a function body for the
    /// chain head. Arrow expression bodies count as an implicit return.
    fn resolve_through_returns(
        &self,
        uri: &str,
        code: &str,
        function: Node,
        chain: &[&str],
        depth: usize,
        visited: &mut HashSet<(String, usize)>,
    ) -> Option<Location> {
        let body = function.child_by_field_name("body")?;
        if body.kind() != "statement_block" {
            // Arrow shorthand: body is the returned expression
            return self.resolve_in_node(uri, code, unwrap_parens(body), chain, depth + 1, visited);
        }

        let mut returns = Vec::new();
        collect_returns(body, &mut returns);
        for returned in returns {
            let value = unwrap_parens(returned);
            if value.kind() == "object"
                && let Some(found) =
                    self.resolve_in_node(uri, code, value, chain, depth + 1, visited)
            {
                return Some(found);
            }
        }
        None
    }

    /// Run the fallback on its own thread so a slow delegate cannot stall
    /// the query past its budget.
    fn try_fallback(&self, uri: &str, chain: &[&str]) -> Option<Location> {
        let fallback = self.fallback.clone()?;
        let uri_owned = uri.to_string();
        let chain: Vec<String> = chain.iter().map(|s| s.to_string()).collect();
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let _ = tx.send(fallback.resolve(&uri_owned, &chain));
        });
        match rx.recv_timeout(self.fallback_timeout) {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("[resolver] type fallback timed out for '{uri}'");
                None
            }
        }
    }
}

fn node_location(uri: &str, node: Node) -> Location {
    let start = node.start_position();
    Location::new(uri, start.row as u32, start.column as u32)
}

fn root_of(node: Node) -> Node {
    let mut current = node;
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

fn first_named_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).find(|c| c.kind() == kind)
}

/// Key and value nodes of the named property in an object literal.
fn object_entry<'t>(
    object: Node<'t>,
    key_name: &str,
    ctx: &PatternContext,
) -> Option<(Node<'t>, Node<'t>)> {
    let mut cursor = object.walk();
    for pair in object.named_children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let key = pair.child_by_field_name("key")?;
        if property_key_text(key, ctx).as_deref() == Some(key_name) {
            let value = pair.child_by_field_name("value")?;
            return Some((key, value));
        }
    }
    None
}

fn unwrap_parens(node: Node) -> Node {
    let mut current = node;
    while current.kind() == "parenthesized_expression" {
        match current.named_child(0) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

fn collect_returns<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "return_statement" {
        if let Some(value) = node.named_child(0) {
            out.push(value);
        }
        return;
    }
    // Nested function bodies return for themselves
    if matches!(
        node.kind(),
        "function_declaration" | "function_expression" | "function" | "arrow_function"
    ) {
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_returns(child, out);
    }
}

fn find_function_by_name<'t>(root: Node<'t>, code: &str, name: &str) -> Option<Node<'t>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if matches!(
            node.kind(),
            "function_declaration" | "generator_function_declaration"
        ) && let Some(name_node) = node.child_by_field_name("name")
            && &code[name_node.byte_range()] == name
        {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    None
}

/// Locate the declaration that produced `symbol` and return the node its
/// resolution should descend into: the initializer for variables, fields,
/// and object properties; the node itself for callables.
fn find_declaration_value<'t>(root: Node<'t>, code: &str, symbol: &Symbol) -> Option<Node<'t>> {
    let target_line = symbol.location.line as usize;
    let name = symbol.name.as_ref();

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "variable_declarator" | "public_field_definition" | "field_definition" | "pair" => {
                let key = node
                    .child_by_field_name("name")
                    .or_else(|| node.child_by_field_name("key"))
                    .or_else(|| node.child_by_field_name("property"));
                if let Some(key) = key
                    && key.start_position().row == target_line
                    && &code[key.byte_range()] == name
                {
                    return node.child_by_field_name("value");
                }
            }
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                if let Some(key) = node.child_by_field_name("name")
                    && key.start_position().row == target_line
                    && &code[key.byte_range()] == name
                {
                    return Some(node);
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractorFactory, Language as ExtractLanguage};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct MapFinder {
        definitions: HashMap<String, Vec<Symbol>>,
    }

    impl SymbolFinder for MapFinder {
        fn find_definitions(&self, name: &str) -> Vec<Symbol> {
            self.definitions.get(name).cloned().unwrap_or_default()
        }
    }

    /// Extract real symbols from files on disk and index them by name.
    fn finder_for(files: &[&Path]) -> MapFinder {
        let factory = ExtractorFactory::new();
        let mut definitions: HashMap<String, Vec<Symbol>> = HashMap::new();
        for path in files {
            let language = ExtractLanguage::from_path(path).unwrap();
            let mut extractor = factory.create(language).unwrap();
            let code = fs::read_to_string(path).unwrap();
            let extracted = extractor
                .extract(&code, path.to_str().unwrap(), 0)
                .unwrap();
            for symbol in extracted.symbols {
                definitions
                    .entry(symbol.name.to_string())
                    .or_default()
                    .push(symbol);
            }
        }
        MapFinder { definitions }
    }

    fn base_symbol(finder: &MapFinder, name: &str) -> Symbol {
        finder.definitions[name][0].clone()
    }

    #[test]
    fn test_object_literal_chain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf.ts");
        fs::write(
            &path,
            "export const config = { server: { port: 8080 } };\n",
        )
        .unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader);

        let found = resolver
            .resolve_chain(&base_symbol(&finder, "config"), &["server", "port"])
            .unwrap();
        assert_eq!(found.uri, path.to_str().unwrap());
        // Points at the `port` key, not at `config`
        assert_eq!(found.line, 0);
        assert!(found.character > 30);
    }

    #[test]
    fn test_factory_events_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("act.ts");
        fs::write(
            &path,
            "export const Group = createActionGroup({ source: \"S\", events: { opened: emptyProps() } });\n",
        )
        .unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader);

        let found = resolver
            .resolve_chain(&base_symbol(&finder, "Group"), &["opened"])
            .unwrap();
        assert_eq!(found.uri, path.to_str().unwrap());
        let code = fs::read_to_string(&path).unwrap();
        let line = code.lines().next().unwrap();
        assert_eq!(found.character as usize, line.find("opened").unwrap());
    }

    #[test]
    fn test_function_return_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("api.ts");
        fs::write(
            &path,
            "function makeApi() {\n  return { fetch: () => 1 };\n}\nexport const api = makeApi();\n",
        )
        .unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader);

        let found = resolver
            .resolve_chain(&base_symbol(&finder, "api"), &["fetch"])
            .unwrap();
        assert_eq!(found.line, 1);
    }

    #[test]
    fn test_identifier_alias() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alias.ts");
        fs::write(
            &path,
            "const original = { deep: { leaf: 1 } };\nexport const alias = original;\n",
        )
        .unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader);

        let found = resolver
            .resolve_chain(&base_symbol(&finder, "alias"), &["deep", "leaf"])
            .unwrap();
        assert_eq!(found.line, 0);
    }

    #[test]
    fn test_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cycle.ts");
        fs::write(&path, "export const a = b;\nexport const b = a;\n").unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader);

        // Must terminate, not recurse forever
        assert!(
            resolver
                .resolve_chain(&base_symbol(&finder, "a"), &["x"])
                .is_none()
        );
    }

    #[test]
    fn test_missing_property_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf.ts");
        fs::write(&path, "export const config = { present: 1 };\n").unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader);
        assert!(
            resolver
                .resolve_chain(&base_symbol(&finder, "config"), &["absent"])
                .is_none()
        );
    }

    #[test]
    fn test_fallback_timeout_degrades_to_none() {
        struct SlowFallback;
        impl TypeFallback for SlowFallback {
            fn resolve(&self, _uri: &str, _chain: &[String]) -> Option<Location> {
                std::thread::sleep(Duration::from_millis(500));
                Some(Location::new("/never", 0, 0))
            }
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("op.ts");
        // An initializer the structural walk cannot handle
        fs::write(&path, "export const blob = 1 + 2;\n").unwrap();

        let finder = finder_for(&[&path]);
        let resolver = RecursiveResolver::new(&finder, &FsReader)
            .with_fallback(Arc::new(SlowFallback), Duration::from_millis(30));

        let started = std::time::Instant::now();
        assert!(
            resolver
                .resolve_chain(&base_symbol(&finder, "blob"), &["x"])
                .is_none()
        );
        assert!(started.elapsed() < Duration::from_millis(300));
    }
}
