//! Symbol extraction: one walk over a parsed tree produces the file's
//! symbol set, reference set, import set, and re-export set.
//!
//! Identifiers are classified as declarations (the naming position of a
//! declaration, a non-computed member key, a parameter, or an import
//! specifier) or references (everything else). Tree-sitter positions are
//! 0-based already and are stored as-is.

pub mod patterns;
pub mod scope;

use crate::error::{IndexError, IndexResult};
use crate::storage::SHARD_VERSION;
use crate::symbol::{
    Import, IndexedFile, MetadataMap, ReExport, ReExportNames, Reference, Symbol,
};
use crate::types::{Location, Range, SymbolKind};
use crate::utils::{calculate_hash, get_utc_timestamp, short_hash};
use patterns::{ActionGroupPattern, FrameworkPattern, PatternContext, property_key_text};
use scope::ScopeTracker;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// Recursion guard for degenerate inputs (deeply nested expressions).
const MAX_WALK_DEPTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            _ => None,
        }
    }

    pub(crate) fn grammar(&self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Creates extractors with a shared framework-pattern registry. Parsers are
/// Send but not Sync, so each worker creates its own extractor.
#[derive(Clone)]
pub struct ExtractorFactory {
    patterns: Arc<Vec<Box<dyn FrameworkPattern>>>,
}

impl Default for ExtractorFactory {
    fn default() -> Self {
        Self {
            patterns: Arc::new(vec![Box::new(ActionGroupPattern::default())]),
        }
    }
}

impl ExtractorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: Vec<Box<dyn FrameworkPattern>>) -> Self {
        Self {
            patterns: Arc::new(patterns),
        }
    }

    pub fn create(&self, language: Language) -> IndexResult<SymbolExtractor> {
        SymbolExtractor::new(language, self.patterns.clone())
    }

    pub fn create_for_path(&self, path: &Path) -> IndexResult<Option<SymbolExtractor>> {
        match Language::from_path(path) {
            Some(language) => Ok(Some(self.create(language)?)),
            None => Ok(None),
        }
    }
}

/// Parse a source string with the grammar matching the URI's extension.
/// Query-time helpers re-parse on demand; extraction keeps its own parser.
pub(crate) fn parse_source(uri: &str, code: &str) -> Option<tree_sitter::Tree> {
    let language = Language::from_path(Path::new(uri))?;
    let mut parser = Parser::new();
    parser.set_language(&language.grammar()).ok()?;
    parser.parse(code, None)
}

pub struct SymbolExtractor {
    parser: Parser,
    patterns: Arc<Vec<Box<dyn FrameworkPattern>>>,
}

impl SymbolExtractor {
    pub fn new(
        language: Language,
        patterns: Arc<Vec<Box<dyn FrameworkPattern>>>,
    ) -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| IndexError::General(format!("failed to load grammar: {e}")))?;
        Ok(Self { parser, patterns })
    }

    /// Produce the file's IndexedFile. Fails only when the parser cannot
    /// build a tree at all; syntax errors inside the tree are walked
    /// best-effort.
    pub fn extract(&mut self, code: &str, uri: &str, mtime: u64) -> IndexResult<IndexedFile> {
        let tree = self.parser.parse(code, None).ok_or_else(|| IndexError::Parse {
            uri: uri.to_string(),
            reason: "parser produced no tree".to_string(),
        })?;

        let mut walk = FileWalk::new(code, uri, &self.patterns);
        walk.walk(tree.root_node(), 0);

        Ok(IndexedFile {
            uri: uri.to_string(),
            content_hash: calculate_hash(code),
            mtime,
            symbols: walk.symbols,
            references: walk.references,
            imports: walk.imports,
            re_exports: walk.re_exports,
            last_indexed_at: get_utc_timestamp(),
            shard_version: SHARD_VERSION,
            metadata: MetadataMap::new(),
        })
    }
}

struct FileWalk<'a> {
    code: &'a str,
    uri: &'a str,
    file_hash: String,
    patterns: &'a [Box<dyn FrameworkPattern>],
    surfaced: HashSet<String>,
    scopes: ScopeTracker,
    containers: Vec<String>,
    id_ordinals: HashMap<String, u32>,
    symbols: Vec<Symbol>,
    references: Vec<Reference>,
    imports: Vec<Import>,
    re_exports: Vec<ReExport>,
}

impl<'a> FileWalk<'a> {
    fn new(code: &'a str, uri: &'a str, patterns: &'a [Box<dyn FrameworkPattern>]) -> Self {
        let surfaced = patterns
            .iter()
            .flat_map(|p| p.surfaced_properties())
            .map(|s| s.to_string())
            .collect();
        Self {
            code,
            uri,
            file_hash: short_hash(uri, 8),
            patterns,
            surfaced,
            scopes: ScopeTracker::new(),
            containers: Vec::new(),
            id_ordinals: HashMap::new(),
            symbols: Vec::new(),
            references: Vec::new(),
            imports: Vec::new(),
            re_exports: Vec::new(),
        }
    }

    fn text(&self, node: Node) -> &'a str {
        &self.code[node.byte_range()]
    }

    fn pattern_ctx(&self) -> PatternContext<'a> {
        PatternContext {
            uri: self.uri,
            code: self.code,
        }
    }

    fn node_range(node: Node) -> Range {
        let start = node.start_position();
        let end = node.end_position();
        Range::new(
            start.row as u32,
            start.column as u32,
            end.row as u32,
            end.column as u32,
        )
    }

    fn node_location(&self, node: Node) -> Location {
        let start = node.start_position();
        Location::new(self.uri, start.row as u32, start.column as u32)
    }

    fn walk(&mut self, node: Node, depth: usize) {
        if depth > MAX_WALK_DEPTH {
            tracing::warn!("[extractor] max walk depth reached in {}", self.uri);
            return;
        }
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                self.handle_function_declaration(node, depth)
            }
            "function_expression" | "function" => self.handle_function_expression(node, depth),
            "arrow_function" => self.handle_arrow(node, depth),
            "class_declaration" | "abstract_class_declaration" => self.handle_class(node, depth),
            "interface_declaration" => self.handle_interface(node, depth),
            "type_alias_declaration" => self.handle_type_alias(node, depth),
            "enum_declaration" => self.handle_enum(node, depth),
            "internal_module" => self.handle_namespace(node, depth),
            "lexical_declaration" | "variable_declaration" => {
                self.handle_variable_statement(node, depth)
            }
            "method_definition" => self.handle_method(node, depth),
            "method_signature" | "abstract_method_signature" => {
                self.handle_method_signature(node, depth)
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                self.handle_property(node, depth)
            }
            "import_statement" => self.handle_import(node),
            "export_statement" => self.handle_export(node, depth),
            "call_expression" => self.handle_call(node, depth),
            "member_expression" => self.handle_member(node, depth),
            "identifier" | "type_identifier" | "shorthand_property_identifier" => {
                self.record_reference(node, false)
            }
            // Labels, property keys outside member chains, bare keywords
            "property_identifier" | "statement_identifier" => {}
            "string" | "comment" | "number" | "regex" => {}
            _ => self.walk_children(node, depth),
        }
    }

    fn walk_children(&mut self, node: Node, depth: usize) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk(child, depth + 1);
        }
    }

    // -- declarations ------------------------------------------------------

    fn handle_function_declaration(&mut self, node: Node, depth: usize) {
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| self.text(n).to_string());
        let params = node.child_by_field_name("parameters");
        let params_count = params.map(count_parameters);

        if let (Some(name), Some(name_node)) = (&name, name_node) {
            self.scopes.bind(name);
            self.push_symbol(
                name,
                SymbolKind::Function,
                name_node,
                false,
                params_count,
                MetadataMap::new(),
            );
        }

        self.enter_callable(name.as_deref(), params, node, depth);
    }

    fn handle_function_expression(&mut self, node: Node, depth: usize) {
        // A named function expression binds its own name inside itself only;
        // it is not a declaration position.
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        let params = node.child_by_field_name("parameters");
        self.scopes.enter(name.as_deref());
        if let Some(ref name) = name {
            self.scopes.bind(name);
        }
        self.bind_parameters(params, depth);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, depth + 1);
        }
        self.scopes.exit();
    }

    fn handle_arrow(&mut self, node: Node, depth: usize) {
        let params = node.child_by_field_name("parameters");
        self.scopes.enter(None);
        self.bind_parameters(params, depth);
        // Single-parameter shorthand: `x => ...`
        if params.is_none()
            && let Some(param) = node.child_by_field_name("parameter")
            && param.kind() == "identifier"
        {
            let name = self.text(param).to_string();
            self.scopes.bind(&name);
            self.push_symbol(
                &name,
                SymbolKind::Parameter,
                param,
                false,
                None,
                MetadataMap::new(),
            );
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, depth + 1);
        }
        self.scopes.exit();
    }

    /// Common tail for named callables: enter the scope, bind parameters,
    /// walk the body under the callable's container.
    fn enter_callable(
        &mut self,
        name: Option<&str>,
        params: Option<Node>,
        node: Node,
        depth: usize,
    ) {
        self.scopes.enter(name);
        if let Some(name) = name {
            self.containers.push(name.to_string());
        }
        self.bind_parameters(params, depth);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, depth + 1);
        }
        if name.is_some() {
            self.containers.pop();
        }
        self.scopes.exit();
    }

    fn handle_class(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            // Anonymous class expression: just walk the body
            self.walk_children(node, depth);
            return;
        };
        let name = self.text(name_node).to_string();
        self.scopes.bind(&name);
        self.push_symbol(
            &name,
            SymbolKind::Class,
            name_node,
            false,
            None,
            MetadataMap::new(),
        );

        // Heritage clauses reference other types from the enclosing scope
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "class_heritage" {
                self.walk_children(child, depth + 1);
            }
        }

        self.scopes.enter(Some(&name));
        self.containers.push(name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body, depth + 1);
        }
        self.containers.pop();
        self.scopes.exit();
    }

    fn handle_interface(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        self.push_symbol(
            &name,
            SymbolKind::Interface,
            name_node,
            false,
            None,
            MetadataMap::new(),
        );
        self.containers.push(name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body, depth + 1);
        }
        self.containers.pop();
    }

    fn handle_type_alias(&mut self, node: Node, depth: usize) {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = self.text(name_node).to_string();
            self.push_symbol(
                &name,
                SymbolKind::TypeAlias,
                name_node,
                false,
                None,
                MetadataMap::new(),
            );
        }
        if let Some(value) = node.child_by_field_name("value") {
            self.walk(value, depth + 1);
        }
    }

    fn handle_enum(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        self.scopes.bind(&name);
        self.push_symbol(
            &name,
            SymbolKind::Enum,
            name_node,
            false,
            None,
            MetadataMap::new(),
        );

        self.containers.push(name);
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                let key = match member.kind() {
                    "enum_assignment" => member.child_by_field_name("name"),
                    "property_identifier" => Some(member),
                    _ => None,
                };
                if let Some(key) = key {
                    let member_name = self.text(key).to_string();
                    self.push_symbol(
                        &member_name,
                        SymbolKind::Property,
                        key,
                        false,
                        None,
                        MetadataMap::new(),
                    );
                }
                if member.kind() == "enum_assignment"
                    && let Some(value) = member.child_by_field_name("value")
                {
                    self.walk(value, depth + 1);
                }
            }
        }
        self.containers.pop();
    }

    fn handle_namespace(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        self.push_symbol(
            &name,
            SymbolKind::Namespace,
            name_node,
            false,
            None,
            MetadataMap::new(),
        );
        // Namespace members stay workspace-visible: container, not scope
        self.containers.push(name);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body, depth + 1);
        }
        self.containers.pop();
    }

    fn handle_variable_statement(&mut self, node: Node, depth: usize) {
        let is_const = node
            .child(0)
            .is_some_and(|c| c.kind() == "const");
        let kind = if is_const {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };

        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() == "variable_declarator" {
                self.handle_declarator(declarator, kind, depth);
            }
        }
    }

    fn handle_declarator(&mut self, node: Node, kind: SymbolKind, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let value = node.child_by_field_name("value");

        // CommonJS: const X = require("m") / const { A: B } = require("m")
        if let Some(value) = value
            && let Some(specifier) = require_specifier(value, self.code)
        {
            self.record_cjs_import(name_node, &specifier);
            return;
        }

        match name_node.kind() {
            "identifier" => {
                let name = self.text(name_node).to_string();
                self.scopes.bind(&name);

                let mut metadata = MetadataMap::new();
                let mut virtual_children = Vec::new();
                if let Some(value) = value
                    && value.kind() == "call_expression"
                {
                    let ctx = self.pattern_ctx();
                    for pattern in self.patterns {
                        if let Some(found) = pattern.on_call(&name, value, &ctx) {
                            metadata.extend(found.metadata);
                            virtual_children.extend(found.children);
                        }
                    }
                }

                self.push_symbol(&name, kind, name_node, false, None, metadata);

                let child_container = self.qualified(&name);
                for child in virtual_children {
                    self.push_symbol_at(
                        &child.name,
                        child.kind,
                        Location::new(self.uri, child.range.start_line, child.range.start_character),
                        child.range,
                        child_container.clone(),
                        Some(name.clone()),
                        child.is_static,
                        child.parameters_count,
                        MetadataMap::new(),
                    );
                }

                if let Some(value) = value {
                    self.containers.push(name);
                    self.walk(value, depth + 1);
                    self.containers.pop();
                }
            }
            "object_pattern" | "array_pattern" => {
                let mut bindings = Vec::new();
                collect_pattern_identifiers(name_node, &mut bindings);
                for binding in bindings {
                    let name = self.text(binding).to_string();
                    self.scopes.bind(&name);
                    self.push_symbol(&name, kind, binding, false, None, MetadataMap::new());
                }
                if let Some(value) = value {
                    self.walk(value, depth + 1);
                }
            }
            _ => {
                if let Some(value) = value {
                    self.walk(value, depth + 1);
                }
            }
        }
    }

    fn handle_method(&mut self, node: Node, depth: usize) {
        let Some(key) = node.child_by_field_name("name") else {
            return;
        };
        if key.kind() == "computed_property_name" {
            // Computed keys are not declaration positions; the inner
            // expression still references names
            self.walk_children(key, depth + 1);
            self.scopes.enter(None);
            self.bind_parameters(node.child_by_field_name("parameters"), depth);
            if let Some(body) = node.child_by_field_name("body") {
                self.walk(body, depth + 1);
            }
            self.scopes.exit();
            return;
        }

        let ctx = self.pattern_ctx();
        let Some(name) = property_key_text(key, &ctx) else {
            return;
        };
        let is_static = has_child_of_kind(node, "static");
        let params = node.child_by_field_name("parameters");
        let params_count = params.map(count_parameters);

        self.push_symbol(
            &name,
            SymbolKind::Method,
            key,
            is_static,
            params_count,
            MetadataMap::new(),
        );
        self.enter_callable(Some(&name), params, node, depth);
    }

    fn handle_method_signature(&mut self, node: Node, _depth: usize) {
        let Some(key) = node.child_by_field_name("name") else {
            return;
        };
        if key.kind() == "computed_property_name" {
            return;
        }
        let ctx = self.pattern_ctx();
        if let Some(name) = property_key_text(key, &ctx) {
            let is_static = has_child_of_kind(node, "static");
            let params_count = node.child_by_field_name("parameters").map(count_parameters);
            self.push_symbol(
                &name,
                SymbolKind::Method,
                key,
                is_static,
                params_count,
                MetadataMap::new(),
            );
        }
    }

    fn handle_property(&mut self, node: Node, depth: usize) {
        let key = node
            .child_by_field_name("name")
            .or_else(|| node.child_by_field_name("property"));
        let Some(key) = key else {
            return;
        };
        if key.kind() == "computed_property_name" {
            self.walk_children(key, depth + 1);
            if let Some(value) = node.child_by_field_name("value") {
                self.walk(value, depth + 1);
            }
            return;
        }

        let ctx = self.pattern_ctx();
        let Some(name) = property_key_text(key, &ctx) else {
            return;
        };
        let is_static = has_child_of_kind(node, "static");

        let mut metadata = MetadataMap::new();
        for pattern in self.patterns {
            if let Some(found) = pattern.on_property(&name, node, &ctx) {
                metadata.extend(found.metadata);
            }
        }

        self.push_symbol(&name, SymbolKind::Property, key, is_static, None, metadata);

        if let Some(value) = node.child_by_field_name("value") {
            self.containers.push(name);
            self.walk(value, depth + 1);
            self.containers.pop();
        }
    }

    // -- imports and exports -----------------------------------------------

    fn handle_import(&mut self, node: Node) {
        let Some(specifier) = node
            .child_by_field_name("source")
            .map(|s| strip_quotes(self.text(s)))
        else {
            return;
        };

        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if clause.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = clause.walk();
            for child in clause.named_children(&mut clause_cursor) {
                match child.kind() {
                    "identifier" => {
                        let local = self.text(child).to_string();
                        self.record_reference(child, true);
                        self.imports.push(Import {
                            local_name: local.into(),
                            module_specifier: specifier.clone().into(),
                            exported_name: None,
                            is_default: true,
                            is_namespace: false,
                            is_dynamic: false,
                            is_cjs: false,
                        });
                    }
                    "namespace_import" => {
                        if let Some(local_node) = first_child_of_kind(child, "identifier") {
                            let local = self.text(local_node).to_string();
                            self.record_reference(local_node, true);
                            self.imports.push(Import {
                                local_name: local.into(),
                                module_specifier: specifier.clone().into(),
                                exported_name: None,
                                is_default: false,
                                is_namespace: true,
                                is_dynamic: false,
                                is_cjs: false,
                            });
                        }
                    }
                    "named_imports" => {
                        let mut spec_cursor = child.walk();
                        for import_spec in child.named_children(&mut spec_cursor) {
                            if import_spec.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name_node) = import_spec.child_by_field_name("name") else {
                                continue;
                            };
                            let exported = self.text(name_node).to_string();
                            let alias = import_spec
                                .child_by_field_name("alias")
                                .map(|a| self.text(a).to_string());
                            self.record_reference(name_node, true);
                            self.imports.push(Import {
                                local_name: alias.clone().unwrap_or_else(|| exported.clone()).into(),
                                module_specifier: specifier.clone().into(),
                                exported_name: alias.is_some().then(|| exported.into()),
                                is_default: false,
                                is_namespace: false,
                                is_dynamic: false,
                                is_cjs: false,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn record_cjs_import(&mut self, name_node: Node, specifier: &str) {
        match name_node.kind() {
            "identifier" => {
                let local = self.text(name_node).to_string();
                self.imports.push(Import {
                    local_name: local.into(),
                    module_specifier: specifier.to_string().into(),
                    exported_name: None,
                    is_default: false,
                    is_namespace: true,
                    is_dynamic: false,
                    is_cjs: true,
                });
            }
            "object_pattern" => {
                let mut cursor = name_node.walk();
                for prop in name_node.named_children(&mut cursor) {
                    match prop.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = self.text(prop).to_string();
                            self.record_reference(prop, true);
                            self.imports.push(Import {
                                local_name: name.into(),
                                module_specifier: specifier.to_string().into(),
                                exported_name: None,
                                is_default: false,
                                is_namespace: false,
                                is_dynamic: false,
                                is_cjs: true,
                            });
                        }
                        "pair_pattern" => {
                            let key = prop.child_by_field_name("key");
                            let value = prop.child_by_field_name("value");
                            if let (Some(key), Some(value)) = (key, value)
                                && value.kind() == "identifier"
                            {
                                let exported = self.text(key).to_string();
                                self.record_reference(key, true);
                                self.imports.push(Import {
                                    local_name: self.text(value).to_string().into(),
                                    module_specifier: specifier.to_string().into(),
                                    exported_name: Some(exported.into()),
                                    is_default: false,
                                    is_namespace: false,
                                    is_dynamic: false,
                                    is_cjs: true,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_export(&mut self, node: Node, depth: usize) {
        let source = node
            .child_by_field_name("source")
            .map(|s| strip_quotes(self.text(s)));

        let Some(specifier) = source else {
            // export const/class/function, export { X }, export default expr
            self.walk_children(node, depth);
            return;
        };

        let mut star = false;
        let mut as_name = None;
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "*" => star = true,
                "namespace_export" => {
                    star = true;
                    as_name = first_child_of_kind(child, "identifier")
                        .map(|n| self.text(n).to_string().into());
                }
                "export_clause" => {
                    let mut spec_cursor = child.walk();
                    for export_spec in child.named_children(&mut spec_cursor) {
                        if export_spec.kind() != "export_specifier" {
                            continue;
                        }
                        // The outward-facing name is what downstream
                        // importers resolve against
                        let name = export_spec
                            .child_by_field_name("alias")
                            .or_else(|| export_spec.child_by_field_name("name"));
                        if let Some(name) = name {
                            names.push(self.text(name).to_string().into());
                        }
                    }
                }
                _ => {}
            }
        }

        self.re_exports.push(ReExport {
            module_specifier: specifier.into(),
            exported_names: if star {
                ReExportNames::All
            } else {
                ReExportNames::Named(names)
            },
            as_name,
        });
    }

    // -- expressions ---------------------------------------------------------

    fn handle_call(&mut self, node: Node, depth: usize) {
        if let Some(callee) = node.child_by_field_name("function")
            && callee.kind() == "import"
        {
            // Dynamic import(): marked, creates no local binding
            if let Some(args) = node.child_by_field_name("arguments")
                && let Some(arg) = args.named_child(0)
                && arg.kind() == "string"
            {
                self.imports.push(Import {
                    local_name: "".into(),
                    module_specifier: strip_quotes(self.text(arg)).into(),
                    exported_name: None,
                    is_default: false,
                    is_namespace: false,
                    is_dynamic: true,
                    is_cjs: false,
                });
                return;
            }
        }
        self.walk_children(node, depth);
    }

    fn handle_member(&mut self, node: Node, depth: usize) {
        if let Some(object) = node.child_by_field_name("object") {
            self.walk(object, depth + 1);
        }
        // Properties past the head are resolved at query time unless a
        // framework pattern elects to surface them
        if let Some(property) = node.child_by_field_name("property")
            && property.kind() == "property_identifier"
            && self.surfaced.contains(self.text(property))
        {
            self.record_reference(property, false);
        }
    }

    // -- recording -----------------------------------------------------------

    fn record_reference(&mut self, node: Node, is_import: bool) {
        let name = self.text(node);
        if name.is_empty() {
            return;
        }
        let binding_scope = self.scopes.lookup(name);
        self.references.push(Reference {
            symbol_name: name.into(),
            location: self.node_location(node),
            range: Self::node_range(node),
            container_name: self.scopes.innermost_name().map(Into::into),
            is_import,
            is_local: binding_scope.is_some(),
            scope_id: binding_scope.unwrap_or_else(|| self.scopes.scope_id()).into(),
        });
    }

    fn bind_parameters(&mut self, params: Option<Node>, _depth: usize) {
        let Some(params) = params else {
            return;
        };
        let mut identifiers = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            collect_parameter_identifiers(param, &mut identifiers);
        }
        for identifier in identifiers {
            let name = self.text(identifier).to_string();
            self.scopes.bind(&name);
            self.push_symbol(
                &name,
                SymbolKind::Parameter,
                identifier,
                false,
                None,
                MetadataMap::new(),
            );
        }
    }

    fn qualified(&self, name: &str) -> String {
        if self.containers.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.containers.join("."), name)
        }
    }

    fn push_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        name_node: Node,
        is_static: bool,
        parameters_count: Option<u32>,
        metadata: MetadataMap,
    ) {
        self.push_symbol_at(
            name,
            kind,
            self.node_location(name_node),
            Self::node_range(name_node),
            self.containers.join("."),
            self.containers.last().cloned(),
            is_static,
            parameters_count,
            metadata,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn push_symbol_at(
        &mut self,
        name: &str,
        kind: SymbolKind,
        location: Location,
        range: Range,
        full_container_path: String,
        container_name: Option<String>,
        is_static: bool,
        parameters_count: Option<u32>,
        metadata: MetadataMap,
    ) {
        let id = self.stable_id(name, kind, &full_container_path, is_static, parameters_count);
        self.symbols.push(Symbol {
            id,
            name: name.into(),
            kind,
            location,
            range,
            container_name: container_name.map(Into::into),
            full_container_path: full_container_path.into(),
            is_static,
            parameters_count,
            metadata,
        });
    }

    /// Stable id: `{fileHash}:{semanticPath}[#{sigHash}]`, position-free.
    /// Callables carry a signature discriminator so overloads differing in
    /// arity or staticness get distinct ids. Within-file collisions get a
    /// disambiguating ordinal suffix.
    fn stable_id(
        &mut self,
        name: &str,
        kind: SymbolKind,
        container_path: &str,
        is_static: bool,
        parameters_count: Option<u32>,
    ) -> String {
        let semantic = if container_path.is_empty() {
            name.to_string()
        } else {
            format!("{container_path}.{name}")
        };
        let mut id = format!("{}:{semantic}", self.file_hash);
        if kind.is_callable() {
            let tag = match kind {
                SymbolKind::Method => "method",
                _ => "function",
            };
            let sig = short_hash(
                &format!("{tag}|{is_static}|{}", parameters_count.unwrap_or(0)),
                4,
            );
            id.push('#');
            id.push_str(&sig);
        }
        let seen = self.id_ordinals.entry(id.clone()).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            id.push_str(&format!("~{seen}"));
        }
        id
    }
}

// -- node helpers ------------------------------------------------------------

fn has_child_of_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).find(|c| c.kind() == kind)
}

fn strip_quotes(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

/// `require("m")` specifier, when `node` is exactly that call.
fn require_specifier(node: Node, code: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "identifier" || &code[callee.byte_range()] != "require" {
        return None;
    }
    let args = node.child_by_field_name("arguments")?;
    let arg = args.named_child(0)?;
    if arg.kind() != "string" {
        return None;
    }
    Some(strip_quotes(&code[arg.byte_range()]))
}

/// Top-level parameter count: the overload discriminator counts parameters,
/// not destructured bindings.
fn count_parameters(params: Node) -> u32 {
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|p| p.kind() != "comment")
        .count() as u32
}

fn collect_parameter_identifiers<'t>(param: Node<'t>, out: &mut Vec<Node<'t>>) {
    match param.kind() {
        "identifier" => out.push(param),
        "required_parameter" | "optional_parameter" => {
            if let Some(pattern) = param.child_by_field_name("pattern") {
                collect_parameter_identifiers(pattern, out);
            }
        }
        "assignment_pattern" => {
            if let Some(left) = param.child_by_field_name("left") {
                collect_parameter_identifiers(left, out);
            }
        }
        "rest_pattern" | "object_pattern" | "array_pattern" => {
            collect_pattern_identifiers(param, out);
        }
        _ => {}
    }
}

/// Identifiers bound by a destructuring pattern.
fn collect_pattern_identifiers<'t>(pattern: Node<'t>, out: &mut Vec<Node<'t>>) {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => out.push(pattern),
        "pair_pattern" => {
            if let Some(value) = pattern.child_by_field_name("value") {
                collect_pattern_identifiers(value, out);
            }
        }
        "assignment_pattern" => {
            if let Some(left) = pattern.child_by_field_name("left") {
                collect_pattern_identifiers(left, out);
            }
        }
        _ => {
            let mut cursor = pattern.walk();
            for child in pattern.named_children(&mut cursor) {
                collect_pattern_identifiers(child, out);
            }
        }
    }
}
