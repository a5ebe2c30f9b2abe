//! Framework-pattern extension point.
//!
//! Patterns recognize well-known factory shapes during extraction and
//! annotate the resulting symbol with metadata and optional virtual child
//! symbols. Patterns never assign ids; the extractor applies the normal
//! stable-id rules to everything a pattern produces.

use crate::symbol::{MetadataMap, MetadataValue};
use crate::types::{Range, SymbolKind};
use tree_sitter::Node;

/// Read-only context handed to pattern callbacks.
pub struct PatternContext<'a> {
    pub uri: &'a str,
    pub code: &'a str,
}

impl PatternContext<'_> {
    pub fn text(&self, node: Node) -> &str {
        &self.code[node.byte_range()]
    }
}

/// A child symbol a pattern wants materialized under the matched binding.
#[derive(Debug, Clone)]
pub struct VirtualSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub range: Range,
    pub is_static: bool,
    pub parameters_count: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct PatternMatch {
    pub metadata: MetadataMap,
    pub children: Vec<VirtualSymbol>,
}

pub trait FrameworkPattern: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called for each call expression that initializes a named binding.
    fn on_call(
        &self,
        binding_name: &str,
        call: Node,
        ctx: &PatternContext,
    ) -> Option<PatternMatch>;

    /// Called for each non-computed class property definition.
    fn on_property(
        &self,
        _property_name: &str,
        _node: Node,
        _ctx: &PatternContext,
    ) -> Option<PatternMatch> {
        None
    }

    /// Property names this pattern wants recorded as references when they
    /// appear in member chains. Everything else is left to query-time
    /// resolution.
    fn surfaced_properties(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Recognizes action-group factories: a call whose first argument is an
/// object literal with an `events` object, each key becoming a camelCased
/// child symbol of the binding.
pub struct ActionGroupPattern {
    factory_names: Vec<String>,
    events_key: String,
}

impl Default for ActionGroupPattern {
    fn default() -> Self {
        Self {
            factory_names: vec!["createActionGroup".to_string()],
            events_key: "events".to_string(),
        }
    }
}

impl ActionGroupPattern {
    pub fn with_factories(factory_names: Vec<String>, events_key: String) -> Self {
        Self {
            factory_names,
            events_key,
        }
    }
}

impl FrameworkPattern for ActionGroupPattern {
    fn name(&self) -> &'static str {
        "action-group"
    }

    fn on_call(
        &self,
        _binding_name: &str,
        call: Node,
        ctx: &PatternContext,
    ) -> Option<PatternMatch> {
        let callee = call.child_by_field_name("function")?;
        if callee.kind() != "identifier"
            || !self.factory_names.iter().any(|f| f == ctx.text(callee))
        {
            return None;
        }

        let args = call.child_by_field_name("arguments")?;
        let first_arg = first_named_child_of_kind(args, "object")?;
        let events = object_property_value(first_arg, &self.events_key, ctx)?;
        if events.kind() != "object" {
            return None;
        }

        let mut children = Vec::new();
        let mut event_names = Vec::new();
        let mut cursor = events.walk();
        for pair in events.named_children(&mut cursor) {
            if pair.kind() != "pair" {
                continue;
            }
            let Some(key) = pair.child_by_field_name("key") else {
                continue;
            };
            let Some(raw) = property_key_text(key, ctx) else {
                continue;
            };
            let name = camel_case(&raw);
            let start = key.start_position();
            let end = key.end_position();
            event_names.push(raw);
            children.push(VirtualSymbol {
                name,
                kind: SymbolKind::Method,
                range: Range::new(
                    start.row as u32,
                    start.column as u32,
                    end.row as u32,
                    end.column as u32,
                ),
                is_static: false,
                parameters_count: None,
            });
        }

        if children.is_empty() {
            return None;
        }

        let mut metadata = MetadataMap::new();
        metadata.insert(
            "framework".into(),
            MetadataValue::Str(self.name().to_string()),
        );
        metadata.insert("events".into(), MetadataValue::List(event_names));
        Some(PatternMatch { metadata, children })
    }
}

fn first_named_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).find(|c| c.kind() == kind)
}

/// Value of a non-computed property in an object literal.
pub fn object_property_value<'t>(
    object: Node<'t>,
    key_name: &str,
    ctx: &PatternContext,
) -> Option<Node<'t>> {
    let mut cursor = object.walk();
    for pair in object.named_children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let key = pair.child_by_field_name("key")?;
        if property_key_text(key, ctx).as_deref() == Some(key_name) {
            return pair.child_by_field_name("value");
        }
    }
    None
}

/// Text of a non-computed property key, with string quotes stripped.
pub fn property_key_text(key: Node, ctx: &PatternContext) -> Option<String> {
    match key.kind() {
        "property_identifier" | "identifier" => Some(ctx.text(key).to_string()),
        "string" => {
            let raw = ctx.text(key);
            Some(raw.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string())
        }
        _ => None,
    }
}

/// `"dialog opened"` -> `dialogOpened`, `save_user` -> `saveUser`.
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            if upper_next && !out.is_empty() {
                out.extend(c.to_uppercase());
            } else {
                out.push(if out.is_empty() { c.to_ascii_lowercase() } else { c });
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    out
}
