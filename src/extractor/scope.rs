//! Lexical scope tracking during the AST walk.
//!
//! Scopes open on function, method, arrow, and class boundaries. The scope
//! id is the `::`-join of enclosing declaration names, or `<global>` at
//! file top. Bindings introduced at module top level are workspace-visible
//! and are not treated as local.

use std::collections::HashSet;

pub const GLOBAL_SCOPE: &str = "<global>";

struct Scope {
    /// None for anonymous functions; they contribute nothing to the id.
    name: Option<String>,
    bindings: HashSet<String>,
}

pub struct ScopeTracker {
    scopes: Vec<Scope>,
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                name: None,
                bindings: HashSet::new(),
            }],
        }
    }

    pub fn enter(&mut self, name: Option<&str>) {
        self.scopes.push(Scope {
            name: name.map(|n| n.to_string()),
            bindings: HashSet::new(),
        });
    }

    pub fn exit(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Record a binding in the current scope.
    pub fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string());
        }
    }

    /// Canonical id of the current scope.
    pub fn scope_id(&self) -> String {
        self.id_up_to(self.scopes.len())
    }

    fn id_up_to(&self, end: usize) -> String {
        let parts: Vec<&str> = self.scopes[..end]
            .iter()
            .filter_map(|s| s.name.as_deref())
            .collect();
        if parts.is_empty() {
            GLOBAL_SCOPE.to_string()
        } else {
            parts.join("::")
        }
    }

    /// Name of the innermost named scope, if any.
    pub fn innermost_name(&self) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.name.clone())
    }

    /// If `name` is bound in the scope chain (excluding the module-global
    /// frame), return the binding scope's id.
    pub fn lookup(&self, name: &str) -> Option<String> {
        for (i, scope) in self.scopes.iter().enumerate().skip(1).rev() {
            if scope.bindings.contains(name) {
                return Some(self.id_up_to(i + 1));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_scope_id() {
        let scopes = ScopeTracker::new();
        assert_eq!(scopes.scope_id(), GLOBAL_SCOPE);
    }

    #[test]
    fn test_nested_named_scopes() {
        let mut scopes = ScopeTracker::new();
        scopes.enter(Some("UserService"));
        scopes.enter(Some("save"));
        assert_eq!(scopes.scope_id(), "UserService::save");

        scopes.exit();
        assert_eq!(scopes.scope_id(), "UserService");
    }

    #[test]
    fn test_anonymous_scopes_skipped_in_id() {
        let mut scopes = ScopeTracker::new();
        scopes.enter(Some("f"));
        scopes.enter(None);
        assert_eq!(scopes.scope_id(), "f");
    }

    #[test]
    fn test_lookup_returns_binding_scope() {
        let mut scopes = ScopeTracker::new();
        scopes.enter(Some("f"));
        scopes.bind("temp");
        scopes.enter(Some("g"));

        assert_eq!(scopes.lookup("temp"), Some("f".to_string()));
        assert_eq!(scopes.lookup("missing"), None);
    }

    #[test]
    fn test_module_level_bindings_are_not_local() {
        let mut scopes = ScopeTracker::new();
        scopes.bind("topLevel");
        assert_eq!(scopes.lookup("topLevel"), None);
    }

    #[test]
    fn test_shadowing_picks_innermost() {
        let mut scopes = ScopeTracker::new();
        scopes.enter(Some("outer"));
        scopes.bind("x");
        scopes.enter(Some("inner"));
        scopes.bind("x");

        assert_eq!(scopes.lookup("x"), Some("outer::inner".to_string()));
    }
}
