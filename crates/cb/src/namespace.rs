//! Namespace & Import Resolution (C8).
//!
//! Grounded on the teacher's `namespace.rs` (an id-addressed registry rather
//! than nested raw-pointer scopes) and on `original_source`'s
//! `namespace_registry.h`/`.cpp` (fully-qualified path -> descriptor with a
//! parent path, a symbol table, and an `exported` flag).

use ahash::AHashMap;

use crate::function::FunctionId;

/// A registered namespace: its fully-qualified path components, the function
/// symbols declared directly inside it, and whether it is visible to
/// `using namespace` from outside its own declaration (spec §4.8).
#[derive(Debug, Default, Clone)]
pub struct NamespaceDescriptor {
    pub path: Vec<String>,
    pub symbols: AHashMap<String, FunctionId>,
    pub exported: bool,
}

/// Outcome of an unqualified name lookup across the active namespace set
/// (spec §4.8 "flagging ambiguity when multiple resolve").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(FunctionId),
    NotFound,
    Ambiguous(Vec<String>),
}

#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: AHashMap<String, NamespaceDescriptor>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn qualify(path: &[String]) -> String {
        path.join("::")
    }

    /// Registers `name` as declared inside namespace `path` (spec §4.8
    /// "declarations of functions inside `namespace N { .. }` register under
    /// `N::name` *and* inside the namespace's symbol table").
    pub fn register(&mut self, path: &[String], name: &str, func: FunctionId, exported: bool) {
        let key = Self::qualify(path);
        let ns = self.namespaces.entry(key).or_insert_with(|| NamespaceDescriptor {
            path: path.to_vec(),
            symbols: AHashMap::new(),
            exported,
        });
        ns.symbols.insert(name.to_string(), func);
    }

    pub fn descriptor(&self, path: &[String]) -> Option<&NamespaceDescriptor> {
        self.namespaces.get(&Self::qualify(path))
    }

    /// Resolves a qualified name `ns::name` (spec §4.7 "For qualified names
    /// `ns::f`, consult the namespace registry").
    pub fn resolve_qualified(&self, path: &[String], name: &str) -> Option<FunctionId> {
        self.descriptor(path).and_then(|ns| ns.symbols.get(name)).copied()
    }

    /// Unqualified name lookup order (spec §4.8): current namespace, then each
    /// active `using` namespace (ambiguous if more than one resolves), with the
    /// global scope checked separately by the caller as the final fallback.
    pub fn resolve_unqualified(&self, current_ns: &[String], using: &[Vec<String>], name: &str) -> Resolution {
        if let Some(id) = self.resolve_qualified(current_ns, name) {
            return Resolution::Found(id);
        }
        let mut hits: Vec<(String, FunctionId)> = Vec::new();
        for ns_path in using {
            if let Some(id) = self.resolve_qualified(ns_path, name) {
                hits.push((Self::qualify(ns_path), id));
            }
        }
        match hits.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(hits[0].1),
            _ => Resolution::Ambiguous(hits.into_iter().map(|(p, _)| p).collect()),
        }
    }
}

/// Per-scope `using namespace N;` list (spec §4.8 "A stack tracks the current
/// namespace scope ... `using namespace N;` appends `N` to a scope-local list").
#[derive(Debug, Default, Clone)]
pub struct UsingDirectives {
    active: Vec<Vec<String>>,
}

impl UsingDirectives {
    pub fn push(&mut self, path: Vec<String>) {
        if !self.active.contains(&path) {
            self.active.push(path);
        }
    }

    pub fn as_slice(&self) -> &[Vec<String>] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_resolution() {
        let mut reg = NamespaceRegistry::new();
        let path = vec!["std".to_string(), "io".to_string()];
        reg.register(&path, "read", FunctionId::from_raw(1), true);
        assert_eq!(reg.resolve_qualified(&path, "read"), Some(FunctionId::from_raw(1)));
        assert_eq!(reg.resolve_qualified(&path, "missing"), None);
    }

    #[test]
    fn ambiguous_when_two_usings_resolve() {
        let mut reg = NamespaceRegistry::new();
        let a = vec!["a".to_string()];
        let b = vec!["b".to_string()];
        reg.register(&a, "f", FunctionId::from_raw(1), true);
        reg.register(&b, "f", FunctionId::from_raw(2), true);
        let using = vec![a, b];
        let resolution = reg.resolve_unqualified(&["main".to_string()], &using, "f");
        assert!(matches!(resolution, Resolution::Ambiguous(_)));
    }

    #[test]
    fn current_namespace_wins_over_using() {
        let mut reg = NamespaceRegistry::new();
        let cur = vec!["main".to_string()];
        let other = vec!["other".to_string()];
        reg.register(&cur, "f", FunctionId::from_raw(1), true);
        reg.register(&other, "f", FunctionId::from_raw(2), true);
        let using = vec![other];
        assert_eq!(
            reg.resolve_unqualified(&cur, &using, "f"),
            Resolution::Found(FunctionId::from_raw(1))
        );
    }
}
