//! Registry of built-in functions callable from documents.
//!
//! Documents call a built-in with a single-key map:
//!
//! ```yaml
//! - =.builtIn.string.concat:
//!     dataIn: [..firstName, " ", ..lastName]
//!     dataOut: ..fullName
//! ```

use crate::markers::Markers;
use crate::store::RootStore;
use indexmap::IndexMap;
use noodl_yaml::Node;
use std::fmt;
use std::sync::Arc;

/// Environment handed to a built-in function.
pub struct BuiltinContext<'a> {
    /// Document the call appears in
    pub page: &'a str,
    pub markers: &'a Markers,
    pub store: &'a RootStore,
}

pub type BuiltinFn = dyn Fn(&Node, &BuiltinContext<'_>) -> anyhow::Result<Node> + Send + Sync;

/// A registered callable.
#[derive(Clone)]
pub struct BuiltinFunction {
    func: Arc<BuiltinFn>,
    normalize_input: bool,
}

impl BuiltinFunction {
    pub fn new(
        func: impl Fn(&Node, &BuiltinContext<'_>) -> anyhow::Result<Node> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(func),
            normalize_input: true,
        }
    }

    /// Receive `dataIn` as written, without resolving references in it.
    pub fn raw_input(mut self) -> Self {
        self.normalize_input = false;
        self
    }

    pub fn normalizes_input(&self) -> bool {
        self.normalize_input
    }

    pub fn call(&self, input: &Node, ctx: &BuiltinContext<'_>) -> anyhow::Result<Node> {
        (self.func)(input, ctx)
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("normalize_input", &self.normalize_input)
            .finish_non_exhaustive()
    }
}

/// One node of the registry tree.
#[derive(Debug, Clone)]
pub enum BuiltinEntry {
    Function(BuiltinFunction),
    Namespace(BuiltinRegistry),
    /// A plain value; looking it up as a call is an error
    Value(Node),
}

impl BuiltinEntry {
    pub fn as_function(&self) -> Option<&BuiltinFunction> {
        match self {
            BuiltinEntry::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// Nested namespaces of built-ins, addressed by dotted path
/// (`string.equal`).
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    entries: IndexMap<String, BuiltinEntry>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function at `path`, creating namespaces on the way.
    pub fn register(
        &mut self,
        path: &str,
        func: impl Fn(&Node, &BuiltinContext<'_>) -> anyhow::Result<Node> + Send + Sync + 'static,
    ) -> &mut Self {
        self.register_entry(path, BuiltinEntry::Function(BuiltinFunction::new(func)))
    }

    /// Register a non-callable value at `path`.
    pub fn register_value(&mut self, path: &str, value: impl Into<Node>) -> &mut Self {
        self.register_entry(path, BuiltinEntry::Value(value.into()))
    }

    /// Register any entry at `path`. Whatever was there is replaced.
    pub fn register_entry(&mut self, path: &str, entry: BuiltinEntry) -> &mut Self {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return self;
        };
        let mut registry = &mut *self;
        for segment in segments {
            let slot = registry
                .entries
                .entry(segment.to_string())
                .or_insert_with(|| BuiltinEntry::Namespace(BuiltinRegistry::new()));
            if !matches!(slot, BuiltinEntry::Namespace(_)) {
                *slot = BuiltinEntry::Namespace(BuiltinRegistry::new());
            }
            registry = match slot {
                BuiltinEntry::Namespace(inner) => inner,
                _ => return self,
            };
        }
        registry.entries.insert(last.to_string(), entry);
        self
    }

    /// Entry at a dotted path.
    pub fn lookup(&self, path: &str) -> Option<&BuiltinEntry> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let entry = self.entries.get(head)?;
        match (entry, rest) {
            (_, None) => Some(entry),
            (BuiltinEntry::Namespace(inner), Some(rest)) => inner.lookup(rest),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(store: &'a RootStore, markers: &'a Markers) -> BuiltinContext<'a> {
        BuiltinContext {
            page: "SignIn",
            markers,
            store,
        }
    }

    #[test]
    fn test_register_and_call_nested() {
        let mut registry = BuiltinRegistry::new();
        registry.register("string.equal", |input, _ctx| {
            let items = input.as_seq().unwrap_or_default();
            Ok(Node::from(items.len() == 2 && items[0] == items[1]))
        });

        let store = RootStore::new();
        let markers = Markers::new();
        let func = registry.lookup("string.equal").and_then(BuiltinEntry::as_function);
        let input = Node::from(vec![Node::from("a"), Node::from("a")]);
        let result = func.unwrap().call(&input, &ctx(&store, &markers)).unwrap();
        assert_eq!(result, Node::from(true));
    }

    #[test]
    fn test_lookup_misses() {
        let mut registry = BuiltinRegistry::new();
        registry.register_value("version", "1.0");
        registry.register("math.add", |_, _| Ok(Node::null()));

        assert!(registry.lookup("math.sub").is_none());
        assert!(registry.lookup("version.major").is_none());
        assert!(matches!(registry.lookup("math"), Some(BuiltinEntry::Namespace(_))));
        assert!(matches!(registry.lookup("version"), Some(BuiltinEntry::Value(_))));
    }

    #[test]
    fn test_register_over_a_value_makes_a_namespace() {
        let mut registry = BuiltinRegistry::new();
        registry.register_value("date", 0);
        registry.register("date.now", |_, _| Ok(Node::from(1)));
        assert!(registry.contains("date.now"));
    }

    #[test]
    fn test_raw_input_flag() {
        let func = BuiltinFunction::new(|input, _| Ok(input.clone())).raw_input();
        assert!(!func.normalizes_input());
    }
}
