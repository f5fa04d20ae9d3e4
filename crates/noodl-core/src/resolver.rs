//! Reference resolution across documents.
//!
//! Resolution walks the [`RootStore`] one segment at a time. When a hop
//! lands on another reference string, that reference is resolved first
//! (a *chained* reference) and the walk continues inside its value, in the
//! scope of the document it came from. Every hop is recorded as a
//! [`TraceEntry`] so a broken chain can be reported in full.

use crate::markers::Markers;
use crate::reference::{Reference, ReferenceKind};
use crate::store::RootStore;
use noodl_yaml::{Node, NodePath, PathSegment};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashSet;

/// Deepest chain followed before the walk is reported as a cycle.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// Finds the node a given number of levels above the node being visited.
///
/// Traversal references (`__.name`) are resolved through this rather than
/// through the store.
pub trait AncestorLookup {
    fn ancestor(&self, depth: usize) -> Option<Node>;
}

/// [`AncestorLookup`] that walks up a node path within one document.
pub struct PathAncestors<'a> {
    store: &'a RootStore,
    page: &'a str,
    path: &'a NodePath,
}

impl<'a> PathAncestors<'a> {
    pub fn new(store: &'a RootStore, page: &'a str, path: &'a NodePath) -> Self {
        Self { store, page, path }
    }
}

impl AncestorLookup for PathAncestors<'_> {
    fn ancestor(&self, depth: usize) -> Option<Node> {
        let keep = self.path.len().checked_sub(depth)?;
        let path: NodePath = self.path.segments()[..keep].iter().cloned().collect();
        self.store.node_at(self.page, &path).cloned()
    }
}

/// One hop of a resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Chain depth: 0 for the initial reference, +1 per chained reference
    pub depth: usize,
    pub initiating_reference: String,
    pub key: String,
    /// Value fetched at this hop; `None` when the hop was missing
    #[serde(serialize_with = "serialize_node")]
    pub value: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_key: Option<String>,
}

fn serialize_node<S: Serializer>(value: &Option<Node>, serializer: S) -> Result<S::Ok, S::Error> {
    value.as_ref().map(Node::to_json).serialize(serializer)
}

/// How a resolution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
    /// The chain revisited a reference target; `chain` lists the references
    /// in the order they were followed.
    Cycle { chain: Vec<String> },
}

/// Result of [`Resolver::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Final value, present only when resolved
    pub value: Option<Node>,
    pub trace: Vec<TraceEntry>,
    /// Document the final value was found in
    pub scope: String,
    pub status: ResolutionStatus,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.status == ResolutionStatus::Resolved
    }
}

/// Result of [`Resolver::expand`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    Expanded(Node),
    /// A reference inside the value leads back to a target already being
    /// expanded; `chain` lists the references from that target on.
    Cycle { chain: Vec<String> },
}

enum Step<'s> {
    Found { value: Cow<'s, Node>, scope: String },
    Missing,
    Cycle,
}

#[derive(Default)]
struct Walk {
    trace: Vec<TraceEntry>,
    /// `(document, path)` targets of the references currently being chased
    active: HashSet<(String, String)>,
    chain: Vec<String>,
    cycle: Option<Vec<String>>,
}

/// Resolves reference strings against a [`RootStore`]. Never mutates it.
pub struct Resolver<'a> {
    store: &'a RootStore,
    markers: &'a Markers,
    ancestors: Option<&'a dyn AncestorLookup>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a RootStore, markers: &'a Markers) -> Self {
        Self {
            store,
            markers,
            ancestors: None,
        }
    }

    /// Use `ancestors` for traversal references.
    pub fn with_ancestors(mut self, ancestors: &'a dyn AncestorLookup) -> Self {
        self.ancestors = Some(ancestors);
        self
    }

    /// Resolve `reference` as seen from document `scope`.
    ///
    /// A value that is not a reference resolves to itself with an empty
    /// trace.
    ///
    /// ```rust
    /// use noodl_core::{Markers, Node, RootStore, Resolver};
    /// use serde_json::json;
    ///
    /// let mut store = RootStore::new();
    /// store.set("Global", Node::from(json!({"user": {"name": "Ada"}})));
    /// store.set("SignIn", Node::from(json!({"name": ".Global.user.name"})));
    ///
    /// let markers = Markers::new();
    /// let resolution = Resolver::new(&store, &markers).resolve("..name", "SignIn");
    /// assert_eq!(resolution.value.unwrap().as_str(), Some("Ada"));
    /// assert_eq!(resolution.trace.len(), 3);
    /// ```
    pub fn resolve(&self, reference: &str, scope: &str) -> Resolution {
        let mut walk = Walk::default();
        let step = self.resolve_step(reference, scope, 0, &mut walk);
        let (value, scope, status) = match step {
            Step::Found { value, scope } => {
                (Some(value.into_owned()), scope, ResolutionStatus::Resolved)
            }
            Step::Missing => (None, scope.to_string(), ResolutionStatus::Unresolved),
            Step::Cycle => (
                None,
                scope.to_string(),
                ResolutionStatus::Cycle {
                    chain: walk.cycle.take().unwrap_or_default(),
                },
            ),
        };
        Resolution {
            value,
            trace: walk.trace,
            scope,
            status,
        }
    }

    /// Resolve `node` if it is a reference string, otherwise return it.
    pub fn resolve_node(&self, node: &Node, scope: &str) -> Resolution {
        match node.as_str() {
            Some(raw) if Reference::is_reference(raw) => self.resolve(raw, scope),
            _ => Resolution {
                value: Some(node.clone()),
                trace: Vec::new(),
                scope: scope.to_string(),
                status: ResolutionStatus::Resolved,
            },
        }
    }

    /// Copy of `node` with every reference string inside it resolved.
    ///
    /// Unresolvable references are left as written.
    pub fn resolve_deep(&self, node: &Node, scope: &str) -> Node {
        match node {
            Node::Scalar(_) => match self.resolve_node(node, scope) {
                Resolution {
                    value: Some(value), ..
                } => value,
                _ => node.clone(),
            },
            Node::Map(map) => Node::Map(
                map.entries()
                    .iter()
                    .map(|e| (e.key.clone(), self.resolve_deep(&e.value, scope)))
                    .collect(),
            ),
            Node::Seq(seq) => Node::seq(
                seq.items
                    .iter()
                    .map(|item| self.resolve_deep(item, scope))
                    .collect(),
            ),
            Node::Pair(pair) => Node::pair(pair.key.clone(), self.resolve_deep(&pair.value, scope)),
            Node::Document(doc) => Node::document(self.resolve_deep(&doc.contents, scope)),
        }
    }

    /// Copy of `value`, found in document `scope`, with the references
    /// inside it resolved against that document rather than the one
    /// `reference` was written in.
    ///
    /// `reference` is what produced `value` when resolved from document
    /// `from`. Collections pulled in by nested references are expanded the
    /// same way. Meeting a target that is already being expanded, the
    /// original one included, ends in [`Expansion::Cycle`]. Unresolved,
    /// evaluate, write-back, tilde and traversal references are left as
    /// written.
    pub fn expand(&self, reference: &str, from: &str, value: &Node, scope: &str) -> Expansion {
        let mut active: Vec<(String, String)> = expansion_target(reference, from)
            .map(|target| (target, reference.to_string()))
            .into_iter()
            .collect();
        match self.expand_node(value, scope, &mut active) {
            Ok(node) => Expansion::Expanded(node),
            Err(chain) => Expansion::Cycle { chain },
        }
    }

    fn expand_node(
        &self,
        node: &Node,
        scope: &str,
        active: &mut Vec<(String, String)>,
    ) -> std::result::Result<Node, Vec<String>> {
        match node {
            Node::Scalar(_) => {
                let Some((raw, target)) = node
                    .as_str()
                    .and_then(|raw| Some((raw, expansion_target(raw, scope)?)))
                else {
                    return Ok(node.clone());
                };
                if let Some(start) = active.iter().position(|(seen, _)| *seen == target) {
                    let mut chain: Vec<String> =
                        active[start..].iter().map(|(_, r)| r.clone()).collect();
                    chain.push(raw.to_string());
                    return Err(chain);
                }
                if active.len() > MAX_CHAIN_DEPTH {
                    return Err(active.iter().map(|(_, r)| r.clone()).collect());
                }

                let resolution = self.resolve(raw, scope);
                match (resolution.status, resolution.value) {
                    (ResolutionStatus::Resolved, Some(value)) if value.is_collection() => {
                        active.push((target, raw.to_string()));
                        let expanded = self.expand_node(&value, &resolution.scope, active);
                        active.pop();
                        expanded
                    }
                    (ResolutionStatus::Resolved, Some(value)) => Ok(value),
                    (ResolutionStatus::Cycle { chain }, _) => Err(chain),
                    _ => Ok(node.clone()),
                }
            }
            Node::Map(map) => map
                .entries()
                .iter()
                .map(|e| Ok((e.key.clone(), self.expand_node(&e.value, scope, active)?)))
                .collect::<std::result::Result<_, _>>()
                .map(Node::Map),
            Node::Seq(seq) => seq
                .items
                .iter()
                .map(|item| self.expand_node(item, scope, active))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Node::seq),
            Node::Pair(pair) => Ok(Node::pair(
                pair.key.clone(),
                self.expand_node(&pair.value, scope, active)?,
            )),
            Node::Document(doc) => Ok(Node::document(self.expand_node(
                &doc.contents,
                scope,
                active,
            )?)),
        }
    }

    fn resolve_step(&self, raw: &str, scope: &str, depth: usize, walk: &mut Walk) -> Step<'a> {
        let Some(reference) = Reference::parse(raw) else {
            return Step::Found {
                value: Cow::Owned(Node::string(raw)),
                scope: scope.to_string(),
            };
        };

        if depth > MAX_CHAIN_DEPTH {
            walk.cycle.get_or_insert_with(|| walk.chain.clone());
            return Step::Cycle;
        }

        match reference.kind() {
            ReferenceKind::Tilde => {
                let url = format!("{}{}", self.markers.base_url(), reference.path());
                Step::Found {
                    value: Cow::Owned(Node::string(url)),
                    scope: scope.to_string(),
                }
            }
            ReferenceKind::Traversal { depth: levels } => {
                let Some(start) = self.ancestors.and_then(|a| a.ancestor(levels)) else {
                    walk.trace.push(TraceEntry {
                        depth,
                        initiating_reference: raw.to_string(),
                        key: "_".repeat(levels),
                        value: None,
                        path: None,
                        previous_key: None,
                    });
                    return Step::Missing;
                };
                let segments = reference.segments();
                self.walk_segments(raw, Cow::Owned(start), &segments, scope, depth, walk)
            }
            _ => {
                let segments = reference.store_segments(scope).unwrap_or_default();
                self.resolve_in_store(raw, &segments, depth, walk)
            }
        }
    }

    fn resolve_in_store(
        &self,
        raw: &str,
        segments: &[String],
        depth: usize,
        walk: &mut Walk,
    ) -> Step<'a> {
        let Some((name, rest)) = segments.split_first() else {
            return Step::Missing;
        };

        let target = (name.clone(), rest.join("."));
        if walk.active.contains(&target) {
            let mut chain = walk.chain.clone();
            chain.push(raw.to_string());
            walk.cycle.get_or_insert(chain);
            return Step::Cycle;
        }

        let Some(contents) = self.store.document(name).and_then(Node::contents) else {
            walk.trace.push(TraceEntry {
                depth,
                initiating_reference: raw.to_string(),
                key: name.clone(),
                value: None,
                path: Some(name.clone()),
                previous_key: None,
            });
            return Step::Missing;
        };

        walk.active.insert(target.clone());
        walk.chain.push(raw.to_string());
        let step = if rest.is_empty() {
            walk.trace.push(TraceEntry {
                depth,
                initiating_reference: raw.to_string(),
                key: name.clone(),
                value: Some(contents.clone()),
                path: Some(name.clone()),
                previous_key: None,
            });
            self.follow(Cow::Borrowed(contents), name, depth, walk)
        } else {
            self.walk_segments(raw, Cow::Borrowed(contents), rest, name, depth, walk)
        };
        walk.chain.pop();
        walk.active.remove(&target);
        step
    }

    /// Walk `segments` down from `start`, chasing chained references.
    fn walk_segments(
        &self,
        raw: &str,
        start: Cow<'a, Node>,
        segments: &[String],
        scope: &str,
        depth: usize,
        walk: &mut Walk,
    ) -> Step<'a> {
        let mut current = start;
        let mut scope = scope.to_string();
        let mut walked = vec![scope.clone()];
        let mut previous_key: Option<String> = None;

        for segment in segments {
            let next = lookup(&current, segment);
            walked.push(segment.clone());
            tracing::trace!(reference = raw, key = %segment, depth, "Resolution hop");
            walk.trace.push(TraceEntry {
                depth,
                initiating_reference: raw.to_string(),
                key: segment.clone(),
                value: next.as_ref().map(|n| Node::clone(n)),
                path: Some(walked.join(".")),
                previous_key: previous_key.replace(segment.clone()),
            });
            let Some(next) = next else {
                return Step::Missing;
            };
            match self.follow(next, &scope, depth, walk) {
                Step::Found {
                    value,
                    scope: found_in,
                } => {
                    current = value;
                    scope = found_in;
                }
                other => return other,
            }
        }

        Step::Found {
            value: current,
            scope,
        }
    }

    /// Chase `node` if it is a reference string.
    fn follow(&self, node: Cow<'a, Node>, scope: &str, depth: usize, walk: &mut Walk) -> Step<'a> {
        let chained = node
            .as_str()
            .filter(|raw| Reference::is_reference(raw))
            .map(str::to_string);
        match chained {
            Some(raw) => self.resolve_step(&raw, scope, depth + 1, walk),
            None => Step::Found {
                value: node,
                scope: scope.to_string(),
            },
        }
    }
}

/// Store target (`Doc.path`) of a root or local reference that expansion
/// replaces.
fn expansion_target(raw: &str, scope: &str) -> Option<String> {
    let reference = Reference::parse(raw)?;
    let replaced = matches!(reference.kind(), ReferenceKind::Root | ReferenceKind::Local);
    if !replaced || reference.is_await() || reference.is_builtin_call() {
        return None;
    }
    Some(reference.store_segments(scope)?.join("."))
}

/// Child of `node` under `segment`, keeping the store borrow when possible.
fn lookup<'s>(node: &Cow<'s, Node>, segment: &str) -> Option<Cow<'s, Node>> {
    let segment = PathSegment::Key(segment.to_string());
    match node {
        Cow::Borrowed(node) => node.child(&segment).map(Cow::Borrowed),
        Cow::Owned(node) => node.child(&segment).cloned().map(Cow::Owned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::MarkerFlag;
    use serde_json::json;

    fn fixture() -> RootStore {
        let mut store = RootStore::new();
        store.set("SignIn", Node::from(json!({"dog": ".Topo.findMyGender"})));
        store.set(
            "Topo",
            Node::from(json!({"findMyGender": ".Pencil.listObject[2].options[0].findGender"})),
        );
        store.set(
            "Pencil",
            Node::from(json!({
                "listObject": [{}, {}, {"options": [{"findGender": "..gender"}]}],
                "gender": "Male"
            })),
        );
        store
    }

    #[test]
    fn test_chained_references_switch_scope() {
        let store = fixture();
        let markers = Markers::new();
        let resolution = Resolver::new(&store, &markers).resolve(".SignIn.dog", "SignIn");
        assert!(resolution.is_resolved());
        assert_eq!(resolution.value.unwrap().as_str(), Some("Male"));
        assert_eq!(resolution.scope, "Pencil");

        let depths: Vec<_> = resolution.trace.iter().map(|t| t.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 2, 2, 2, 2, 3]);
        let last = resolution.trace.last().unwrap();
        assert_eq!(last.initiating_reference, "..gender");
        assert_eq!(last.path.as_deref(), Some("Pencil.gender"));
    }

    #[test]
    fn test_plain_value_is_returned_unchanged() {
        let store = fixture();
        let markers = Markers::new();
        let resolution = Resolver::new(&store, &markers).resolve("Male", "SignIn");
        assert_eq!(resolution.value, Some(Node::from("Male")));
        assert!(resolution.trace.is_empty());
    }

    #[test]
    fn test_missing_hop_keeps_trace() {
        let store = fixture();
        let markers = Markers::new();
        let resolution = Resolver::new(&store, &markers).resolve(".Pencil.nothing.here", "X");
        assert_eq!(resolution.status, ResolutionStatus::Unresolved);
        assert!(resolution.value.is_none());
        assert_eq!(resolution.trace.len(), 1);
        assert_eq!(resolution.trace[0].key, "nothing");
        assert!(resolution.trace[0].value.is_none());
    }

    #[test]
    fn test_missing_document() {
        let store = fixture();
        let markers = Markers::new();
        let resolution = Resolver::new(&store, &markers).resolve(".Nope.x", "SignIn");
        assert_eq!(resolution.status, ResolutionStatus::Unresolved);
        assert_eq!(resolution.trace[0].key, "Nope");
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut store = RootStore::new();
        store.set("A", Node::from(json!({"a": ".B.b", "self": "..self"})));
        store.set("B", Node::from(json!({"b": ".A.a"})));
        let markers = Markers::new();
        let resolver = Resolver::new(&store, &markers);

        let resolution = resolver.resolve(".A.a", "A");
        assert_eq!(
            resolution.status,
            ResolutionStatus::Cycle {
                chain: vec![".A.a".into(), ".B.b".into(), ".A.a".into()]
            }
        );

        let resolution = resolver.resolve("..self", "A");
        assert!(matches!(resolution.status, ResolutionStatus::Cycle { .. }));
    }

    #[test]
    fn test_repeated_non_nested_target_is_not_a_cycle() {
        let mut store = RootStore::new();
        store.set("A", Node::from(json!({"x": ".B.y", "z": ".B.y"})));
        store.set("B", Node::from(json!({"y": {"w": 1}})));
        let markers = Markers::new();
        let resolver = Resolver::new(&store, &markers);
        assert!(resolver.resolve(".A.x.w", "A").is_resolved());
        assert!(resolver.resolve(".A.z", "A").is_resolved());
    }

    #[test]
    fn test_tilde_uses_base_url() {
        let store = RootStore::new();
        let mut markers = Markers::new();
        markers.mark(MarkerFlag::BaseUrl, "https://cdn.example/");
        let resolution = Resolver::new(&store, &markers).resolve("~/logo.png", "SignIn");
        assert_eq!(
            resolution.value.unwrap().as_str(),
            Some("https://cdn.example/logo.png")
        );
        assert!(resolution.trace.is_empty());
    }

    #[test]
    fn test_traversal_reference_uses_ancestors() {
        let mut store = RootStore::new();
        store.set(
            "List",
            Node::from(json!({"item": {"name": "Ada", "label": "__.name"}})),
        );
        let markers = Markers::new();
        let path: NodePath = ["item", "label"].into_iter().map(PathSegment::from).collect();
        let ancestors = PathAncestors::new(&store, "List", &path);

        let resolver = Resolver::new(&store, &markers).with_ancestors(&ancestors);
        let resolution = resolver.resolve("_.name", "List");
        assert_eq!(resolution.value.unwrap().as_str(), Some("Ada"));

        let bare = Resolver::new(&store, &markers).resolve("_.name", "List");
        assert_eq!(bare.status, ResolutionStatus::Unresolved);
    }

    #[test]
    fn test_expand_resolves_in_the_source_document() {
        let mut store = RootStore::new();
        store.set(
            "Global",
            Node::from(json!({"obj": {"name": "..user", "tags": ["..user", "=..user"]}, "user": "Ada"})),
        );
        store.set("Home", Node::from(json!({"user": "Bob"})));
        let markers = Markers::new();
        let resolver = Resolver::new(&store, &markers);

        let resolution = resolver.resolve(".Global.obj", "Home");
        assert_eq!(resolution.scope, "Global");
        let value = resolution.value.unwrap();
        assert_eq!(
            resolver.expand(".Global.obj", "Home", &value, &resolution.scope),
            Expansion::Expanded(Node::from(
                json!({"name": "Ada", "tags": ["Ada", "=..user"]})
            ))
        );
    }

    #[test]
    fn test_expand_stops_at_self_containing_target() {
        let mut store = RootStore::new();
        store.set("Home", Node::from(json!({"a": {"b": "..a"}, "c": {"d": ".Home.c"}})));
        let markers = Markers::new();
        let resolver = Resolver::new(&store, &markers);

        let value = resolver.resolve("..a", "Home").value.unwrap();
        assert_eq!(
            resolver.expand("..a", "Home", &value, "Home"),
            Expansion::Cycle {
                chain: vec!["..a".into(), "..a".into()]
            }
        );

        let value = resolver.resolve("..c", "Home").value.unwrap();
        assert!(matches!(
            resolver.expand("..c", "Home", &value, "Home"),
            Expansion::Cycle { .. }
        ));
    }

    #[test]
    fn test_resolve_deep() {
        let store = fixture();
        let markers = Markers::new();
        let input = Node::from(json!({"gender": ".Pencil.gender", "n": 1, "bad": ".X.y"}));
        let output = Resolver::new(&store, &markers).resolve_deep(&input, "SignIn");
        assert_eq!(
            output,
            Node::from(json!({"gender": "Male", "n": 1, "bad": ".X.y"}))
        );
    }
}
