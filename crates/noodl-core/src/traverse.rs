//! Depth-first traversal over one document with a single active callback.
//!
//! The callback decides, per node, how the walk continues by returning an
//! [`Outcome`]. Mutations go straight to the [`RootStore`], so the sync
//! engine hands callbacks a node borrowed from a shared handle on the
//! document taken before the visit, and the walk re-reads the store after
//! every visit. That keeps sibling iteration correct when a callback
//! replaces, removes or inserts nodes. The async engine clones each node,
//! since its store borrow cannot outlive an await.
//!
//! Order: the document node, then its contents, then children in document
//! order. Replacement nodes are descended into without being visited
//! themselves, unless the callback asked for [`Outcome::Substitute`].

use crate::error::{NoodlError, Result};
use crate::store::RootStore;
use async_trait::async_trait;
use noodl_yaml::{Node, NodePath, PathSegment};
use std::cell::{Cell, RefCell};

/// What the walk does after a node is visited.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Outcome {
    /// Keep the node and descend into its children.
    #[default]
    Keep,
    /// Substitute the node, then descend into the replacement.
    Replace(Node),
    /// Substitute the node without descending into the replacement.
    Substitute(Node),
    /// Delete the node and its subtree; continue with the next sibling.
    Remove,
    /// Keep the node without descending.
    SkipChildren,
    /// Stop the whole walk.
    Break,
    /// Move the parent's iteration cursor to this child index.
    Reposition(usize),
}

/// How a visit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    Completed,
    /// A callback returned [`Outcome::Break`] or removed the document.
    Stopped,
}

/// What a sync callback sees for one node.
pub struct VisitContext<'a, D> {
    pub node: &'a Node,
    /// Segment under which the node sits in its parent (`None` for the
    /// document and its contents)
    pub key: Option<&'a PathSegment>,
    pub path: &'a NodePath,
    pub page: &'a str,
    pub data: &'a mut D,
    pub store: &'a mut RootStore,
}

impl<D> VisitContext<'_, D> {
    /// Whether this is the document node itself rather than a node inside it.
    pub fn is_document(&self) -> bool {
        matches!(self.node, Node::Document(_))
    }
}

pub type VisitFn<'a, D> =
    Box<dyn for<'c> FnMut(&mut VisitContext<'c, D>) -> Result<Outcome> + 'a>;
pub type InitFn<'a, D> = Box<dyn FnOnce(&mut RootStore, &mut D) -> Result<()> + 'a>;

/// Synchronous traversal engine.
pub struct Traversal<'a, D> {
    callback: Option<VisitFn<'a, D>>,
    init: Option<InitFn<'a, D>>,
}

impl<D> Default for Traversal<'_, D> {
    fn default() -> Self {
        Self {
            callback: None,
            init: None,
        }
    }
}

impl<'a, D> Traversal<'a, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `callback` the active callback, replacing any previous one.
    pub fn use_callback(
        &mut self,
        callback: impl for<'c> FnMut(&mut VisitContext<'c, D>) -> Result<Outcome> + 'a,
    ) -> &mut Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Register a hook that runs once, before the first visit.
    pub fn on_init(
        &mut self,
        init: impl FnOnce(&mut RootStore, &mut D) -> Result<()> + 'a,
    ) -> &mut Self {
        self.init = Some(Box::new(init));
        self
    }

    /// Run the init hook now, if it has not run yet.
    pub fn init(&mut self, store: &mut RootStore, data: &mut D) -> Result<()> {
        match self.init.take() {
            Some(init) => init(store, data),
            None => Ok(()),
        }
    }

    /// Walk document `page`.
    pub fn visit(&mut self, store: &mut RootStore, page: &str, data: &mut D) -> Result<VisitStatus> {
        self.init(store, data)?;
        let mut walker = Walker::new(page);
        while let Some(step) = walker.next(store)? {
            let outcome = match self.callback.as_mut() {
                Some(callback) => {
                    let document = store
                        .shared(page)
                        .ok_or_else(|| NoodlError::MissingDocument(page.to_string()))?;
                    let node = step
                        .node_in(&document)
                        .ok_or_else(|| missing_node(page, &step.path))?;
                    let mut ctx = VisitContext {
                        node,
                        key: step.path.last(),
                        path: &step.path,
                        page,
                        data: &mut *data,
                        store: &mut *store,
                    };
                    callback(&mut ctx)?
                }
                None => Outcome::Keep,
            };
            if walker.apply(store, &step.path, step.is_document, outcome)? == Flow::Stop {
                return Ok(VisitStatus::Stopped);
            }
        }
        Ok(VisitStatus::Completed)
    }
}

/// What an async callback sees for one node.
///
/// The store is shared: borrow it only between awaits.
pub struct AsyncVisitContext<'a> {
    pub node: Node,
    pub key: Option<PathSegment>,
    pub path: NodePath,
    pub page: &'a str,
    pub store: &'a RefCell<RootStore>,
}

/// Callback for [`AsyncTraversal`].
///
/// Visitors carry their own per-document state (behind interior
/// mutability, since `visit` takes `&self`).
#[async_trait(?Send)]
pub trait AsyncVisitor {
    /// Runs once before the first visit.
    async fn init(&self, _store: &RefCell<RootStore>) -> Result<()> {
        Ok(())
    }

    async fn visit(&self, ctx: AsyncVisitContext<'_>) -> Result<Outcome>;
}

/// Cooperative async traversal engine.
///
/// Each visit is awaited before the walk moves on, so document order is
/// preserved even when callbacks suspend.
pub struct AsyncTraversal<'a> {
    visitor: Option<&'a dyn AsyncVisitor>,
    initialized: Cell<bool>,
}

impl Default for AsyncTraversal<'_> {
    fn default() -> Self {
        Self {
            visitor: None,
            initialized: Cell::new(false),
        }
    }
}

impl<'a> AsyncTraversal<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `visitor` the active callback, replacing any previous one.
    pub fn use_visitor(&mut self, visitor: &'a dyn AsyncVisitor) -> &mut Self {
        self.visitor = Some(visitor);
        self.initialized.set(false);
        self
    }

    /// Await the visitor's init hook, if it has not run yet.
    ///
    /// Call this before starting concurrent visits; a lazy init from
    /// [`visit`](Self::visit) only covers the first caller.
    pub async fn init(&self, store: &RefCell<RootStore>) -> Result<()> {
        if self.initialized.replace(true) {
            return Ok(());
        }
        match self.visitor {
            Some(visitor) => visitor.init(store).await,
            None => Ok(()),
        }
    }

    /// Walk document `page`.
    pub async fn visit(&self, store: &RefCell<RootStore>, page: &str) -> Result<VisitStatus> {
        self.init(store).await?;
        let mut walker = Walker::new(page);
        loop {
            let step = {
                let guard = store.try_borrow().map_err(|e| busy(page, e))?;
                match walker.next(&guard)? {
                    Some(step) => {
                        let node = guard
                            .document(page)
                            .and_then(|document| step.node_in(document))
                            .cloned()
                            .ok_or_else(|| missing_node(page, &step.path))?;
                        Some((step, node))
                    }
                    None => None,
                }
            };
            let Some((Step { path, is_document }, node)) = step else {
                return Ok(VisitStatus::Completed);
            };

            let outcome = match self.visitor {
                Some(visitor) => {
                    let ctx = AsyncVisitContext {
                        node,
                        key: path.last().cloned(),
                        path: path.clone(),
                        page,
                        store,
                    };
                    visitor.visit(ctx).await?
                }
                None => Outcome::Keep,
            };

            let mut guard = store.try_borrow_mut().map_err(|e| busy(page, e))?;
            if walker.apply(&mut guard, &path, is_document, outcome)? == Flow::Stop {
                return Ok(VisitStatus::Stopped);
            }
        }
    }
}

fn busy(page: &str, error: impl std::fmt::Display) -> NoodlError {
    NoodlError::StoreBusy(format!("{} (visiting `{}`)", error, page))
}

fn missing_node(page: &str, path: &NodePath) -> NoodlError {
    NoodlError::InvalidPath {
        page: page.to_string(),
        path: path.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Location of the next node to hand to the callback.
struct Step {
    path: NodePath,
    is_document: bool,
}

impl Step {
    fn node_in<'d>(&self, document: &'d Node) -> Option<&'d Node> {
        if self.is_document {
            Some(document)
        } else {
            document.contents()?.at(self.path.segments())
        }
    }
}

enum Pending {
    Document,
    Contents,
}

/// Iteration cursor over one container.
struct Frame {
    path: NodePath,
    next: usize,
}

/// Walk state shared by both engines. Holds paths only, never borrows.
struct Walker {
    page: String,
    pending: Option<Pending>,
    stack: Vec<Frame>,
}

impl Walker {
    fn new(page: &str) -> Self {
        Self {
            page: page.to_string(),
            pending: Some(Pending::Document),
            stack: Vec::new(),
        }
    }

    fn next(&mut self, store: &RootStore) -> Result<Option<Step>> {
        if let Some(pending) = self.pending.take() {
            let document = store
                .document(&self.page)
                .ok_or_else(|| NoodlError::MissingDocument(self.page.clone()))?;
            let is_document = match pending {
                Pending::Document => true,
                Pending::Contents if document.contents().is_some() => false,
                Pending::Contents => return Ok(None),
            };
            return Ok(Some(Step {
                path: NodePath::new(),
                is_document,
            }));
        }

        while let Some(frame) = self.stack.last_mut() {
            let child = store
                .node_at(&self.page, &frame.path)
                .and_then(|container| container.child_segment(frame.next));
            let Some(segment) = child else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;
            let path = frame.path.join(segment);
            if store.node_at(&self.page, &path).is_some() {
                return Ok(Some(Step {
                    path,
                    is_document: false,
                }));
            }
        }
        Ok(None)
    }

    fn apply(
        &mut self,
        store: &mut RootStore,
        path: &NodePath,
        is_document: bool,
        outcome: Outcome,
    ) -> Result<Flow> {
        match outcome {
            Outcome::Keep => self.descend(store, path, is_document),
            Outcome::Replace(node) => {
                if is_document {
                    store.replace_document(&self.page, node);
                } else {
                    store.replace_at(&self.page, path, node)?;
                }
                self.descend(store, path, is_document);
            }
            Outcome::Substitute(node) => {
                if is_document {
                    store.replace_document(&self.page, node);
                } else {
                    store.replace_at(&self.page, path, node)?;
                }
            }
            Outcome::Remove => {
                if is_document {
                    store.remove(&self.page);
                    return Ok(Flow::Stop);
                }
                store.remove_at(&self.page, path)?;
                if let Some(parent) = self.stack.last_mut()
                    && !path.is_empty()
                {
                    parent.next = parent.next.saturating_sub(1);
                }
            }
            Outcome::SkipChildren => {}
            Outcome::Break => return Ok(Flow::Stop),
            Outcome::Reposition(index) => {
                if !path.is_empty()
                    && let Some(parent) = self.stack.last_mut()
                {
                    parent.next = index;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn descend(&mut self, store: &RootStore, path: &NodePath, is_document: bool) {
        if is_document {
            self.pending = Some(Pending::Contents);
        } else if store
            .node_at(&self.page, path)
            .is_some_and(Node::is_collection)
        {
            self.stack.push(Frame {
                path: path.clone(),
                next: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(name: &str, value: serde_json::Value) -> RootStore {
        let mut store = RootStore::new();
        store.set(name, Node::from(value));
        store
    }

    fn visited_paths(store: &mut RootStore, page: &str) -> Vec<String> {
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<String>>| {
            if !ctx.is_document() {
                ctx.data.push(ctx.path.to_string());
            }
            Ok(Outcome::Keep)
        });
        let mut paths = Vec::new();
        traversal.visit(store, page, &mut paths).unwrap();
        paths
    }

    #[test]
    fn test_document_order() {
        let mut store = store_with("P", json!({"a": {"b": 1}, "c": [2, {"d": 3}]}));
        assert_eq!(
            visited_paths(&mut store, "P"),
            vec!["(root)", "a", "a.b", "c", "c[0]", "c[1]", "c[1].d"]
        );
    }

    #[test]
    fn test_replace_descends_into_replacement() {
        let mut store = store_with("P", json!({"a": "swap", "z": 0}));
        let mut seen = Vec::new();
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, ()>| {
            seen.push(ctx.path.to_string());
            if ctx.node.as_str() == Some("swap") {
                return Ok(Outcome::Replace(Node::from(json!({"inner": true}))));
            }
            Ok(Outcome::Keep)
        });
        traversal.visit(&mut store, "P", &mut ()).unwrap();
        drop(traversal);

        assert_eq!(seen, vec!["(root)", "(root)", "a", "a.inner", "z"]);
        assert_eq!(store.get("P.a.inner"), Some(&Node::from(true)));
    }

    #[test]
    fn test_remove_continues_with_next_sibling() {
        let mut store = store_with("P", json!({"items": [1, "drop", "drop", 4]}));
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<Node>>| {
            if ctx.node.as_str() == Some("drop") {
                return Ok(Outcome::Remove);
            }
            if ctx.path.len() == 2 {
                ctx.data.push(ctx.node.clone());
            }
            Ok(Outcome::Keep)
        });
        let mut kept = Vec::new();
        traversal.visit(&mut store, "P", &mut kept).unwrap();
        assert_eq!(kept, vec![Node::from(1), Node::from(4)]);
        assert_eq!(store.get("P.items").unwrap().as_seq().unwrap().len(), 2);
    }

    #[test]
    fn test_substitute_does_not_descend() {
        let mut store = store_with("P", json!({"a": "swap", "z": 0}));
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<String>>| {
            ctx.data.push(ctx.path.to_string());
            if ctx.node.as_str() == Some("swap") {
                return Ok(Outcome::Substitute(Node::from(json!({"inner": "swap"}))));
            }
            Ok(Outcome::Keep)
        });
        let mut seen = Vec::new();
        traversal.visit(&mut store, "P", &mut seen).unwrap();
        drop(traversal);

        assert_eq!(seen, vec!["(root)", "(root)", "a", "z"]);
        assert_eq!(store.get("P.a.inner"), Some(&Node::from("swap")));
    }

    #[test]
    fn test_remove_map_entry_continues_with_next_key() {
        let mut store = store_with("P", json!({"a": 1, "drop": {"x": 2}, "b": {"c": 3}, "d": 4}));
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<String>>| {
            ctx.data.push(ctx.path.to_string());
            Ok(match ctx.key.and_then(PathSegment::as_key) {
                Some("drop") => Outcome::Remove,
                _ => Outcome::Keep,
            })
        });
        let mut seen = Vec::new();
        traversal.visit(&mut store, "P", &mut seen).unwrap();

        assert_eq!(seen, vec!["(root)", "(root)", "a", "drop", "b", "b.c", "d"]);
        assert_eq!(
            store.snapshot(),
            json!({"P": {"a": 1, "b": {"c": 3}, "d": 4}})
        );
    }

    #[test]
    fn test_callback_node_is_unaffected_by_its_own_writes() {
        let mut store = store_with("P", json!({"a": {"n": 1}, "z": 0}));
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<Node>>| {
            if ctx.key.and_then(PathSegment::as_key) == Some("a") {
                ctx.store.set_path(&["P", "a", "n"], Node::from(2))?;
                ctx.store.set_path(&["P", "z"], Node::from(9))?;
                ctx.data.push(ctx.node.clone());
            }
            if ctx.path.to_string() == "z" {
                ctx.data.push(ctx.node.clone());
            }
            Ok(Outcome::Keep)
        });
        let mut seen = Vec::new();
        traversal.visit(&mut store, "P", &mut seen).unwrap();

        assert_eq!(seen, vec![Node::from(json!({"n": 1})), Node::from(9)]);
        assert_eq!(store.get("P.a.n"), Some(&Node::from(2)));
    }

    #[test]
    fn test_skip_children_and_break() {
        let mut store = store_with("P", json!({"skip": {"hidden": 1}, "stop": 2, "after": 3}));
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<String>>| {
            ctx.data.push(ctx.path.to_string());
            Ok(match ctx.key.and_then(PathSegment::as_key) {
                Some("skip") => Outcome::SkipChildren,
                Some("stop") => Outcome::Break,
                _ => Outcome::Keep,
            })
        });
        let mut seen = Vec::new();
        let status = traversal.visit(&mut store, "P", &mut seen).unwrap();
        assert_eq!(status, VisitStatus::Stopped);
        assert_eq!(seen, vec!["(root)", "(root)", "skip", "stop"]);
    }

    #[test]
    fn test_reposition_revisits_siblings() {
        let mut store = store_with("P", json!({"list": ["a", "b"]}));
        let mut rewound = false;
        let mut traversal = Traversal::new();
        traversal.use_callback(|ctx: &mut VisitContext<'_, Vec<String>>| {
            if let Some(s) = ctx.node.as_str() {
                ctx.data.push(s.to_string());
                if s == "b" && !rewound {
                    rewound = true;
                    return Ok(Outcome::Reposition(0));
                }
            }
            Ok(Outcome::Keep)
        });
        let mut seen = Vec::new();
        traversal.visit(&mut store, "P", &mut seen).unwrap();
        assert_eq!(seen, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_init_runs_once() {
        let mut store = store_with("P", json!({"a": 1}));
        let mut traversal = Traversal::new();
        traversal.on_init(|store: &mut RootStore, count: &mut usize| {
            *count += 1;
            store.set("Extra", Node::from(1));
            Ok(())
        });
        let mut count = 0;
        traversal.visit(&mut store, "P", &mut count).unwrap();
        traversal.visit(&mut store, "P", &mut count).unwrap();
        assert_eq!(count, 1);
        assert!(store.contains("Extra"));
    }

    #[test]
    fn test_removing_the_document_stops() {
        let mut store = store_with("P", json!({"a": 1}));
        let mut traversal: Traversal<'_, ()> = Traversal::new();
        traversal.use_callback(|_ctx| Ok(Outcome::Remove));
        let status = traversal.visit(&mut store, "P", &mut ()).unwrap();
        assert_eq!(status, VisitStatus::Stopped);
        assert!(!store.contains("P"));
    }

    #[test]
    fn test_missing_document_is_an_error() {
        let mut store = RootStore::new();
        let mut traversal: Traversal<'_, ()> = Traversal::new();
        let err = traversal.visit(&mut store, "Nope", &mut ()).unwrap_err();
        assert!(matches!(err, NoodlError::MissingDocument(name) if name == "Nope"));
    }

    struct Recorder {
        seen: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl AsyncVisitor for Recorder {
        async fn init(&self, store: &RefCell<RootStore>) -> Result<()> {
            store.borrow_mut().set("Loaded", Node::from(true));
            Ok(())
        }

        async fn visit(&self, ctx: AsyncVisitContext<'_>) -> Result<Outcome> {
            futures::future::ready(()).await;
            self.seen.borrow_mut().push(ctx.path.to_string());
            if ctx.node.as_str() == Some("double") {
                let doubled = ctx.store.borrow().get("P.n").cloned();
                return Ok(doubled.map_or(Outcome::Keep, Outcome::Replace));
            }
            Ok(Outcome::Keep)
        }
    }

    #[test]
    fn test_async_traversal_preserves_order() {
        let store = RefCell::new(store_with("P", json!({"n": 2, "x": "double", "y": [1]})));
        let recorder = Recorder {
            seen: RefCell::new(Vec::new()),
        };
        let mut traversal = AsyncTraversal::new();
        traversal.use_visitor(&recorder);
        let status = pollster::block_on(traversal.visit(&store, "P")).unwrap();

        assert_eq!(status, VisitStatus::Completed);
        assert_eq!(
            recorder.seen.into_inner(),
            vec!["(root)", "(root)", "n", "x", "y", "y[0]"]
        );
        let store = store.into_inner();
        assert_eq!(store.get("P.x"), Some(&Node::from(2)));
        assert!(store.contains("Loaded"));
    }
}
