//! The root store: every named document of an application.

use crate::error::{NoodlError, Result};
use crate::reference::split_path;
use indexmap::IndexMap;
use noodl_yaml::{MapNode, Node, NodePath, PathSegment};
use serde_json::Value;
use std::sync::Arc;

/// Named documents, kept in insertion order.
///
/// Every stored value is a `Node::Document`. A document whose contents is a
/// map with exactly one key equal to the document's own name is flattened on
/// [`set`](RootStore::set), so `SignIn.yml` holding `SignIn: {...}` is stored
/// as the inner map.
///
/// Documents are shared handles: [`shared`](RootStore::shared) hands out a
/// read-only view without copying, and a write copies the document only
/// while such a view is still held.
#[derive(Debug, Clone, Default)]
pub struct RootStore {
    documents: IndexMap<String, Arc<Node>>,
}

impl RootStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, wrapping and flattening as needed.
    ///
    /// Returns the document previously stored under `name`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Node>) -> Option<Node> {
        let name = name.into();
        let document = flatten_self_wrap(&name, Node::document(value.into()));
        self.documents
            .insert(name, Arc::new(document))
            .map(Arc::unwrap_or_clone)
    }

    /// Store a document exactly as given (no flattening).
    pub(crate) fn replace_document(&mut self, name: &str, node: Node) {
        self.documents
            .insert(name.to_string(), Arc::new(Node::document(node)));
    }

    /// Node at a dotted path (`Pencil.listObject[2].options`).
    ///
    /// The first segment names a document; a path of one segment returns the
    /// document itself.
    pub fn get(&self, path: &str) -> Option<&Node> {
        self.get_segments(&split_path(path))
    }

    /// Node at a pre-split path.
    pub fn get_segments<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Node> {
        let (name, rest) = segments.split_first()?;
        let document: &Node = self.documents.get(name.as_ref())?;
        rest.iter().try_fold(document, |node, segment| {
            node.child(&PathSegment::Key(segment.as_ref().to_string()))
        })
    }

    /// Whether a dotted path exists.
    ///
    /// A trailing empty segment (`Doc.key.`) is treated as present when the
    /// path before it exists.
    pub fn has(&self, path: &str) -> bool {
        let mut segments = split_path(path);
        if segments.len() > 1 && segments.last().is_some_and(String::is_empty) {
            segments.pop();
        }
        self.get_segments(&segments).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.documents.shift_remove(name).map(Arc::unwrap_or_clone)
    }

    pub fn document(&self, name: &str) -> Option<&Node> {
        self.documents.get(name).map(Arc::as_ref)
    }

    /// Handle on document `name` that stays valid while the store is mutated.
    pub fn shared(&self, name: &str) -> Option<Arc<Node>> {
        self.documents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    /// Document names in store order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.documents.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Node at `path` below the contents of document `page`.
    pub fn node_at(&self, page: &str, path: &NodePath) -> Option<&Node> {
        self.documents.get(page)?.contents()?.at(path.segments())
    }

    fn node_at_mut(&mut self, page: &str, path: &[PathSegment]) -> Option<&mut Node> {
        let mut node = Arc::make_mut(self.documents.get_mut(page)?).contents_mut()?;
        for segment in path {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }

    /// Replace the node at `path`. An empty path replaces the contents.
    pub fn replace_at(&mut self, page: &str, path: &NodePath, node: Node) -> Result<()> {
        let slot = self
            .node_at_mut(page, path.segments())
            .ok_or_else(|| invalid_path(page, path))?;
        *slot = node;
        Ok(())
    }

    /// Remove the node at `path` from its parent.
    ///
    /// An empty path clears the contents to null.
    pub fn remove_at(&mut self, page: &str, path: &NodePath) -> Result<Node> {
        let Some(parent_path) = path.parent() else {
            let contents = self
                .node_at_mut(page, &[])
                .ok_or_else(|| NoodlError::MissingDocument(page.to_string()))?;
            return Ok(std::mem::replace(contents, Node::null()));
        };
        let segment = path.last().ok_or_else(|| invalid_path(page, path))?;
        self.node_at_mut(page, parent_path.segments())
            .and_then(|parent| parent.remove_child(segment))
            .ok_or_else(|| invalid_path(page, path))
    }

    /// Write `value` at a store path, creating the document and any missing
    /// intermediate maps.
    ///
    /// The first segment names the document. A numeric segment indexes an
    /// existing sequence; one past the end appends.
    pub fn set_path<S: AsRef<str>>(&mut self, segments: &[S], value: Node) -> Result<()> {
        let target = || {
            segments
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(".")
        };
        let Some((name, rest)) = segments.split_first() else {
            return Err(NoodlError::InvalidWriteTarget(String::new()));
        };
        let name = name.as_ref();
        let Some((last, intermediate)) = rest.split_last() else {
            self.set(name, value);
            return Ok(());
        };

        let document = self
            .documents
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Node::document(Node::map(MapNode::new()))));
        let mut node = Arc::make_mut(document)
            .contents_mut()
            .ok_or_else(|| NoodlError::InvalidWriteTarget(target()))?;
        if node.is_null() {
            *node = Node::map(MapNode::new());
        }

        for segment in intermediate {
            let segment = segment.as_ref();
            node = match node {
                Node::Map(map) => {
                    if !map.contains_key(segment) {
                        map.insert(segment, Node::map(MapNode::new()));
                    }
                    let child = map
                        .get_mut(segment)
                        .ok_or_else(|| NoodlError::InvalidWriteTarget(target()))?;
                    if child.is_null() {
                        *child = Node::map(MapNode::new());
                    }
                    child
                }
                other => other
                    .child_mut(&PathSegment::Key(segment.to_string()))
                    .filter(|child| child.is_collection())
                    .ok_or_else(|| NoodlError::InvalidWriteTarget(target()))?,
            };
        }

        let last = last.as_ref();
        match node {
            Node::Map(map) => {
                map.insert(last, value);
                Ok(())
            }
            Node::Seq(seq) => match last.parse::<usize>() {
                Ok(i) if i < seq.items.len() => {
                    seq.items[i] = value;
                    Ok(())
                }
                Ok(i) if i == seq.items.len() => {
                    seq.items.push(value);
                    Ok(())
                }
                _ => Err(NoodlError::InvalidWriteTarget(target())),
            },
            _ => Err(NoodlError::InvalidWriteTarget(target())),
        }
    }

    /// JSON object of every document's contents, keyed by name.
    pub fn snapshot(&self) -> Value {
        Value::Object(
            self.documents
                .iter()
                .map(|(name, doc)| (name.clone(), doc.to_json()))
                .collect(),
        )
    }
}

fn flatten_self_wrap(name: &str, document: Node) -> Node {
    let self_wrapped = document
        .contents()
        .and_then(Node::as_map)
        .is_some_and(|map| map.len() == 1 && map.contains_key(name));
    if !self_wrapped {
        return document;
    }
    let source_info = document.source_info().cloned();
    let inner = match document.into_contents() {
        Node::Map(mut map) => map.remove(name).unwrap_or_else(Node::null),
        other => other,
    };
    let flattened = Node::document(inner);
    match source_info {
        Some(info) => flattened.with_source_info(info),
        None => flattened,
    }
}

fn invalid_path(page: &str, path: &NodePath) -> NoodlError {
    NoodlError::InvalidPath {
        page: page.to_string(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodl_yaml::parse;
    use serde_json::json;

    fn store() -> RootStore {
        let mut store = RootStore::new();
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
    fn test_set_wraps_into_document() {
        let store = store();
        let doc = store.document("Pencil").unwrap();
        assert!(doc.contents().is_some());
        assert_eq!(store.get("Pencil.gender").unwrap().as_str(), Some("Male"));
    }

    #[test]
    fn test_self_wrap_is_flattened() {
        let mut store = RootStore::new();
        store.set("SignIn", parse("SignIn:\n  title: Welcome").unwrap());
        assert_eq!(store.get("SignIn.title").unwrap().as_str(), Some("Welcome"));
        assert!(store.get("SignIn.SignIn").is_none());

        // Two keys: kept as-is
        store.set("Other", Node::from(json!({"Other": 1, "more": 2})));
        assert_eq!(store.get("Other.Other"), Some(&Node::from(1)));
    }

    #[test]
    fn test_get_with_bracket_indices() {
        let store = store();
        let node = store.get("Pencil.listObject[2].options[0].findGender");
        assert_eq!(node.unwrap().as_str(), Some("..gender"));
        assert!(store.get("Pencil.listObject[9]").is_none());
        assert!(store.get("Missing.anything").is_none());
    }

    #[test]
    fn test_has_treats_trailing_separator_as_present() {
        let store = store();
        assert!(store.has("Pencil.gender"));
        assert!(store.has("Pencil.gender."));
        assert!(!store.has("Pencil.age."));
        assert!(store.has("Pencil"));
    }

    #[test]
    fn test_remove_keeps_order_of_the_rest() {
        let mut store = store();
        store.set("A", Node::from(1));
        store.set("B", Node::from(2));
        store.remove("A");
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["Pencil", "B"]);
    }

    #[test]
    fn test_replace_and_remove_by_node_path() {
        let mut store = store();
        let path: NodePath = [PathSegment::from("gender")].into_iter().collect();
        store.replace_at("Pencil", &path, Node::from("Female")).unwrap();
        assert_eq!(store.get("Pencil.gender").unwrap().as_str(), Some("Female"));

        let removed = store.remove_at("Pencil", &path).unwrap();
        assert_eq!(removed.as_str(), Some("Female"));
        assert!(!store.has("Pencil.gender"));

        assert!(store.remove_at("Pencil", &path).is_err());
    }

    #[test]
    fn test_set_path_creates_intermediate_maps() {
        let mut store = RootStore::new();
        store.set_path(&["X", "result", "value"], Node::from(42)).unwrap();
        assert_eq!(store.get("X.result.value"), Some(&Node::from(42)));

        store.set_path(&["Pencil", "listObject", "1"], Node::from("b")).unwrap();
        assert_eq!(store.get("Pencil.listObject[1]").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn test_set_path_rejects_scalar_parents() {
        let mut store = store();
        let err = store
            .set_path(&["Pencil", "gender", "code"], Node::from("M"))
            .unwrap_err();
        assert!(matches!(err, NoodlError::InvalidWriteTarget(t) if t == "Pencil.gender.code"));
    }

    #[test]
    fn test_shared_handle_survives_writes() {
        let mut store = store();
        let before = store.shared("Pencil").unwrap();
        store.set_path(&["Pencil", "gender"], Node::from("Female")).unwrap();

        assert_eq!(before.contents().unwrap().get("gender"), Some(&Node::from("Male")));
        assert_eq!(store.get("Pencil.gender"), Some(&Node::from("Female")));
        drop(before);

        let again = store.shared("Pencil").unwrap();
        assert!(std::ptr::eq(again.as_ref(), store.document("Pencil").unwrap()));
    }

    #[test]
    fn test_snapshot() {
        let mut store = RootStore::new();
        store.set("A", Node::from(json!({"x": 1})));
        store.set("B", Node::from("plain"));
        assert_eq!(store.snapshot(), json!({"A": {"x": 1}, "B": "plain"}));
    }
}
