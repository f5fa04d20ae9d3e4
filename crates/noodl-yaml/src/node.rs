//! Tree nodes with source location tracking.

use crate::{PathSegment, SourceInfo};
use serde::Serialize;
use std::fmt;

/// The category of a tree node.
///
/// Rule predicates dispatch on this instead of inspecting node internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Scalar,
    Pair,
    Map,
    Seq,
    Document,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Scalar => "scalar",
            NodeKind::Pair => "pair",
            NodeKind::Map => "map",
            NodeKind::Seq => "seq",
            NodeKind::Document => "document",
        };
        f.write_str(name)
    }
}

/// A primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// String contents, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// A scalar node.
#[derive(Debug, Clone)]
pub struct ScalarNode {
    pub value: Scalar,
    pub source_info: Option<SourceInfo>,
}

/// A standalone key/value pair.
///
/// Map entries are stored inline in [`MapNode`]; a `PairNode` only appears
/// where a pair is a value in its own right (e.g. an item of a sequence).
#[derive(Debug, Clone)]
pub struct PairNode {
    pub key: String,
    pub value: Node,
    pub source_info: Option<SourceInfo>,
}

/// One entry of a map.
#[derive(Debug, Clone)]
pub struct MapEntry {
    pub key: String,
    pub value: Node,
    /// Source location of just the key
    pub key_span: Option<SourceInfo>,
}

/// An ordered map with unique keys.
///
/// Entry order is insertion order and lookups are first-match.
#[derive(Debug, Clone, Default)]
pub struct MapNode {
    entries: Vec<MapEntry>,
    pub source_info: Option<SourceInfo>,
}

/// An ordered sequence of nodes.
#[derive(Debug, Clone, Default)]
pub struct SeqNode {
    pub items: Vec<Node>,
    pub source_info: Option<SourceInfo>,
}

/// A document wrapping a single root node.
#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub contents: Node,
    pub source_info: Option<SourceInfo>,
}

/// A tree node: exactly one of scalar, pair, map, sequence or document.
///
/// Equality compares structure and values only; source locations are
/// ignored.
#[derive(Debug, Clone)]
pub enum Node {
    Scalar(ScalarNode),
    Pair(Box<PairNode>),
    Map(MapNode),
    Seq(SeqNode),
    Document(Box<DocumentNode>),
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            return Some(std::mem::replace(&mut entry.value, value));
        }
        self.entries.push(MapEntry {
            key,
            value,
            key_span: None,
        });
        None
    }

    /// Insert a fully-formed entry (keeps the key span), replacing in place.
    pub fn insert_entry(&mut self, entry: MapEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.key == entry.key) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|e| e.key == key)
            .map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(index).value)
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn entry_at(&self, index: usize) -> Option<&MapEntry> {
        self.entries.get(index)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Node)> for MapNode {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut map = MapNode::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl Node {
    /// Null scalar with no source location.
    pub fn null() -> Self {
        Node::Scalar(ScalarNode {
            value: Scalar::Null,
            source_info: None,
        })
    }

    pub fn scalar(value: Scalar) -> Self {
        Node::Scalar(ScalarNode {
            value,
            source_info: None,
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::scalar(Scalar::Str(value.into()))
    }

    pub fn pair(key: impl Into<String>, value: Node) -> Self {
        Node::Pair(Box::new(PairNode {
            key: key.into(),
            value,
            source_info: None,
        }))
    }

    pub fn map(map: MapNode) -> Self {
        Node::Map(map)
    }

    pub fn seq(items: Vec<Node>) -> Self {
        Node::Seq(SeqNode {
            items,
            source_info: None,
        })
    }

    /// Wrap a node into a document. Documents are returned unchanged.
    pub fn document(contents: Node) -> Self {
        match contents {
            Node::Document(_) => contents,
            other => Node::Document(Box::new(DocumentNode {
                contents: other,
                source_info: None,
            })),
        }
    }

    /// Classify this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Scalar(_) => NodeKind::Scalar,
            Node::Pair(_) => NodeKind::Pair,
            Node::Map(_) => NodeKind::Map,
            Node::Seq(_) => NodeKind::Seq,
            Node::Document(_) => NodeKind::Document,
        }
    }

    pub fn source_info(&self) -> Option<&SourceInfo> {
        match self {
            Node::Scalar(n) => n.source_info.as_ref(),
            Node::Pair(n) => n.source_info.as_ref(),
            Node::Map(n) => n.source_info.as_ref(),
            Node::Seq(n) => n.source_info.as_ref(),
            Node::Document(n) => n.source_info.as_ref(),
        }
    }

    pub fn with_source_info(mut self, info: SourceInfo) -> Self {
        let slot = match &mut self {
            Node::Scalar(n) => &mut n.source_info,
            Node::Pair(n) => &mut n.source_info,
            Node::Map(n) => &mut n.source_info,
            Node::Seq(n) => &mut n.source_info,
            Node::Document(n) => &mut n.source_info,
        };
        *slot = Some(info);
        self
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(n) => Some(&n.value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapNode> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(seq) => Some(&seq.items),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&PairNode> {
        match self {
            Node::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    /// Contents of a document, or `None` for any other node.
    pub fn contents(&self) -> Option<&Node> {
        match self {
            Node::Document(doc) => Some(&doc.contents),
            _ => None,
        }
    }

    pub fn contents_mut(&mut self) -> Option<&mut Node> {
        match self {
            Node::Document(doc) => Some(&mut doc.contents),
            _ => None,
        }
    }

    /// Consume a document and return its contents; other nodes are returned as-is.
    pub fn into_contents(self) -> Node {
        match self {
            Node::Document(doc) => doc.contents,
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.as_scalar(), Some(Scalar::Null))
    }

    /// Whether this node has children to descend into.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Node::Pair(_) | Node::Map(_) | Node::Seq(_) | Node::Document(_)
        )
    }

    /// Look up a key: map entries, the key of a pair, or through a document.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(map) => map.get(key),
            Node::Pair(pair) if pair.key == key => Some(&pair.value),
            Node::Document(doc) => doc.contents.get(key),
            _ => None,
        }
    }

    /// Whether this node is a map (or document of a map) containing `key`.
    pub fn has_key(&self, key: &str) -> bool {
        match self {
            Node::Map(map) => map.contains_key(key),
            Node::Document(doc) => doc.contents.has_key(key),
            _ => false,
        }
    }

    /// Hop one segment down.
    ///
    /// Key segments match map keys and pair keys. A numeric key segment also
    /// indexes into a sequence, and an index segment into a map picks the
    /// entry at that position. Documents are transparent.
    pub fn child(&self, segment: &PathSegment) -> Option<&Node> {
        match (self, segment) {
            (Node::Document(doc), _) => doc.contents.child(segment),
            (Node::Map(map), PathSegment::Key(key)) => map.get(key),
            (Node::Map(map), PathSegment::Index(i)) => map.entry_at(*i).map(|e| &e.value),
            (Node::Seq(seq), PathSegment::Index(i)) => seq.items.get(*i),
            (Node::Seq(seq), PathSegment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|i| seq.items.get(i))
            }
            (Node::Pair(pair), PathSegment::Key(key)) if &pair.key == key => Some(&pair.value),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, segment: &PathSegment) -> Option<&mut Node> {
        match (self, segment) {
            (Node::Document(doc), _) => doc.contents.child_mut(segment),
            (Node::Map(map), PathSegment::Key(key)) => map.get_mut(key),
            (Node::Map(map), PathSegment::Index(i)) => {
                map.entries.get_mut(*i).map(|e| &mut e.value)
            }
            (Node::Seq(seq), PathSegment::Index(i)) => seq.items.get_mut(*i),
            (Node::Seq(seq), PathSegment::Key(key)) => match key.parse::<usize>() {
                Ok(i) => seq.items.get_mut(i),
                Err(_) => None,
            },
            (Node::Pair(pair), PathSegment::Key(key)) if &pair.key == key => {
                Some(&mut pair.value)
            }
            _ => None,
        }
    }

    /// Follow a sequence of segments.
    pub fn at<'a>(&self, segments: impl IntoIterator<Item = &'a PathSegment>) -> Option<&Node> {
        segments
            .into_iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Remove a direct child. Pairs and documents cannot lose their only child.
    pub fn remove_child(&mut self, segment: &PathSegment) -> Option<Node> {
        match (self, segment) {
            (Node::Map(map), PathSegment::Key(key)) => map.remove(key),
            (Node::Map(map), PathSegment::Index(i)) if *i < map.entries.len() => {
                Some(map.entries.remove(*i).value)
            }
            (Node::Seq(seq), PathSegment::Index(i)) if *i < seq.items.len() => {
                Some(seq.items.remove(*i))
            }
            _ => None,
        }
    }

    /// Number of direct children, as iterated by a traversal.
    pub fn child_count(&self) -> usize {
        match self {
            Node::Scalar(_) => 0,
            Node::Pair(_) | Node::Document(_) => 1,
            Node::Map(map) => map.len(),
            Node::Seq(seq) => seq.items.len(),
        }
    }

    /// Segment addressing the child at `index` in iteration order.
    ///
    /// Documents are not addressed by segment; traversal enters their
    /// contents directly.
    pub fn child_segment(&self, index: usize) -> Option<PathSegment> {
        match self {
            Node::Map(map) => map
                .entry_at(index)
                .map(|e| PathSegment::Key(e.key.clone())),
            Node::Seq(seq) if index < seq.items.len() => Some(PathSegment::Index(index)),
            Node::Pair(pair) if index == 0 => Some(PathSegment::Key(pair.key.clone())),
            _ => None,
        }
    }

    /// Map entries, if this node is a map.
    pub fn entries(&self) -> Option<&[MapEntry]> {
        self.as_map().map(MapNode::entries)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Scalar(a), Node::Scalar(b)) => a.value == b.value,
            (Node::Pair(a), Node::Pair(b)) => a.key == b.key && a.value == b.value,
            (Node::Map(a), Node::Map(b)) => {
                a.len() == b.len()
                    && a.entries
                        .iter()
                        .zip(&b.entries)
                        .all(|(x, y)| x.key == y.key && x.value == y.value)
            }
            (Node::Seq(a), Node::Seq(b)) => a.items == b.items,
            (Node::Document(a), Node::Document(b)) => a.contents == b.contents,
            _ => false,
        }
    }
}

impl From<Scalar> for Node {
    fn from(value: Scalar) -> Self {
        Node::scalar(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::string(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::string(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::scalar(Scalar::Int(value))
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::scalar(Scalar::Int(i64::from(value)))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::scalar(Scalar::Float(value))
    }
}

impl From<MapNode> for Node {
    fn from(value: MapNode) -> Self {
        Node::Map(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::seq(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> Node {
        let mut inner = MapNode::new();
        inner.insert("apple", Node::from(true));
        let mut map = MapNode::new();
        map.insert("C", Node::from(inner));
        map.insert("list", Node::from(vec![Node::from("a"), Node::from("b")]));
        Node::from(map)
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(Node::from("x").kind(), NodeKind::Scalar);
        assert_eq!(Node::pair("k", Node::null()).kind(), NodeKind::Pair);
        assert_eq!(sample_map().kind(), NodeKind::Map);
        assert_eq!(Node::seq(vec![]).kind(), NodeKind::Seq);
        assert_eq!(Node::document(Node::null()).kind(), NodeKind::Document);
    }

    #[test]
    fn test_document_does_not_double_wrap() {
        let doc = Node::document(Node::document(Node::from(1)));
        assert_eq!(doc.contents(), Some(&Node::from(1)));
    }

    #[test]
    fn test_map_insert_replaces_in_place() {
        let mut map = MapNode::new();
        map.insert("a", Node::from(1));
        map.insert("b", Node::from(2));
        let previous = map.insert("a", Node::from(3));
        assert_eq!(previous, Some(Node::from(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Node::from(3)));
    }

    #[test]
    fn test_child_hops() {
        let node = sample_map();
        let apple = node
            .at(&[PathSegment::from("C"), PathSegment::from("apple")])
            .unwrap();
        assert_eq!(apple, &Node::from(true));

        let b = node.child(&PathSegment::from("list")).unwrap();
        assert_eq!(b.child(&PathSegment::Index(1)), Some(&Node::from("b")));
        assert_eq!(b.child(&PathSegment::from("1")), Some(&Node::from("b")));
        assert_eq!(b.child(&PathSegment::Index(2)), None);
    }

    #[test]
    fn test_child_through_document_and_pair() {
        let doc = Node::document(sample_map());
        assert!(doc.child(&PathSegment::from("C")).is_some());

        let pair = Node::pair("k", Node::from(5));
        assert_eq!(pair.child(&PathSegment::from("k")), Some(&Node::from(5)));
        assert_eq!(pair.child(&PathSegment::from("other")), None);
    }

    #[test]
    fn test_equality_ignores_source_info() {
        let a = Node::from("x").with_source_info(SourceInfo::new(None, 4, 1, 5, 1));
        assert_eq!(a, Node::from("x"));
    }

    #[test]
    fn test_child_segments_follow_order() {
        let node = sample_map();
        assert_eq!(node.child_count(), 2);
        assert_eq!(node.child_segment(0), Some(PathSegment::from("C")));
        assert_eq!(node.child_segment(1), Some(PathSegment::from("list")));
        assert_eq!(node.child_segment(2), None);
    }

    #[test]
    fn test_remove_child() {
        let mut node = sample_map();
        assert!(node.remove_child(&PathSegment::from("C")).is_some());
        assert_eq!(node.child_count(), 1);

        let list = node.child_mut(&PathSegment::from("list")).unwrap();
        assert_eq!(list.remove_child(&PathSegment::Index(0)), Some(Node::from("a")));
        assert_eq!(list.as_seq().unwrap().len(), 1);
    }
}
