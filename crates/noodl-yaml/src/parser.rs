//! YAML parser that builds node trees with source locations.

use crate::{Error, MapEntry, MapNode, Node, Result, Scalar, ScalarNode, SeqNode, SourceInfo};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Parse YAML from a string, producing a `Node::Document`.
///
/// This parses a single YAML document. If the input contains multiple documents,
/// only the first one will be parsed.
///
/// # Example
///
/// ```rust
/// use noodl_yaml::parse;
///
/// let doc = parse("title: Sign In").unwrap();
/// assert_eq!(doc.get("title").and_then(|n| n.as_str()), Some("Sign In"));
/// ```
///
/// # Errors
///
/// Returns an error if the YAML is invalid or if parsing fails.
pub fn parse(content: &str) -> Result<Node> {
    parse_impl(content, None)
}

/// Parse YAML from a string with an associated filename.
///
/// The filename is included in source location information for better
/// error reporting.
///
/// ```rust
/// use noodl_yaml::parse_file;
///
/// let doc = parse_file("title: Sign In", "SignIn.yml").unwrap();
/// let file = doc.source_info().and_then(|s| s.file.as_deref());
/// assert_eq!(file, Some("SignIn.yml"));
/// ```
///
/// # Errors
///
/// Returns an error if the YAML is invalid or if parsing fails.
pub fn parse_file(content: &str, filename: &str) -> Result<Node> {
    parse_impl(content, Some(filename))
}

fn parse_impl(content: &str, filename: Option<&str>) -> Result<Node> {
    let mut parser = Parser::new_from_str(content);
    let mut builder = NodeBuilder::new(filename);

    parser.load(&mut builder, false)?; // single document only

    builder.result()
}

/// Receives marked events and assembles the node tree.
struct NodeBuilder {
    filename: Option<String>,

    /// Stack of collections being constructed
    stack: Vec<BuildNode>,

    /// The completed root node
    root: Option<Node>,

    /// Start of the document, once seen
    document_start: Option<Marker>,

    /// First structural problem; events cannot return errors directly
    error: Option<Error>,
}

enum BuildNode {
    Sequence {
        start_marker: Marker,
        items: Vec<Node>,
    },
    Mapping {
        start_marker: Marker,
        map: MapNode,
        /// Key waiting for its value
        pending_key: Option<(String, Option<SourceInfo>)>,
    },
}

impl NodeBuilder {
    fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(str::to_string),
            stack: Vec::new(),
            root: None,
            document_start: None,
            error: None,
        }
    }

    fn result(mut self) -> Result<Node> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let root = self
            .root
            .take()
            .ok_or(Error::UnexpectedEof { location: None })?;
        let len = root
            .source_info()
            .map(SourceInfo::end_offset)
            .unwrap_or_default();
        let info = match &self.document_start {
            Some(marker) => self.make_source_info(marker, len.saturating_sub(marker.index())),
            None => SourceInfo::new(self.filename.clone(), 0, 1, 1, len),
        };
        Ok(Node::document(root).with_source_info(info))
    }

    fn fail(&mut self, message: &str, marker: &Marker) {
        if self.error.is_none() {
            self.error = Some(Error::InvalidStructure {
                message: message.to_string(),
                location: Some(self.make_source_info(marker, 0)),
            });
        }
    }

    fn push_complete(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(BuildNode::Sequence { items, .. }) => items.push(node),
            Some(BuildNode::Mapping {
                map, pending_key, ..
            }) => match pending_key.take() {
                Some((key, key_span)) => map.insert_entry(MapEntry {
                    key,
                    value: node,
                    key_span,
                }),
                None => {
                    let key_span = node.source_info().cloned();
                    *pending_key = Some((key_text(&node), key_span));
                }
            },
        }
    }

    fn make_source_info(&self, marker: &Marker, len: usize) -> SourceInfo {
        let info = SourceInfo::from_marker(marker, len);
        match &self.filename {
            Some(filename) => info.with_file(filename.clone()),
            None => info,
        }
    }
}

impl MarkedEventReceiver for NodeBuilder {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::Nothing | Event::StreamStart | Event::StreamEnd | Event::DocumentEnd => {}

            Event::DocumentStart => {
                self.document_start.get_or_insert(marker);
            }

            Event::Scalar(value, style, _anchor_id, _tag) => {
                let source_info = self.make_source_info(&marker, value.len());
                let scalar = if style == TScalarStyle::Plain {
                    parse_plain_scalar(&value)
                } else {
                    Scalar::Str(value)
                };
                self.push_complete(Node::Scalar(ScalarNode {
                    value: scalar,
                    source_info: Some(source_info),
                }));
            }

            Event::SequenceStart(_anchor_id, _tag) => {
                self.stack.push(BuildNode::Sequence {
                    start_marker: marker,
                    items: Vec::new(),
                });
            }

            Event::SequenceEnd => match self.stack.pop() {
                Some(BuildNode::Sequence {
                    start_marker,
                    items,
                }) => {
                    let len = marker.index().saturating_sub(start_marker.index());
                    let source_info = self.make_source_info(&start_marker, len);
                    self.push_complete(Node::Seq(SeqNode {
                        items,
                        source_info: Some(source_info),
                    }));
                }
                _ => self.fail("sequence end without sequence start", &marker),
            },

            Event::MappingStart(_anchor_id, _tag) => {
                self.stack.push(BuildNode::Mapping {
                    start_marker: marker,
                    map: MapNode::new(),
                    pending_key: None,
                });
            }

            Event::MappingEnd => match self.stack.pop() {
                Some(BuildNode::Mapping {
                    start_marker,
                    mut map,
                    pending_key,
                }) => {
                    if pending_key.is_some() {
                        self.fail("mapping entry without value", &marker);
                        return;
                    }
                    let len = marker.index().saturating_sub(start_marker.index());
                    map.source_info = Some(self.make_source_info(&start_marker, len));
                    self.push_complete(Node::Map(map));
                }
                _ => self.fail("mapping end without mapping start", &marker),
            },

            Event::Alias(_anchor_id) => {
                // Aliases are not supported; they load as null
                let source_info = self.make_source_info(&marker, 0);
                self.push_complete(Node::null().with_source_info(source_info));
            }
        }
    }
}

/// Text of a mapping key. Non-scalar keys are stringified as JSON.
fn key_text(node: &Node) -> String {
    match node.as_scalar() {
        Some(Scalar::Str(s)) => s.clone(),
        Some(scalar) => scalar.to_string(),
        None => node.to_json().to_string(),
    }
}

/// Resolve a plain (unquoted) scalar using the YAML 1.2 core schema.
fn parse_plain_scalar(value: &str) -> Scalar {
    match value {
        "true" | "True" | "TRUE" => return Scalar::Bool(true),
        "false" | "False" | "FALSE" => return Scalar::Bool(false),
        "null" | "Null" | "NULL" | "~" | "" => return Scalar::Null,
        _ => {}
    }

    if let Ok(i) = value.parse::<i64>() {
        return Scalar::Int(i);
    }

    // Only accept things that look numeric; `f64::from_str` also takes "inf" and "NaN"
    let numeric = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric && let Ok(x) = value.parse::<f64>() {
        return Scalar::Float(x);
    }

    Scalar::Str(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    #[test]
    fn test_parse_scalar_document() {
        let doc = parse("hello").unwrap();
        assert_eq!(doc.kind(), NodeKind::Document);
        assert_eq!(doc.contents().unwrap().as_str(), Some("hello"));
    }

    #[test]
    fn test_parse_plain_scalars() {
        let doc = parse("a: 42\nb: true\nc: ~\nd: 1.5\ne: .Global.x").unwrap();
        assert_eq!(doc.get("a"), Some(&Node::from(42)));
        assert_eq!(doc.get("b"), Some(&Node::from(true)));
        assert!(doc.get("c").unwrap().is_null());
        assert_eq!(doc.get("d"), Some(&Node::from(1.5)));
        assert_eq!(doc.get("e").unwrap().as_str(), Some(".Global.x"));
    }

    #[test]
    fn test_quoted_scalars_stay_strings() {
        let doc = parse("viewTag: \"123\"\nflag: 'true'").unwrap();
        assert_eq!(doc.get("viewTag").unwrap().as_str(), Some("123"));
        assert_eq!(doc.get("flag").unwrap().as_str(), Some("true"));
    }

    #[test]
    fn test_parse_nested_structure() {
        let doc = parse(
            r#"
SignIn:
  components:
    - type: view
      viewTag: redTag
    - type: button
"#,
        )
        .unwrap();

        let components = doc.get("SignIn").unwrap().get("components").unwrap();
        assert_eq!(components.kind(), NodeKind::Seq);
        assert_eq!(components.as_seq().unwrap().len(), 2);
        let first = &components.as_seq().unwrap()[0];
        assert_eq!(first.get("viewTag").unwrap().as_str(), Some("redTag"));
    }

    #[test]
    fn test_source_info_tracking() {
        let doc = parse("title: Sign In\nnext: Home").unwrap();
        let next = doc.get("next").unwrap();
        let info = next.source_info().unwrap();
        assert_eq!(info.line, 2);
        assert_eq!(info.col, 7);
        assert_eq!(info.len, 4);

        let entry = &doc.contents().unwrap().entries().unwrap()[1];
        assert_eq!(entry.key_span.as_ref().unwrap().line, 2);
    }

    #[test]
    fn test_parse_with_filename() {
        let doc = parse_file("title: Test", "SignIn.yml").unwrap();
        let title = doc.get("title").unwrap();
        assert_eq!(
            title.source_info().unwrap().file.as_deref(),
            Some("SignIn.yml")
        );
    }

    #[test]
    fn test_document_location() {
        let doc = parse_file("title: Test", "SignIn.yml").unwrap();
        let info = doc.source_info().unwrap();
        assert_eq!(info.file.as_deref(), Some("SignIn.yml"));
        assert_eq!((info.offset, info.line, info.col), (0, 1, 1));

        // No document start seen: the location falls back to the file start
        let mut builder = NodeBuilder::new(Some("Bare.yml"));
        builder.root = Some(Node::from(1));
        let doc = builder.result().unwrap();
        let info = doc.source_info().unwrap();
        assert_eq!(info.file.as_deref(), Some("Bare.yml"));
        assert_eq!((info.offset, info.line, info.col), (0, 1, 1));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse("a: [1, 2").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
        assert!(err.location().is_some());
    }

    #[test]
    fn test_plain_inf_is_a_string() {
        let doc = parse("a: inf").unwrap();
        assert_eq!(doc.get("a").unwrap().as_str(), Some("inf"));
    }
}
