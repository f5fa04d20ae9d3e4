//! # noodl-yaml
//!
//! Tree nodes for NOODL documents.
//!
//! Every value handled by the validation engine is a [`Node`]: exactly one of
//! scalar, pair, map, sequence or document. Nodes optionally carry a
//! [`SourceInfo`] so diagnostics can point back at the original text.
//!
//! ## Design
//!
//! The node model is a closed tagged union that is independent of any
//! particular parsing library. Two adapters feed it:
//!
//! - [`parse`] / [`parse_file`] read YAML text through `yaml-rust2`'s marked
//!   event stream and record offsets for every node.
//! - `Node::from(serde_json::Value)` wraps raw hierarchical values handed over
//!   by loaders that already decoded their input.
//!
//! [`Node::to_json`] goes the other way and produces the JSON-able snapshot
//! consumed by downstream renderers.
//!
//! ## Example
//!
//! ```rust
//! use noodl_yaml::{parse, NodeKind};
//!
//! let doc = parse("SignIn:\n  components: []\n").unwrap();
//! assert_eq!(doc.kind(), NodeKind::Document);
//! let page = doc.get("SignIn").unwrap();
//! assert_eq!(page.kind(), NodeKind::Map);
//! ```

mod convert;
mod error;
mod node;
mod parser;
mod path;
mod source_info;

pub use error::{Error, Result};
pub use node::{
    DocumentNode, MapEntry, MapNode, Node, NodeKind, PairNode, Scalar, ScalarNode, SeqNode,
};
pub use parser::{parse, parse_file};
pub use path::{NodePath, PathSegment};
pub use source_info::SourceInfo;
