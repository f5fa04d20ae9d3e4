//! Reference resolution and semantic validation for NOODL documents.
//!
//! A NOODL application is a set of named YAML documents (pages, the root
//! config, the app config) held in a [`RootStore`]. This crate provides:
//!
//! - [`Reference`] parsing for the reference string grammar (`.Root.x`,
//!   `..local`, `=.eval`, `~/asset`, `__.ancestor`)
//! - a [`Resolver`] that chases chained references across documents and
//!   records a [`TraceEntry`] per hop
//! - a mutating [`Traversal`] engine (plus [`AsyncTraversal`]) driven by
//!   [`Outcome`] control signals
//! - the [`Diagnostics`] runner, which applies a [`RuleSet`] to every
//!   document and collects [`Diagnostic`] reports
//!
//! ```rust
//! use noodl_core::{Diagnostics, MarkerFlag, RootStore, RunOptions};
//! use noodl_yaml::parse;
//!
//! let mut store = RootStore::new();
//! store.set("SignIn", parse("SignIn:\n  title: .Global.appName").unwrap());
//! store.set("Global", parse("appName: Aitmed").unwrap());
//!
//! let mut diagnostics = Diagnostics::new(store);
//! diagnostics.mark(MarkerFlag::Page, "SignIn");
//! let reports = diagnostics.run(RunOptions::default()).unwrap();
//!
//! assert!(reports.is_empty());
//! let title = diagnostics.store().get("SignIn.title").and_then(|n| n.as_str());
//! assert_eq!(title, Some("Aitmed"));
//! ```

pub mod builtins;
pub mod diagnostics;
pub mod error;
pub mod markers;
pub mod reference;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod traverse;

pub use builtins::{BuiltinContext, BuiltinEntry, BuiltinFunction, BuiltinRegistry};
pub use diagnostics::{
    AsyncRunOptions, Diagnostic, DiagnosticNode, Diagnostics, Report, RunOptions,
};
pub use error::{NoodlError, Result};
pub use markers::{MarkerFlag, Markers};
pub use reference::{Reference, ReferenceKind};
pub use resolver::{
    AncestorLookup, Expansion, PathAncestors, Resolution, ResolutionStatus, Resolver,
    TraceEntry,
};
pub use rules::{Rule, RuleContext, RuleSet};
pub use store::RootStore;
pub use traverse::{
    AsyncTraversal, AsyncVisitContext, AsyncVisitor, Outcome, Traversal, VisitContext,
    VisitStatus,
};

// Re-export the node model so callers need only one dependency
pub use noodl_error_reporting::{DiagnosticCode, DiagnosticLevel, DiagnosticMessage};
pub use noodl_yaml::{Node, NodeKind, NodePath, PathSegment, Scalar, SourceInfo};
