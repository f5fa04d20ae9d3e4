//! Validation rules applied to every node during a run.
//!
//! A rule is a predicate over `(NodeKind, &Node)` plus a handler. For each
//! visited node the [`RuleSet`] calls the handler of every matching rule in
//! registration order until one returns an [`Outcome`]; if none matches,
//! the run's default callback decides.

mod builtin;
mod goto;
mod reference;
mod tags;

pub use builtin::BuiltinRule;
pub use goto::GotoRule;
pub use reference::ReferenceRule;
pub use tags::TagRule;

use crate::builtins::BuiltinRegistry;
use crate::diagnostics::{Diagnostic, DiagnosticNode, Report};
use crate::error::Result;
use crate::markers::Markers;
use crate::resolver::{Expansion, PathAncestors, Resolution, Resolver};
use crate::store::RootStore;
use crate::traverse::Outcome;
use noodl_yaml::{Node, NodeKind, NodePath, PathSegment};

/// One semantic check.
pub trait Rule: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn matches(&self, kind: NodeKind, node: &Node) -> bool;

    /// Inspect the node, report through `ctx`, and optionally steer the walk.
    ///
    /// Returning `Ok(None)` lets later rules run on the same node.
    fn handle(&self, ctx: &mut RuleContext<'_>) -> Result<Option<Outcome>>;
}

/// What a rule handler can see and do.
pub struct RuleContext<'a> {
    pub node: &'a Node,
    pub key: Option<&'a PathSegment>,
    pub path: &'a NodePath,
    pub page: &'a str,
    pub store: &'a mut RootStore,
    pub markers: &'a Markers,
    pub builtins: &'a BuiltinRegistry,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        node: &'a Node,
        key: Option<&'a PathSegment>,
        path: &'a NodePath,
        page: &'a str,
        store: &'a mut RootStore,
        markers: &'a Markers,
        builtins: &'a BuiltinRegistry,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            node,
            key,
            path,
            page,
            store,
            markers,
            builtins,
            diagnostics,
        }
    }

    /// Record a diagnostic about the current node.
    pub fn add(&mut self, report: Report) -> Result<()> {
        let mut diagnostic = Diagnostic {
            node: Some(DiagnosticNode::new(self.node).with_path(self.path.clone())),
            ..Diagnostic::new(Some(self.page), None)
        };
        report.apply(&mut diagnostic)?;
        tracing::debug!(
            page = self.page,
            path = %self.path,
            codes = ?diagnostic.codes(),
            "Diagnostic added"
        );
        self.diagnostics.push(diagnostic);
        Ok(())
    }

    /// Diagnostics recorded so far for this document.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    /// Resolve `reference` from the current document and node.
    pub fn resolve(&self, reference: &str) -> Resolution {
        let ancestors = PathAncestors::new(&*self.store, self.page, self.path);
        Resolver::new(&*self.store, self.markers)
            .with_ancestors(&ancestors)
            .resolve(reference, self.page)
    }

    /// Resolve `node` if it is a reference, otherwise return a copy.
    pub fn resolve_node(&self, node: &Node) -> Resolution {
        let ancestors = PathAncestors::new(&*self.store, self.page, self.path);
        Resolver::new(&*self.store, self.markers)
            .with_ancestors(&ancestors)
            .resolve_node(node, self.page)
    }

    /// Expand a collection `value` that `reference`, written in the current
    /// document, resolved to in document `scope`.
    pub fn expand(&self, reference: &str, value: &Node, scope: &str) -> Expansion {
        Resolver::new(&*self.store, self.markers).expand(reference, self.page, value, scope)
    }

    /// Copy of `node` with all references inside resolved where possible.
    pub fn resolve_deep(&self, node: &Node) -> Node {
        let ancestors = PathAncestors::new(&*self.store, self.page, self.path);
        Resolver::new(&*self.store, self.markers)
            .with_ancestors(&ancestors)
            .resolve_deep(node, self.page)
    }
}

/// Ordered collection of rules.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    /// No rules at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// References, navigation, tag bindings and built-in calls.
    pub fn with_defaults() -> Self {
        let mut rules = Self::new();
        rules
            .push(BuiltinRule)
            .push(ReferenceRule)
            .push(GotoRule)
            .push(TagRule::view_tag())
            .push(TagRule::pop_up_view());
        rules
    }

    pub fn push(&mut self, rule: impl Rule + 'static) -> &mut Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the matching rules for `ctx.node`.
    ///
    /// Returns `None` when no rule matched, and `Some(Outcome::Keep)` when
    /// rules matched but none steered the walk.
    pub fn dispatch(&self, ctx: &mut RuleContext<'_>) -> Result<Option<Outcome>> {
        let kind = ctx.node.kind();
        let mut matched = false;
        for rule in &self.rules {
            if !rule.matches(kind, ctx.node) {
                continue;
            }
            matched = true;
            tracing::trace!(rule = rule.name(), page = ctx.page, path = %ctx.path, "Rule matched");
            if let Some(outcome) = rule.handle(ctx)? {
                return Ok(Some(outcome));
            }
        }
        Ok(matched.then_some(Outcome::Keep))
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
