use super::{Rule, RuleContext};
use crate::diagnostics::Report;
use crate::error::Result;
use crate::reference::Reference;
use crate::traverse::Outcome;
use noodl_error_reporting::DiagnosticCode;
use noodl_yaml::{Node, NodeKind};
use std::collections::HashSet;

/// Deepest component nesting searched for a matching tag.
const MAX_SEARCH_DEPTH: usize = 64;

/// Checks a tag binding key (`viewTag` or `popUpView`).
///
/// The value must contain a letter. When it sits on an action (a map with
/// `actionType`, or without `type`), some component of the page must carry
/// the same tag.
pub struct TagRule {
    key: &'static str,
    name: &'static str,
    invalid: DiagnosticCode,
    missing: DiagnosticCode,
}

impl TagRule {
    pub fn view_tag() -> Self {
        Self {
            key: "viewTag",
            name: "view-tag",
            invalid: DiagnosticCode::ViewTagInvalid,
            missing: DiagnosticCode::ViewTagMissingComponent,
        }
    }

    pub fn pop_up_view() -> Self {
        Self {
            key: "popUpView",
            name: "pop-up-view",
            invalid: DiagnosticCode::PopUpViewInvalid,
            missing: DiagnosticCode::PopUpViewMissingComponent,
        }
    }
}

impl Rule for TagRule {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, kind: NodeKind, node: &Node) -> bool {
        kind == NodeKind::Map && node.has_key(self.key)
    }

    fn handle(&self, ctx: &mut RuleContext<'_>) -> Result<Option<Outcome>> {
        let Some(raw) = ctx.node.get(self.key) else {
            return Ok(None);
        };

        let resolution = ctx.resolve_node(raw);
        let Some(value) = resolution.value else {
            // The reference rule reports unresolved references
            return Ok(None);
        };
        let tag = match value.as_scalar() {
            Some(scalar) if !scalar.is_null() => scalar.to_string(),
            _ => String::new(),
        };

        if !is_valid_tag(&tag) || value.as_str().is_none() {
            ctx.add(Report::coded(self.invalid, &[&tag]))?;
            return Ok(None);
        }

        if !is_action_like(ctx.node) {
            return Ok(None);
        }

        let components = ctx
            .store
            .document(ctx.page)
            .and_then(|doc| doc.get("components"))
            .cloned();
        let found = components.is_some_and(|components| {
            let mut search = TagSearch {
                ctx: &*ctx,
                key: self.key,
                tag: &tag,
                seen: HashSet::new(),
            };
            search.contains(&components, 0)
        });
        if !found {
            ctx.add(Report::coded(self.missing, &[tag.as_str(), ctx.page]))?;
        }
        Ok(None)
    }
}

/// Non-empty and contains at least one letter.
fn is_valid_tag(tag: &str) -> bool {
    tag.chars().any(char::is_alphabetic)
}

/// Actions carry `actionType`; components carry `type`.
fn is_action_like(node: &Node) -> bool {
    node.has_key("actionType") || !node.has_key("type")
}

/// Depth-first search of a component tree for a tag binding.
struct TagSearch<'c, 'a> {
    ctx: &'c RuleContext<'a>,
    key: &'static str,
    tag: &'c str,
    /// Reference strings already followed
    seen: HashSet<String>,
}

impl TagSearch<'_, '_> {
    fn contains(&mut self, node: &Node, depth: usize) -> bool {
        if depth > MAX_SEARCH_DEPTH {
            return false;
        }
        match node {
            Node::Scalar(_) => match node.as_str() {
                Some(raw) if Reference::is_reference(raw) && self.seen.insert(raw.to_string()) => {
                    match self.ctx.resolve(raw).value {
                        Some(value) => self.contains(&value, depth + 1),
                        None => false,
                    }
                }
                _ => false,
            },
            Node::Map(map) => {
                if !is_action_like(node)
                    && let Some(value) = map.get(self.key)
                    && self.tag_of(value).as_deref() == Some(self.tag)
                {
                    return true;
                }
                map.entries()
                    .iter()
                    .any(|entry| self.contains(&entry.value, depth + 1))
            }
            Node::Seq(seq) => seq.items.iter().any(|item| self.contains(item, depth + 1)),
            Node::Pair(pair) => self.contains(&pair.value, depth + 1),
            Node::Document(doc) => self.contains(&doc.contents, depth + 1),
        }
    }

    fn tag_of(&self, value: &Node) -> Option<String> {
        self.ctx
            .resolve_node(value)
            .value
            .and_then(|v| v.as_str().map(str::to_string))
    }
}
