use super::{Rule, RuleContext};
use crate::builtins::{BuiltinContext, BuiltinEntry};
use crate::diagnostics::Report;
use crate::error::{NoodlError, Result};
use crate::reference::{Reference, target_segments};
use crate::traverse::Outcome;
use noodl_error_reporting::DiagnosticCode;
use noodl_yaml::{Node, NodeKind};

const BUILTIN_PREFIX: &str = "=.builtIn.";

/// Dispatches `=.builtIn.<path>` calls to the registry and writes results
/// back to `dataOut`.
///
/// Children of a call are not visited: `dataOut` is a write target, not a
/// value to resolve.
pub struct BuiltinRule;

impl BuiltinRule {
    fn function_path(node: &Node) -> Option<&str> {
        let map = node.as_map()?;
        if map.len() != 1 {
            return None;
        }
        let key = &map.entries()[0].key;
        key.strip_prefix(BUILTIN_PREFIX).filter(|path| !path.is_empty())
    }
}

impl Rule for BuiltinRule {
    fn name(&self) -> &str {
        "builtin-call"
    }

    fn matches(&self, kind: NodeKind, node: &Node) -> bool {
        kind == NodeKind::Map && Self::function_path(node).is_some()
    }

    fn handle(&self, ctx: &mut RuleContext<'_>) -> Result<Option<Outcome>> {
        let node = ctx.node;
        let Some(path) = Self::function_path(node) else {
            return Ok(None);
        };

        let function = match ctx.builtins.lookup(path) {
            None => {
                ctx.add(Report::coded(DiagnosticCode::BuiltinMissing, &[path]))?;
                return Ok(Some(Outcome::SkipChildren));
            }
            Some(BuiltinEntry::Function(function)) => function,
            Some(_) => {
                ctx.add(Report::coded(DiagnosticCode::BuiltinNotCallable, &[path]))?;
                return Ok(Some(Outcome::SkipChildren));
            }
        };

        let args = node.as_map().map(|m| &m.entries()[0].value);
        let data_in = args.and_then(|a| a.get("dataIn")).cloned().unwrap_or_else(Node::null);
        let input = if function.normalizes_input() {
            ctx.resolve_deep(&data_in)
        } else {
            data_in
        };

        tracing::debug!(function = path, page = ctx.page, "Calling built-in");
        let builtin_ctx = BuiltinContext {
            page: ctx.page,
            markers: ctx.markers,
            store: &*ctx.store,
        };
        let result = function
            .call(&input, &builtin_ctx)
            .map_err(|source| NoodlError::Builtin {
                path: path.to_string(),
                source,
            })?;

        let chained = result
            .as_str()
            .filter(|raw| Reference::is_reference(raw))
            .map(|raw| ctx.resolve(raw).value);
        let result = match chained {
            Some(Some(value)) => value,
            _ => result,
        };

        if let Some(target) = args.and_then(|a| a.get("dataOut")).and_then(Node::as_str) {
            let segments = target_segments(target, ctx.page);
            tracing::trace!(function = path, target, "Writing built-in result");
            ctx.store.set_path(&segments, result)?;
        }
        Ok(Some(Outcome::SkipChildren))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_path() {
        let call = Node::from(json!({"=.builtIn.math.add": {"dataIn": [1, 2]}}));
        assert_eq!(BuiltinRule::function_path(&call), Some("math.add"));

        let two_keys = Node::from(json!({"=.builtIn.math.add": {}, "other": 1}));
        assert_eq!(BuiltinRule::function_path(&two_keys), None);

        let bare = Node::from(json!({"=.builtIn.": {}}));
        assert_eq!(BuiltinRule::function_path(&bare), None);
    }
}
