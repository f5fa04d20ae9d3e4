use super::{Rule, RuleContext};
use crate::diagnostics::Report;
use crate::error::Result;
use crate::reference::{Reference, ReferenceKind};
use crate::resolver::{Expansion, ResolutionStatus};
use crate::traverse::Outcome;
use noodl_error_reporting::{DiagnosticCode, DiagnosticMessage};
use noodl_yaml::{Node, NodeKind};

/// Resolves reference strings and replaces them with their values.
///
/// Evaluate references (`=.`, `=..`) are only checked. Write-back (`@`)
/// references and built-in names are left alone. A value that is a map or
/// sequence is expanded in the document it came from and is not walked
/// again, so its own references never resolve against the visiting page.
pub struct ReferenceRule;

impl Rule for ReferenceRule {
    fn name(&self) -> &str {
        "reference"
    }

    fn matches(&self, kind: NodeKind, node: &Node) -> bool {
        kind == NodeKind::Scalar && node.as_str().is_some_and(Reference::is_reference)
    }

    fn handle(&self, ctx: &mut RuleContext<'_>) -> Result<Option<Outcome>> {
        let Some(reference) = ctx.node.as_str().and_then(Reference::parse) else {
            return Ok(None);
        };
        if reference.is_await() || reference.is_builtin_call() {
            return Ok(None);
        }

        if reference.kind().is_root() {
            let segments = reference.segments();
            if let Some(second) = segments.get(1)
                && second.chars().next().is_some_and(char::is_uppercase)
            {
                ctx.add(Report::coded(
                    DiagnosticCode::RootReferenceUppercaseSecondLevel,
                    &[reference.raw(), second.as_str()],
                ))?;
            }
        }

        let resolution = ctx.resolve(reference.raw());
        match resolution.status {
            ResolutionStatus::Resolved => {
                let Some(value) = resolution.value else {
                    return Ok(None);
                };
                if reference.kind().is_eval() {
                    return Ok(None);
                }
                let value = if value.is_collection() {
                    match ctx.expand(reference.raw(), &value, &resolution.scope) {
                        Expansion::Expanded(value) => value,
                        Expansion::Cycle { chain } => {
                            report_cycle(ctx, reference.raw(), &chain)?;
                            return Ok(None);
                        }
                    }
                } else {
                    value
                };
                let value = match (value.source_info(), ctx.node.source_info()) {
                    (None, Some(info)) => value.with_source_info(info.clone()),
                    _ => value,
                };
                Ok(Some(Outcome::Substitute(value)))
            }
            ResolutionStatus::Unresolved => {
                if let ReferenceKind::Traversal { depth } = reference.kind()
                    && depth > ctx.path.len()
                {
                    ctx.add(Report::coded(
                        DiagnosticCode::TraversalReferenceUnsupported,
                        &[reference.raw()],
                    ))?;
                    return Ok(None);
                }
                let message =
                    DiagnosticMessage::coded(DiagnosticCode::ReferenceUnresolved, [reference.raw()])?;
                let trace = resolution.trace;
                ctx.add(Report::mutate(move |diagnostic| {
                    diagnostic.push(message);
                    diagnostic.trace = trace;
                }))?;
                Ok(None)
            }
            ResolutionStatus::Cycle { chain } => {
                report_cycle(ctx, reference.raw(), &chain)?;
                Ok(None)
            }
        }
    }
}

fn report_cycle(ctx: &mut RuleContext<'_>, raw: &str, chain: &[String]) -> Result<()> {
    ctx.add(Report::coded(
        DiagnosticCode::ReferenceCycle,
        &[raw.to_string(), chain.join(" -> ")],
    ))
}
