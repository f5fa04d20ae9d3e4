use super::{Rule, RuleContext};
use crate::diagnostics::Report;
use crate::error::Result;
use crate::reference::Reference;
use crate::traverse::Outcome;
use noodl_error_reporting::DiagnosticCode;
use noodl_yaml::{Node, NodeKind, Scalar};
use once_cell::sync::Lazy;
use regex::Regex;

/// One token of a page component url: a page name or a view tag.
static URL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$-]*$").expect("page component url token pattern")
});

/// Checks navigation targets of `goto` actions.
///
/// Destinations are a page name, a reference, or a page component url
/// `TargetPage@CurrentPage#viewTag`. The value may also be a map with a
/// `destination` key.
pub struct GotoRule;

impl Rule for GotoRule {
    fn name(&self) -> &str {
        "goto"
    }

    fn matches(&self, kind: NodeKind, node: &Node) -> bool {
        kind == NodeKind::Map && node.has_key("goto")
    }

    fn handle(&self, ctx: &mut RuleContext<'_>) -> Result<Option<Outcome>> {
        let destination = ctx
            .node
            .get("goto")
            .map(destination_of)
            .unwrap_or_default();

        if destination.trim().is_empty() {
            ctx.add(Report::coded(
                DiagnosticCode::GotoEmptyDestination,
                &[] as &[&str],
            ))?;
            return Ok(None);
        }

        if Reference::is_reference(&destination) {
            if !ctx.resolve(&destination).is_resolved() {
                ctx.add(Report::coded(
                    DiagnosticCode::GotoReferenceUnresolved,
                    &[&destination],
                ))?;
            }
            return Ok(None);
        }

        if let Some(url) = PageComponentUrl::parse(&destination) {
            if let Some(token) = url.malformed_token() {
                ctx.add(Report::coded(
                    DiagnosticCode::GotoPageComponentUrlInvalid,
                    &[destination.as_str(), token],
                ))?;
                return Ok(None);
            }
            if !ctx.store.contains(url.target) {
                ctx.add(Report::coded(
                    DiagnosticCode::GotoPageMissingFromStore,
                    &[url.target],
                ))?;
            }
            if !ctx.markers.is_page(url.target) {
                ctx.add(Report::coded(
                    DiagnosticCode::GotoPageMissingFromPages,
                    &[url.target],
                ))?;
            }
            return Ok(None);
        }

        if !ctx.markers.is_page(&destination) {
            ctx.add(Report::coded(
                DiagnosticCode::GotoPageMissingFromPages,
                &[&destination],
            ))?;
        }
        Ok(None)
    }
}

/// Text of a `goto` value, whether written inline or as `{destination}`.
fn destination_of(value: &Node) -> String {
    let value = match value {
        Node::Map(_) => match value.get("destination") {
            Some(inner) => inner,
            None => return String::new(),
        },
        other => other,
    };
    match value.as_scalar() {
        Some(Scalar::Null) | None => String::new(),
        Some(scalar) => scalar.to_string(),
    }
}

/// `target@current#tag`
struct PageComponentUrl<'a> {
    target: &'a str,
    current: &'a str,
    tag: &'a str,
}

impl<'a> PageComponentUrl<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let (target, rest) = text.split_once('@')?;
        let (current, tag) = rest.split_once('#')?;
        Some(Self {
            target,
            current,
            tag,
        })
    }

    /// Name of the first token that is not well-formed.
    fn malformed_token(&self) -> Option<&'static str> {
        [
            ("target page", self.target),
            ("current page", self.current),
            ("view tag", self.tag),
        ]
        .into_iter()
        .find(|(_, token)| !URL_TOKEN.is_match(token))
        .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_forms() {
        assert_eq!(destination_of(&Node::from("Home")), "Home");
        assert_eq!(
            destination_of(&Node::from(serde_json::json!({"destination": "Home"}))),
            "Home"
        );
        assert_eq!(destination_of(&Node::null()), "");
        assert_eq!(destination_of(&Node::from(serde_json::json!({"other": 1}))), "");
    }

    #[test]
    fn test_page_component_url_tokens() {
        let url = PageComponentUrl::parse("Profile@Dashboard#avatar").unwrap();
        assert_eq!((url.target, url.current, url.tag), ("Profile", "Dashboard", "avatar"));
        assert_eq!(url.malformed_token(), None);

        let url = PageComponentUrl::parse("Profile@Dash board#avatar").unwrap();
        assert_eq!(url.malformed_token(), Some("current page"));

        let url = PageComponentUrl::parse("@Dashboard#").unwrap();
        assert_eq!(url.malformed_token(), Some("target page"));

        assert!(PageComponentUrl::parse("Profile").is_none());
        assert!(PageComponentUrl::parse("Profile@Dashboard").is_none());
    }
}
