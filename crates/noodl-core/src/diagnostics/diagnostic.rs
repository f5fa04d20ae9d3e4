//! Diagnostic records produced during a run.

use crate::error::Result;
use crate::resolver::TraceEntry;
use noodl_error_reporting::{DiagnosticCode, DiagnosticLevel, DiagnosticMessage};
use noodl_yaml::{Node, NodeKind, NodePath, SourceInfo};
use serde::Serialize;
use serde_json::Value;

/// The node a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticNode {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<NodePath>,
    /// Snapshot of the node when the diagnostic was created
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_info: Option<SourceInfo>,
}

impl DiagnosticNode {
    pub fn new(node: &Node) -> Self {
        Self {
            kind: node.kind(),
            path: None,
            value: node.to_json(),
            source_info: node.source_info().cloned(),
        }
    }

    pub fn with_path(mut self, path: NodePath) -> Self {
        self.path = Some(path);
        self
    }
}

/// Everything reported about one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<DiagnosticNode>,
    pub messages: Vec<DiagnosticMessage>,
    /// Resolution trace, for reference failures
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEntry>,
}

impl Diagnostic {
    /// Empty diagnostic for `page` and `node`, capturing the node's source
    /// location when it has one.
    pub fn new(page: Option<&str>, node: Option<&Node>) -> Self {
        Self {
            page: page.map(str::to_string),
            node: node.map(DiagnosticNode::new),
            messages: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn push(&mut self, message: DiagnosticMessage) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn is_error(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_error)
    }

    /// Codes of all coded messages, in order.
    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.messages.iter().filter_map(|m| m.code).collect()
    }

    pub fn source_info(&self) -> Option<&SourceInfo> {
        self.node.as_ref().and_then(|n| n.source_info.as_ref())
    }

    /// One line per message, prefixed with the page and node location.
    pub fn to_text(&self) -> String {
        let mut location = self.page.clone().unwrap_or_default();
        if let Some(node) = &self.node {
            if let Some(path) = node.path.as_ref().filter(|p| !p.is_empty()) {
                location = format!("{}:{}", location, path);
            }
            if let Some(info) = &node.source_info {
                location = format!("{} ({}:{})", location, info.line, info.col);
            }
        }
        self.messages
            .iter()
            .map(|m| {
                if location.is_empty() {
                    m.to_text()
                } else {
                    format!("{}: {}", location, m.to_text())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What a rule hands to [`RuleContext::add`](crate::RuleContext::add).
pub enum Report {
    /// Fill in a fresh diagnostic for the current node.
    Mutate(Box<dyn FnOnce(&mut Diagnostic)>),
    /// A catalogued message; `level` overrides the code's default.
    Coded {
        level: Option<DiagnosticLevel>,
        code: DiagnosticCode,
        args: Vec<String>,
    },
    Message(DiagnosticMessage),
}

impl Report {
    /// Coded message at the code's default level.
    pub fn coded<S: ToString>(code: DiagnosticCode, args: &[S]) -> Self {
        Report::Coded {
            level: None,
            code,
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn error<S: ToString>(code: DiagnosticCode, args: &[S]) -> Self {
        Report::Coded {
            level: Some(DiagnosticLevel::Error),
            code,
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn warn<S: ToString>(code: DiagnosticCode, args: &[S]) -> Self {
        Report::Coded {
            level: Some(DiagnosticLevel::Warn),
            code,
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn mutate(f: impl FnOnce(&mut Diagnostic) + 'static) -> Self {
        Report::Mutate(Box::new(f))
    }

    /// Apply this report to `diagnostic`.
    ///
    /// Fails only for a code missing from the catalog.
    pub fn apply(self, diagnostic: &mut Diagnostic) -> Result<()> {
        match self {
            Report::Mutate(f) => f(diagnostic),
            Report::Coded { level, code, args } => {
                let level = match level {
                    Some(level) => level,
                    None => code.default_level()?,
                };
                diagnostic.push(DiagnosticMessage::coded_at(level, code, args)?);
            }
            Report::Message(message) => {
                diagnostic.push(message);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Report::Mutate(_) => f.write_str("Report::Mutate(..)"),
            Report::Coded { level, code, args } => f
                .debug_struct("Report::Coded")
                .field("level", level)
                .field("code", code)
                .field("args", args)
                .finish(),
            Report::Message(m) => f.debug_tuple("Report::Message").field(m).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodl_yaml::parse_file;

    #[test]
    fn test_new_captures_source_offsets() {
        let doc = parse_file("goto: ''", "SignIn.yml").unwrap();
        let diagnostic = Diagnostic::new(Some("SignIn"), doc.contents());
        let info = diagnostic.source_info().unwrap();
        assert_eq!(info.file.as_deref(), Some("SignIn.yml"));
        assert_eq!(info.line, 1);

        let bare = Diagnostic::new(None, None);
        assert!(bare.node.is_none() && bare.page.is_none());
    }

    #[test]
    fn test_reports_apply() {
        let mut diagnostic = Diagnostic::new(Some("SignIn"), None);
        Report::coded(DiagnosticCode::GotoEmptyDestination, &[] as &[&str])
            .apply(&mut diagnostic)
            .unwrap();
        Report::warn(DiagnosticCode::GotoPageMissingFromPages, &["Nowhere"])
            .apply(&mut diagnostic)
            .unwrap();
        Report::Message(DiagnosticMessage::info("checked"))
            .apply(&mut diagnostic)
            .unwrap();
        Report::mutate(|d| d.page = Some("Renamed".into()))
            .apply(&mut diagnostic)
            .unwrap();

        assert_eq!(
            diagnostic.codes(),
            vec![
                DiagnosticCode::GotoEmptyDestination,
                DiagnosticCode::GotoPageMissingFromPages
            ]
        );
        assert_eq!(diagnostic.messages[1].level, DiagnosticLevel::Warn);
        assert_eq!(diagnostic.messages[1].args, vec!["Nowhere"]);
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.page.as_deref(), Some("Renamed"));
    }

    #[test]
    fn test_text_rendering() {
        let doc = parse_file("goto: ''", "SignIn.yml").unwrap();
        let node = doc.contents().unwrap();
        let mut diagnostic = Diagnostic::new(Some("SignIn"), Some(node));
        Report::coded(DiagnosticCode::GotoEmptyDestination, &[] as &[&str])
            .apply(&mut diagnostic)
            .unwrap();
        insta::assert_snapshot!(
            diagnostic.to_text(),
            @"SignIn (1:1): error[1100]: The goto destination is empty"
        );
    }
}
