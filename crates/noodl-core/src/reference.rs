//! Reference string grammar.
//!
//! A reference is a scalar string that points at another value:
//!
//! | prefix | kind | example |
//! |---|---|---|
//! | `.` | root | `.Global.currentUser.name` |
//! | `..` | local | `..formData.password` |
//! | `=.` | evaluate root | `=.SignIn.formData.email` |
//! | `=..` | evaluate local | `=..formData.email` |
//! | `~/` | tilde | `~/images/logo.png` |
//! | `_`×N then `.` | traversal | `__.listItem.name` |
//!
//! A trailing `@` marks a write-back ("await") binding.

use std::fmt;

/// How a reference is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// `.Doc.path`: first segment names the target document
    Root,
    /// `..path`: relative to the document being visited
    Local,
    /// `=.Doc.path`
    EvalRoot,
    /// `=..path`
    EvalLocal,
    /// `~/rest`: prefixed with the base URL, never walked
    Tilde,
    /// `_`×depth followed by `.`: looked up through an ancestor
    Traversal { depth: usize },
}

impl ReferenceKind {
    /// Whether the first path segment names a document.
    pub fn is_root(self) -> bool {
        matches!(self, ReferenceKind::Root | ReferenceKind::EvalRoot)
    }

    pub fn is_local(self) -> bool {
        matches!(self, ReferenceKind::Local | ReferenceKind::EvalLocal)
    }

    pub fn is_eval(self) -> bool {
        matches!(self, ReferenceKind::EvalRoot | ReferenceKind::EvalLocal)
    }
}

/// A parsed reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    raw: String,
    kind: ReferenceKind,
    path: String,
    is_await: bool,
}

impl Reference {
    /// Parse a reference string. Returns `None` for plain values.
    ///
    /// ```rust
    /// use noodl_core::{Reference, ReferenceKind};
    ///
    /// let r = Reference::parse("..formData.email@").unwrap();
    /// assert_eq!(r.kind(), ReferenceKind::Local);
    /// assert_eq!(r.path(), "formData.email");
    /// assert!(r.is_await());
    ///
    /// assert!(Reference::parse("Sign In").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Reference> {
        let (body, is_await) = match raw.strip_suffix('@') {
            Some(body) if !body.is_empty() => (body, true),
            _ => (raw, false),
        };

        let (kind, path) = if let Some(rest) = body.strip_prefix("=..") {
            (ReferenceKind::EvalLocal, rest)
        } else if let Some(rest) = body.strip_prefix("=.") {
            (ReferenceKind::EvalRoot, rest)
        } else if let Some(rest) = body.strip_prefix("~/") {
            // Tilde paths are opaque: anything after the prefix is kept
            return Some(Reference {
                raw: raw.to_string(),
                kind: ReferenceKind::Tilde,
                path: rest.to_string(),
                is_await,
            });
        } else if let Some(rest) = body.strip_prefix("..") {
            (ReferenceKind::Local, rest)
        } else if let Some(rest) = body.strip_prefix('.') {
            (ReferenceKind::Root, rest)
        } else {
            let depth = body.chars().take_while(|c| *c == '_').count();
            let rest = body[depth..].strip_prefix('.')?;
            if depth == 0 {
                return None;
            }
            (ReferenceKind::Traversal { depth }, rest)
        };

        if !starts_like_identifier(path) {
            return None;
        }

        Some(Reference {
            raw: raw.to_string(),
            kind,
            path: path.to_string(),
            is_await,
        })
    }

    /// Whether `value` is a reference string.
    pub fn is_reference(value: &str) -> bool {
        Reference::parse(value).is_some()
    }

    /// The original text, including prefix and suffix.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Text after the prefix, without the `@` suffix.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_await(&self) -> bool {
        self.is_await
    }

    /// Path split into segments (`a.b[2]` gives `a`, `b`, `2`).
    pub fn segments(&self) -> Vec<String> {
        split_path(&self.path)
    }

    /// Whether this names a built-in function (`=.builtIn.<path>`).
    pub fn is_builtin_call(&self) -> bool {
        self.kind == ReferenceKind::EvalRoot && self.path.starts_with("builtIn.")
    }

    /// Segments addressing this reference's target from the root of the store.
    ///
    /// Local references are anchored at `scope` unless their first segment
    /// already names it. Tilde and traversal references have no store path.
    pub fn store_segments(&self, scope: &str) -> Option<Vec<String>> {
        let segments = self.segments();
        match self.kind {
            ReferenceKind::Root | ReferenceKind::EvalRoot => Some(segments),
            ReferenceKind::Local | ReferenceKind::EvalLocal => {
                Some(anchor_at_scope(segments, scope))
            }
            ReferenceKind::Tilde | ReferenceKind::Traversal { .. } => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn starts_like_identifier(path: &str) -> bool {
    path.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
}

fn anchor_at_scope(mut segments: Vec<String>, scope: &str) -> Vec<String> {
    if segments.first().map(String::as_str) != Some(scope) {
        segments.insert(0, scope.to_string());
    }
    segments
}

/// Split a dotted path, with optional bracket indices, into segments.
///
/// Empty segments are kept so that a trailing separator stays visible.
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        let head_end = rest.find('[').unwrap_or(rest.len());
        segments.push(rest[..head_end].to_string());
        rest = &rest[head_end..];
        while let Some(open) = rest.strip_prefix('[') {
            let Some(close) = open.find(']') else {
                // Unbalanced bracket: keep the remainder verbatim
                if let Some(last) = segments.last_mut() {
                    last.push_str(rest);
                }
                break;
            };
            segments.push(open[..close].to_string());
            rest = &open[close + 1..];
        }
    }
    segments
}

/// Store path for a write-back target such as a built-in's `dataOut`.
///
/// Reference syntax follows [`Reference::store_segments`]; a bare dotted
/// path (`Doc.key`) is taken as rooted.
pub fn target_segments(target: &str, scope: &str) -> Vec<String> {
    match Reference::parse(target).and_then(|r| r.store_segments(scope)) {
        Some(segments) => segments,
        None => split_path(target),
    }
}
