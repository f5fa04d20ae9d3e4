//! Diagnostic message types.

use crate::catalog::CatalogError;
use crate::DiagnosticCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// The document is broken
    Error,
    /// Likely a problem, but rendering can continue
    Warn,
    /// Informational note
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warn => "warn",
            DiagnosticLevel::Info => "info",
        })
    }
}

/// One message inside a diagnostic.
///
/// A message is either coded (rendered from the catalog, with the arguments
/// kept alongside) or free-form text supplied by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<DiagnosticCode>,

    pub level: DiagnosticLevel,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Arguments the message was rendered from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl DiagnosticMessage {
    /// Create a free-form message.
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            message: Some(message.into()),
            args: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, message)
    }

    /// Create a coded message at the code's default level.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCode`] if the catalog has no entry.
    pub fn coded<I, S>(code: DiagnosticCode, args: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let level = code.default_level()?;
        Self::coded_at(level, code, args)
    }

    /// Create a coded message at an explicit level.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCode`] if the catalog has no entry.
    pub fn coded_at<I, S>(
        level: DiagnosticLevel,
        code: DiagnosticCode,
        args: I,
    ) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let message = code.message(&args)?;
        Ok(Self {
            code: Some(code),
            level,
            message: Some(message),
            args,
        })
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    /// Render as one line of text, e.g. `error[1100]: The goto destination is empty`.
    pub fn to_text(&self) -> String {
        let text = self.message.as_deref().unwrap_or("");
        match self.code {
            Some(code) => format!("{}[{}]: {}", self.level, code, text),
            None => format!("{}: {}", self.level, text),
        }
    }

    /// Render as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
