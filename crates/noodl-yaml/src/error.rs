//! Error types for YAML parsing with source locations.

use crate::SourceInfo;
use thiserror::Error;

/// Result type alias for noodl-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building node trees from YAML text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// YAML syntax error
    #[error("Parse error: {message}")]
    ParseError {
        message: String,
        location: Option<SourceInfo>,
    },

    /// The stream contained no document
    #[error("Unexpected end of input")]
    UnexpectedEof { location: Option<SourceInfo> },

    /// Event stream did not describe a well-formed tree
    #[error("Invalid YAML structure: {message}")]
    InvalidStructure {
        message: String,
        location: Option<SourceInfo>,
    },
}

impl Error {
    /// Source location of the failure, when the scanner reported one.
    pub fn location(&self) -> Option<&SourceInfo> {
        match self {
            Error::ParseError { location, .. }
            | Error::UnexpectedEof { location }
            | Error::InvalidStructure { location, .. } => location.as_ref(),
        }
    }
}

impl From<yaml_rust2::ScanError> for Error {
    fn from(err: yaml_rust2::ScanError) -> Self {
        Error::ParseError {
            location: Some(SourceInfo::from_marker(err.marker(), 0)),
            message: err.info().to_string(),
        }
    }
}
