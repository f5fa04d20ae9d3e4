//! Error types for noodl-core

use noodl_error_reporting::CatalogError;
use thiserror::Error;

/// Failures that abort a validation run.
///
/// Problems found *in the documents* are not errors; they are reported as
/// [`Diagnostic`](crate::Diagnostic)s. These are problems with the run
/// itself.
#[derive(Error, Debug)]
pub enum NoodlError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Built-in function `{path}` failed: {source}")]
    Builtin {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Document `{0}` is not in the root store")]
    MissingDocument(String),

    #[error("No node at `{path}` in document `{page}`")]
    InvalidPath { page: String, path: String },

    #[error("Cannot write to `{0}`")]
    InvalidWriteTarget(String),

    #[error("Root store is already borrowed: {0}")]
    StoreBusy(String),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),

    #[error("{0}")]
    Other(String),
}

impl NoodlError {
    /// Create an error from any message.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, NoodlError>;
