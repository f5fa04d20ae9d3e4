//! Diagnostic codes and messages for NOODL validation.
//!
//! Semantic problems found while validating documents are reported as
//! structured messages rather than errors:
//!
//! - [`DiagnosticCode`]: the closed, stable table of integer codes
//! - [`catalog`]: code metadata and the `(code, args) -> message` templates,
//!   embedded at compile time from `error_catalog.json`
//! - [`DiagnosticMessage`]: one coded (or free-form) message with its level
//!   and the arguments it was rendered from
//!
//! Messages keep their arguments next to the rendered text so callers can
//! localize or reformat them.
//!
//! # Example
//!
//! ```
//! use noodl_error_reporting::{DiagnosticCode, DiagnosticMessage};
//!
//! let msg = DiagnosticMessage::coded(DiagnosticCode::GotoPageMissingFromPages, ["UnknownPage"])
//!     .unwrap();
//! assert_eq!(msg.code, Some(DiagnosticCode::GotoPageMissingFromPages));
//! assert!(msg.to_text().contains("UnknownPage"));
//! ```

pub mod catalog;
mod code;
pub mod diagnostic;

pub use catalog::{CatalogError, ERROR_CATALOG, ErrorCodeInfo, get_error_info, render_message};
pub use code::DiagnosticCode;
pub use diagnostic::{DiagnosticLevel, DiagnosticMessage};
