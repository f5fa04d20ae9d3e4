//! Error code catalog and lookup.
//!
//! This module maps integer diagnostic codes to their metadata (name, title,
//! message template, default level).

use crate::DiagnosticLevel;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Metadata for a diagnostic code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Stable identifier matching the `DiagnosticCode` variant
    pub name: String,

    /// Subsystem name (e.g., "reference", "navigation", "tags")
    pub subsystem: String,

    /// Short title for the diagnostic
    pub title: String,

    /// Message template with positional `{0}`, `{1}`, ... placeholders
    pub message_template: String,

    /// Level used when a rule does not pick one
    pub level: DiagnosticLevel,
}

/// Failures looking up the catalog. These are programmer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Unknown diagnostic code: {0}")]
    UnknownCode(u16),
}

/// Global diagnostic catalog, loaded lazily from JSON embedded at compile time.
///
/// # Panics
///
/// Panics if the embedded JSON is invalid. This should only happen during
/// development if someone edits the catalog incorrectly.
pub static ERROR_CATALOG: Lazy<HashMap<u16, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("Invalid error catalog JSON - this is a bug")
});

/// Look up code information.
///
/// Returns `None` if the code is not in the catalog.
///
/// ```
/// use noodl_error_reporting::catalog::get_error_info;
///
/// let info = get_error_info(1100).unwrap();
/// assert_eq!(info.subsystem, "navigation");
/// ```
pub fn get_error_info(code: u16) -> Option<&'static ErrorCodeInfo> {
    ERROR_CATALOG.get(&code)
}

/// Render the message for `code` from its template.
///
/// Placeholders without a matching argument render as empty text.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownCode`] when `code` is not registered.
///
/// ```
/// use noodl_error_reporting::render_message;
///
/// let text = render_message(1300, &["utils.prepareDoc"]).unwrap();
/// assert_eq!(text, "The built-in function \"utils.prepareDoc\" is not registered");
/// assert!(render_message(4242, &[] as &[&str]).is_err());
/// ```
pub fn render_message<S: AsRef<str>>(code: u16, args: &[S]) -> Result<String, CatalogError> {
    let info = get_error_info(code).ok_or(CatalogError::UnknownCode(code))?;
    Ok(fill_template(&info.message_template, args))
}

fn fill_template<S: AsRef<str>>(template: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if after[..close].chars().all(|c| c.is_ascii_digit()) && close > 0 => {
                if let Some(arg) = after[..close]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| args.get(i))
                {
                    out.push_str(arg.as_ref());
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
