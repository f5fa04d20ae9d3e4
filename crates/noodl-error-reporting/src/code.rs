//! The closed set of diagnostic codes.

use crate::catalog::{self, CatalogError, ErrorCodeInfo};
use crate::DiagnosticLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable diagnostic codes.
///
/// The integer values are part of the external interface and never change
/// meaning. Every variant has an entry in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum DiagnosticCode {
    ReferenceUnresolved = 1000,
    ReferenceCycle = 1001,
    RootReferenceUppercaseSecondLevel = 1002,
    TraversalReferenceUnsupported = 1003,

    GotoEmptyDestination = 1100,
    GotoPageMissingFromPages = 1101,
    GotoPageMissingFromStore = 1102,
    GotoPageComponentUrlInvalid = 1103,
    GotoReferenceUnresolved = 1104,

    ViewTagInvalid = 1200,
    ViewTagMissingComponent = 1201,
    PopUpViewInvalid = 1202,
    PopUpViewMissingComponent = 1203,

    BuiltinMissing = 1300,
    BuiltinNotCallable = 1301,
}

impl DiagnosticCode {
    pub const ALL: [DiagnosticCode; 15] = [
        DiagnosticCode::ReferenceUnresolved,
        DiagnosticCode::ReferenceCycle,
        DiagnosticCode::RootReferenceUppercaseSecondLevel,
        DiagnosticCode::TraversalReferenceUnsupported,
        DiagnosticCode::GotoEmptyDestination,
        DiagnosticCode::GotoPageMissingFromPages,
        DiagnosticCode::GotoPageMissingFromStore,
        DiagnosticCode::GotoPageComponentUrlInvalid,
        DiagnosticCode::GotoReferenceUnresolved,
        DiagnosticCode::ViewTagInvalid,
        DiagnosticCode::ViewTagMissingComponent,
        DiagnosticCode::PopUpViewInvalid,
        DiagnosticCode::PopUpViewMissingComponent,
        DiagnosticCode::BuiltinMissing,
        DiagnosticCode::BuiltinNotCallable,
    ];

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Catalog entry for this code.
    ///
    /// # Errors
    ///
    /// Fails only if the embedded catalog lost an entry for a variant.
    pub fn info(self) -> Result<&'static ErrorCodeInfo, CatalogError> {
        catalog::get_error_info(self.as_u16()).ok_or(CatalogError::UnknownCode(self.as_u16()))
    }

    /// Level used when a rule reports this code without choosing one.
    pub fn default_level(self) -> Result<DiagnosticLevel, CatalogError> {
        self.info().map(|info| info.level)
    }

    /// Render the message for this code.
    pub fn message<S: AsRef<str>>(self, args: &[S]) -> Result<String, CatalogError> {
        catalog::render_message(self.as_u16(), args)
    }
}

impl From<DiagnosticCode> for u16 {
    fn from(code: DiagnosticCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for DiagnosticCode {
    type Error = CatalogError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        DiagnosticCode::ALL
            .into_iter()
            .find(|code| code.as_u16() == value)
            .ok_or(CatalogError::UnknownCode(value))
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_is_catalogued() {
        for code in DiagnosticCode::ALL {
            let info = code.info().unwrap();
            assert_eq!(info.name, format!("{:?}", code));
        }
        assert_eq!(catalog::ERROR_CATALOG.len(), DiagnosticCode::ALL.len());
    }

    #[test]
    fn test_try_from_u16() {
        assert_eq!(
            DiagnosticCode::try_from(1201),
            Ok(DiagnosticCode::ViewTagMissingComponent)
        );
        assert_eq!(
            DiagnosticCode::try_from(7),
            Err(CatalogError::UnknownCode(7))
        );
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&DiagnosticCode::BuiltinMissing).unwrap();
        assert_eq!(json, "1300");
        let back: DiagnosticCode = serde_json::from_str("1300").unwrap();
        assert_eq!(back, DiagnosticCode::BuiltinMissing);
    }

    #[test]
    fn test_default_levels() {
        assert_eq!(
            DiagnosticCode::RootReferenceUppercaseSecondLevel.default_level(),
            Ok(DiagnosticLevel::Warn)
        );
        assert_eq!(
            DiagnosticCode::GotoEmptyDestination.default_level(),
            Ok(DiagnosticLevel::Error)
        );
    }
}
