//! Diagnostics
//!
//! Single diagnostic type used by the tokenizer, parser and registry. Every
//! diagnostic carries the position it refers to and the source path when one
//! is known.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::trace::Trace;

/// Broad category a diagnostic belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    Lexical,
    Syntax,
    Import,
    Semantic,
}

/// Diagnostic codes for categorizing issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // =========================================================================
    // Lexical errors
    // =========================================================================
    UnterminatedString,

    // =========================================================================
    // Parse errors
    // =========================================================================
    UnexpectedToken,
    InvalidLiteral,

    // =========================================================================
    // Import errors
    // =========================================================================
    NoImporter,
    ImportNotFound,
    ImportCycle,

    // =========================================================================
    // Validation errors
    // =========================================================================
    DuplicateDeclaration,
    NameConflict,
    UnresolvedType,
    InvalidFieldShape,
    DuplicateEnumValue,
}

impl DiagnosticCode {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            DiagnosticCode::UnterminatedString => DiagnosticKind::Lexical,
            DiagnosticCode::UnexpectedToken | DiagnosticCode::InvalidLiteral => {
                DiagnosticKind::Syntax
            }
            DiagnosticCode::NoImporter
            | DiagnosticCode::ImportNotFound
            | DiagnosticCode::ImportCycle => DiagnosticKind::Import,
            DiagnosticCode::DuplicateDeclaration
            | DiagnosticCode::NameConflict
            | DiagnosticCode::UnresolvedType
            | DiagnosticCode::InvalidFieldShape
            | DiagnosticCode::DuplicateEnumValue => DiagnosticKind::Semantic,
        }
    }
}

/// A located error message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub line: u32,
    pub offset: u32,
    pub path: Option<String>,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        message: impl Into<String>,
        line: u32,
        offset: u32,
        path: Option<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            line,
            offset,
            path,
        }
    }

    /// Create a diagnostic positioned at a trace
    pub fn at(code: DiagnosticCode, message: impl Into<String>, trace: &Trace) -> Self {
        Self::new(code, message, trace.line, trace.offset, trace.path.clone())
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.code.kind()
    }

    /// `"<message> on line <line>:<offset>"`
    pub fn render(&self) -> String {
        format!("{} on line {}:{}", self.message, self.line, self.offset)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: ", path)?;
        }
        write!(f, "{}", self.render())
    }
}

/// Render a list of diagnostics, one per line
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let diag = Diagnostic::new(
            DiagnosticCode::UnterminatedString,
            "string not terminated",
            4,
            12,
            None,
        );
        assert_eq!(diag.render(), "string not terminated on line 4:12");
        assert_eq!(diag.kind(), DiagnosticKind::Lexical);
    }

    #[test]
    fn test_display_prefixes_path() {
        let trace = Trace::new(2, 3, Some("models/user.mdl".to_string()));
        let diag = Diagnostic::at(
            DiagnosticCode::DuplicateDeclaration,
            "Duplicate model `User`",
            &trace,
        );
        assert_eq!(
            diag.to_string(),
            "models/user.mdl: Duplicate model `User` on line 2:3"
        );
    }

    #[test]
    fn test_format_diagnostics() {
        let errors = vec![
            Diagnostic::new(DiagnosticCode::UnexpectedToken, "first", 1, 1, None),
            Diagnostic::new(DiagnosticCode::UnresolvedType, "second", 9, 4, None),
        ];
        assert_eq!(
            format_diagnostics(&errors),
            "first on line 1:1\nsecond on line 9:4"
        );
        assert_eq!(format_diagnostics(&[]), "");
    }

    #[test]
    fn test_code_kinds() {
        assert_eq!(DiagnosticCode::ImportCycle.kind(), DiagnosticKind::Import);
        assert_eq!(DiagnosticCode::InvalidLiteral.kind(), DiagnosticKind::Syntax);
        assert_eq!(DiagnosticCode::NameConflict.kind(), DiagnosticKind::Semantic);
    }
}
