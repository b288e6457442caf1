//! The core diagnostic type.
//!
//! A [`Diagnostic`] represents a single error or warning with optional
//! error code, labeled source spans, help text and the id of the chart
//! element it is about.

use std::fmt;

use crate::{
    error::{Severity, error_code::ErrorCode, label::Label},
    span::{Span, line_col},
};

/// A diagnostic message with source location information.
///
/// # Example
///
/// ```text
/// error[E200]: AND branch 2 must end with a step
///   --> line 9:9
///    |
///  9 |         Transition DONE
///    |         ^^^^^^^^^^^^^^^ branch ends with a transition
///    |
///    = help: add a step after the last transition of the branch
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    code: Option<ErrorCode>,
    message: String,
    labels: Vec<Label>,
    help: Option<String>,
    element: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    ///
    /// # Example
    ///
    /// ```
    /// # use grafcet_parser::error::{Diagnostic, ErrorCode};
    /// # use grafcet_parser::Span;
    ///
    /// let diag = Diagnostic::error("unknown action qualifier `X`")
    ///     .with_code(ErrorCode::E105)
    ///     .with_label(Span::new(20..21), "not a qualifier")
    ///     .with_help("use one of N, S, R, P, D, L, SD, DS, SL");
    /// assert_eq!(diag.to_string(), "error[E105]: unknown action qualifier `X`");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Id of the chart element the diagnostic refers to, if any.
    pub fn element(&self) -> Option<&str> {
        self.element.as_deref()
    }

    /// The type tag of this diagnostic, derived from its code.
    ///
    /// Diagnostics without a code are reported as `syntax`.
    pub fn diagnostic_type(&self) -> &'static str {
        self.code
            .map(|code| code.diagnostic_type())
            .unwrap_or("syntax")
    }

    /// The span of the first primary label.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find(|label| label.is_primary())
            .map(Label::span)
    }

    /// The 1-based `(line, column)` of the primary span in `source`.
    pub fn line_col(&self, source: &str) -> Option<(usize, usize)> {
        self.primary_span()
            .map(|span| line_col(source, span.start()))
    }

    /// Set the error code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add a primary label to this diagnostic.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Add a secondary label to this diagnostic.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Set the id of the element this diagnostic is about.
    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            help: None,
            element: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(code) = self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_defaults() {
        let diag = Diagnostic::error("test error");

        assert!(diag.severity().is_error());
        assert_eq!(diag.message(), "test error");
        assert!(diag.code().is_none());
        assert!(diag.labels().is_empty());
        assert!(diag.element().is_none());
        assert_eq!(diag.diagnostic_type(), "syntax");
    }

    #[test]
    fn test_diagnostic_builder_chain() {
        let diag = Diagnostic::error("AND branch 1 must end with a step")
            .with_code(ErrorCode::E200)
            .with_label(Span::new(30..45), "branch ends with a transition")
            .with_secondary_label(Span::new(0..14), "divergence opened here")
            .with_element("transition-3")
            .with_help("add a step after the last transition of the branch");

        assert_eq!(diag.code(), Some(ErrorCode::E200));
        assert_eq!(diag.diagnostic_type(), "and-divergence");
        assert_eq!(diag.labels().len(), 2);
        assert_eq!(diag.primary_span(), Some(Span::new(30..45)));
        assert_eq!(diag.element(), Some("transition-3"));
    }

    #[test]
    fn test_diagnostic_line_col() {
        let source = "Step 0 (Initial)\nJump 7\n";
        let diag = Diagnostic::error("jump to unknown step 7").with_label(Span::new(22..23), "here");
        assert_eq!(diag.line_col(source), Some((2, 6)));
        assert_eq!(Diagnostic::warning("no span").line_col(source), None);
    }

    #[test]
    fn test_diagnostic_display() {
        let with_code = Diagnostic::error("duplicate step number 3").with_code(ErrorCode::E103);
        assert_eq!(with_code.to_string(), "error[E103]: duplicate step number 3");

        let without = Diagnostic::warning("divergence has a single branch");
        assert_eq!(without.to_string(), "warning: divergence has a single branch");
    }
}
