//! Error codes for the chart diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Lexer errors
//! - `E1xx` - Parser errors
//! - `E2xx` - Structural diagnostics raised by the validator, the jump
//!   resolver and chart analysis
//!
//! Lexer and parser codes are syntax errors. Each structural code maps to a
//! stable kebab-case type tag, see [`ErrorCode::diagnostic_type`].

use std::fmt;

/// Error codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Lexer Errors (E0xx)
    // =========================================================================
    /// Unterminated string literal.
    E001,

    /// Unexpected character.
    E002,

    /// Invalid escape sequence.
    ///
    /// Valid escapes are: `\n`, `\r`, `\t`, `\\`, `\"`, `\0`, `\u{...}`.
    E003,

    /// Invalid unicode escape format.
    ///
    /// Unicode escapes must use the format `\u{XXXX}` with 1-6 hexadecimal digits.
    E004,

    /// Invalid unicode codepoint.
    E005,

    /// Empty unicode escape `\u{}`.
    E006,

    // =========================================================================
    // Parser Errors (E1xx)
    // =========================================================================
    /// Unexpected token.
    E100,

    /// Incomplete statement.
    ///
    /// The line ended before the statement was complete, e.g. `Jump` without
    /// a step number.
    E101,

    /// Unknown statement.
    ///
    /// A line does not start with a statement keyword.
    E102,

    /// Duplicate step number.
    E103,

    /// Misplaced step attachment.
    ///
    /// `Action` and `LinkedFile` must directly follow a step or another
    /// attachment of the same step.
    E104,

    /// Unknown action qualifier.
    E105,

    /// Invalid nesting of `Divergence`, `Branch`, `EndBranch` and
    /// `EndDivergence`.
    E106,

    /// Unknown step kind.
    E107,

    /// Invalid guard expression.
    E108,

    /// Invalid number.
    E109,

    // =========================================================================
    // Structural Diagnostics (E2xx)
    // =========================================================================
    /// AND divergence rule violated.
    ///
    /// AND branches start and end with a step; the divergence is preceded and
    /// followed by a transition.
    E200,

    /// OR divergence rule violated.
    ///
    /// OR branches start and end with a transition; the divergence is
    /// preceded and followed by a step.
    E201,

    /// Unmatched divergence.
    E202,

    /// Invalid step/transition alternation.
    E203,

    /// Empty branch.
    E204,

    /// Jump to an unknown step.
    E205,

    /// Jump without a preceding element.
    E206,

    /// Missing initial step.
    E207,

    /// Divergence with a single branch.
    E208,

    /// Guard that does not parse.
    E209,

    /// Step unreachable from the initial steps.
    E210,

    /// Step without outgoing transition.
    E211,

    /// No path returns to an initial step.
    E212,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E005 => "E005",
            ErrorCode::E006 => "E006",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            ErrorCode::E104 => "E104",
            ErrorCode::E105 => "E105",
            ErrorCode::E106 => "E106",
            ErrorCode::E107 => "E107",
            ErrorCode::E108 => "E108",
            ErrorCode::E109 => "E109",
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
            ErrorCode::E207 => "E207",
            ErrorCode::E208 => "E208",
            ErrorCode::E209 => "E209",
            ErrorCode::E210 => "E210",
            ErrorCode::E211 => "E211",
            ErrorCode::E212 => "E212",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "unterminated string literal",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "invalid escape sequence",
            ErrorCode::E004 => "invalid unicode escape",
            ErrorCode::E005 => "invalid unicode codepoint",
            ErrorCode::E006 => "empty unicode escape",
            ErrorCode::E100 => "unexpected token",
            ErrorCode::E101 => "incomplete statement",
            ErrorCode::E102 => "unknown statement",
            ErrorCode::E103 => "duplicate step number",
            ErrorCode::E104 => "misplaced step attachment",
            ErrorCode::E105 => "unknown action qualifier",
            ErrorCode::E106 => "invalid nesting",
            ErrorCode::E107 => "unknown step kind",
            ErrorCode::E108 => "invalid guard expression",
            ErrorCode::E109 => "invalid number",
            ErrorCode::E200 => "invalid AND divergence",
            ErrorCode::E201 => "invalid OR divergence",
            ErrorCode::E202 => "unmatched divergence",
            ErrorCode::E203 => "invalid sequence",
            ErrorCode::E204 => "empty branch",
            ErrorCode::E205 => "dangling jump target",
            ErrorCode::E206 => "jump without source",
            ErrorCode::E207 => "missing initial step",
            ErrorCode::E208 => "single-branch divergence",
            ErrorCode::E209 => "unparsable guard",
            ErrorCode::E210 => "unreachable step",
            ErrorCode::E211 => "dead-end step",
            ErrorCode::E212 => "missing return path",
        }
    }

    /// Returns the diagnostic type tag reported to API consumers.
    ///
    /// Lexer and parser codes share the `syntax` tag.
    pub fn diagnostic_type(&self) -> &'static str {
        match self {
            ErrorCode::E200 => "and-divergence",
            ErrorCode::E201 => "or-divergence",
            ErrorCode::E202 => "unmatched-divergence",
            ErrorCode::E203 => "sequence",
            ErrorCode::E204 => "empty-branch",
            ErrorCode::E205 => "dangling-reference",
            ErrorCode::E206 => "jump-source",
            ErrorCode::E207 => "initial-step",
            ErrorCode::E208 => "single-branch",
            ErrorCode::E209 => "guard-syntax",
            ErrorCode::E210 => "unreachable-step",
            ErrorCode::E211 => "dead-end",
            ErrorCode::E212 => "missing-return",
            _ => "syntax",
        }
    }

    /// Returns `true` for lexer and parser codes.
    pub fn is_syntax(&self) -> bool {
        self.diagnostic_type() == "syntax"
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E001.to_string(), "E001");
        assert_eq!(ErrorCode::E106.to_string(), "E106");
        assert_eq!(ErrorCode::E205.to_string(), "E205");
    }

    #[test]
    fn test_error_code_description() {
        assert_eq!(ErrorCode::E001.description(), "unterminated string literal");
        assert_eq!(ErrorCode::E103.description(), "duplicate step number");
        assert_eq!(ErrorCode::E202.description(), "unmatched divergence");
    }

    #[test]
    fn test_diagnostic_types() {
        assert_eq!(ErrorCode::E002.diagnostic_type(), "syntax");
        assert_eq!(ErrorCode::E106.diagnostic_type(), "syntax");
        assert_eq!(ErrorCode::E200.diagnostic_type(), "and-divergence");
        assert_eq!(ErrorCode::E205.diagnostic_type(), "dangling-reference");
        assert_eq!(ErrorCode::E212.diagnostic_type(), "missing-return");
        assert!(ErrorCode::E100.is_syntax());
        assert!(!ErrorCode::E209.is_syntax());
    }
}
