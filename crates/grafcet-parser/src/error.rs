//! Error and diagnostic system for the chart parser.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Multiple labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//!
//! # Overview
//!
//! The error system is built around the [`Diagnostic`] type, which represents
//! a single error or warning message with optional error code, multiple source
//! locations, and help text. Multiple diagnostics are wrapped in [`ParseError`]
//! for returning from the parsing lifecycle.
//!
//! The same diagnostics are reused by the structural validator of the
//! `grafcet` crate, which adds an element id and an `E2xx` code.
//!
//! # Example
//!
//! ```
//! # use grafcet_parser::error::{Diagnostic, ErrorCode};
//! # use grafcet_parser::Span;
//!
//! let span = Span::new(40..46);
//! let first = Span::new(0..6);
//!
//! let diag = Diagnostic::error("step number 1 is declared more than once")
//!     .with_code(ErrorCode::E103)
//!     .with_label(span, "duplicate step")
//!     .with_secondary_label(first, "first declared here")
//!     .with_help("give each step a unique number");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub use collector::DiagnosticCollector;
pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
