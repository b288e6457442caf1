//! Error types for chart processing.
//!
//! [`CompileError`] carries every diagnostic of a failed compilation.
//! [`GrafcetError`] wraps all error conditions of the builder API.

use std::{fmt, io};

use thiserror::Error;

use grafcet_parser::error::{Diagnostic, ParseError};

use crate::{scenario::ScenarioError, storage::StorageError};

/// A failed compilation.
///
/// Holds the full diagnostic list, errors first in discovery order followed
/// by the warnings gathered before compilation stopped.
#[derive(Debug, Clone)]
pub struct CompileError {
    diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Diagnostics with error severity.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity().is_error())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors().count();
        match self.errors().next() {
            Some(first) if count > 1 => write!(f, "{first} (+{} more)", count - 1),
            Some(first) => write!(f, "{first}"),
            None => write!(f, "compilation failed"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        Self::new(err.into_diagnostics())
    }
}

/// The main error type of the builder API.
#[derive(Debug, Error)]
pub enum GrafcetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A chart that does not parse or compile, with its source text.
    #[error("{err}")]
    Compile { err: CompileError, src: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
}

impl GrafcetError {
    /// Create a new `Compile` error with the associated source code.
    pub fn new_compile_error(err: impl Into<CompileError>, src: impl Into<String>) -> Self {
        Self::Compile {
            err: err.into(),
            src: src.into(),
        }
    }
}
