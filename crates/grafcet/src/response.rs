//! JSON envelopes returned to callers of the compiler.
//!
//! A successful compilation is reported as
//! `{ "success": true, "generatedSFC": <diagram>, "warnings": [...] }`, a
//! failed one as `{ "success": false, "error": "...", "details": [...] }`.
//! Every diagnostic becomes a flat [`DiagnosticReport`] with a 1-based line
//! and column resolved against the source text.

use serde::Serialize;

use grafcet_core::diagram::GrafcetDiagram;
use grafcet_parser::error::Diagnostic;

use crate::{error::GrafcetError, jumps::CompiledDiagram};

/// A diagnostic flattened for JSON consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    #[serde(rename = "type")]
    pub diagnostic_type: String,
    pub code: Option<String>,
    pub severity: String,
    pub message: String,
    pub element: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl DiagnosticReport {
    pub fn new(diagnostic: &Diagnostic, source: &str) -> Self {
        let position = diagnostic.line_col(source);
        Self {
            diagnostic_type: diagnostic.diagnostic_type().to_string(),
            code: diagnostic.code().map(|code| code.as_str().to_string()),
            severity: diagnostic.severity().as_str().to_string(),
            message: diagnostic.message().to_string(),
            element: diagnostic.element().map(str::to_string),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, column)| column),
        }
    }
}

/// The outcome of one compile request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileResponse {
    pub success: bool,
    #[serde(rename = "generatedSFC", skip_serializing_if = "Option::is_none")]
    pub generated_sfc: Option<GrafcetDiagram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<DiagnosticReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<DiagnosticReport>>,
}

impl CompileResponse {
    pub fn success(compiled: CompiledDiagram, source: &str) -> Self {
        let warnings = reports(&compiled.warnings, source);
        Self {
            success: true,
            generated_sfc: Some(compiled.diagram),
            warnings: Some(warnings),
            error: None,
            details: None,
        }
    }

    pub fn failure(error: impl Into<String>, details: Vec<DiagnosticReport>) -> Self {
        Self {
            success: false,
            generated_sfc: None,
            warnings: None,
            error: Some(error.into()),
            details: Some(details),
        }
    }

    /// Build the response for the result of compiling `source`.
    pub fn from_result(result: Result<CompiledDiagram, GrafcetError>, source: &str) -> Self {
        match result {
            Ok(compiled) => Self::success(compiled, source),
            Err(GrafcetError::Compile { err, src }) => {
                let details = reports(err.diagnostics(), &src);
                Self::failure(err.to_string(), details)
            }
            Err(other) => Self::failure(other.to_string(), Vec::new()),
        }
    }
}

fn reports(diagnostics: &[Diagnostic], source: &str) -> Vec<DiagnosticReport> {
    diagnostics
        .iter()
        .map(|diagnostic| DiagnosticReport::new(diagnostic, source))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::GrafcetBuilder;

    use super::*;

    #[test]
    fn test_success_shape() {
        let source = "Step 0 (Initial)\nTransition a\nStep 1\nTransition b\nJump 0\n";
        let response = GrafcetBuilder::default().compile_response(source);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["generatedSFC"]["version"], "1.0");
        assert_eq!(json["generatedSFC"]["elements"][0]["type"], "step");
        assert_eq!(json["warnings"], json!([]));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_lists_every_diagnostic() {
        let source = "Step 0\nStep 1\nTransition a\nTransition b\n";
        let response = GrafcetBuilder::default().compile_response(source);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert!(json.get("generatedSFC").is_none());
        let details = json["details"].as_array().unwrap();
        let types: Vec<&str> = details.iter().map(|d| d["type"].as_str().unwrap()).collect();
        assert_eq!(types, ["sequence", "sequence", "initial-step"]);
        assert_eq!(details[0]["line"], 2);
        assert_eq!(details[0]["column"], 1);
        assert_eq!(details[0]["severity"], "error");
        assert_eq!(details[0]["code"], "E203");
    }

    #[test]
    fn test_syntax_failure() {
        let source = "Step 0 (Initial)\nAction Pump (Q)\n";
        let response = GrafcetBuilder::default().compile_response(source);
        assert!(!response.success);
        let details = response.details.unwrap();
        assert_eq!(details[0].diagnostic_type, "syntax");
        assert_eq!(details[0].line, Some(2));
    }
}
