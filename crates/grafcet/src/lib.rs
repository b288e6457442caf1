//! GRAFCET - compiler, layout engine and simulator for sequential function
//! charts.
//!
//! Chart source goes through four stages: parsing, structural validation
//! with layout, jump resolution with chart analysis, and finally simulation
//! against externally supplied inputs.

pub mod analysis;
pub mod compiler;
pub mod config;
pub mod jumps;
pub mod response;
pub mod scenario;
pub mod simulation;
pub mod storage;
pub mod validate;

mod error;
mod topology;

pub use grafcet_core::{diagram, element, geometry};
pub use grafcet_parser::error::{Diagnostic, ErrorCode, Severity};

pub use error::{CompileError, GrafcetError};

use log::{debug, info, trace};

use grafcet_core::diagram::GrafcetDiagram;
use grafcet_parser::ParserInput;

use compiler::Compiler;
use config::AppConfig;
use jumps::CompiledDiagram;
use response::CompileResponse;
use scenario::{Scenario, ScenarioResult, ScenarioRunner};

/// Builder for compiling and simulating GRAFCET charts.
///
/// # Examples
///
/// ```rust
/// use grafcet::{GrafcetBuilder, config::AppConfig, scenario::Scenario};
///
/// let source = r#"
/// Step 0 (Initial)
/// Transition "Start"
/// Step 1
///     Action "X"
/// Transition "Done"
/// Jump 0
/// "#;
///
/// let builder = GrafcetBuilder::new(AppConfig::default());
/// let compiled = builder.compile(source).expect("Failed to compile");
///
/// let trace = builder
///     .simulate(compiled.diagram(), &[Scenario::new("start").with_transition("Start", true)])
///     .expect("Failed to simulate");
/// assert_eq!(trace[0].active_steps, ["step-1"]);
/// assert_eq!(trace[0].actions, ["X"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GrafcetBuilder {
    config: AppConfig,
    title: Option<String>,
}

impl GrafcetBuilder {
    /// Create a new builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            title: None,
        }
    }

    /// Override the chart title declared in the source.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Parse source text into the pre-layout statement tree.
    ///
    /// # Errors
    ///
    /// Returns [`GrafcetError::Compile`] with every lexer or parser
    /// diagnostic.
    pub fn parse(&self, source: &str) -> Result<ParserInput, GrafcetError> {
        info!("Parsing chart");
        let input = grafcet_parser::parse(source)
            .map_err(|err| GrafcetError::new_compile_error(err, source))?;
        trace!(input:?; "Parsed chart");
        Ok(input)
    }

    /// Parse, validate, lay out and resolve the jumps of a chart.
    ///
    /// # Errors
    ///
    /// Returns [`GrafcetError::Compile`] carrying every diagnostic when the
    /// chart has syntax errors, fatal structural errors or jumps to unknown
    /// steps.
    pub fn compile(&self, source: &str) -> Result<CompiledDiagram, GrafcetError> {
        let input = self.parse(source)?;

        info!("Compiling chart");
        let chart = Compiler::new(self.config.layout().clone())
            .with_title(self.title.clone())
            .compile(input)
            .map_err(|err| GrafcetError::new_compile_error(err, source))?;
        debug!(pending_jumps = chart.pending_jumps().len(); "Chart laid out");

        let compiled = chart
            .resolve_jumps()
            .map_err(|err| GrafcetError::new_compile_error(err, source))?;
        info!(
            elements = compiled.diagram().elements().len(),
            warnings = compiled.warnings().len();
            "Chart compiled"
        );
        Ok(compiled)
    }

    /// Compile a chart into the JSON response envelope.
    ///
    /// Never fails: errors are reported inside the response.
    pub fn compile_response(&self, source: &str) -> CompileResponse {
        CompileResponse::from_result(self.compile(source), source)
    }

    /// Run scenarios in order against a compiled diagram.
    ///
    /// # Errors
    ///
    /// Returns [`GrafcetError::Scenario`] when the scenario list exceeds the
    /// configured bound.
    pub fn simulate(
        &self,
        diagram: &GrafcetDiagram,
        scenarios: &[Scenario],
    ) -> Result<Vec<ScenarioResult>, GrafcetError> {
        info!(scenarios = scenarios.len(); "Running scenarios");
        let results = ScenarioRunner::from_config(self.config.simulation()).run(diagram, scenarios)?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_reports_syntax_errors_with_source() {
        let err = GrafcetBuilder::default()
            .compile("Step 0 (Initial)\nStep 0\n")
            .unwrap_err();
        match err {
            GrafcetError::Compile { err, src } => {
                assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E103));
                assert!(src.starts_with("Step 0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_title_override() {
        let compiled = GrafcetBuilder::default()
            .with_title(Some("Press".to_string()))
            .compile("SFC \"Mixer\"\nStep 0 (Initial)\n")
            .unwrap();
        assert_eq!(compiled.diagram().title(), "Press");
    }

    #[test]
    fn test_public_types_cross_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GrafcetBuilder>();
        assert_send_sync::<CompiledDiagram>();
        assert_send_sync::<GrafcetDiagram>();
        assert_send_sync::<simulation::SimulationState>();
        assert_send_sync::<simulation::Simulator<'static>>();
        assert_send_sync::<GrafcetError>();
    }

    #[test]
    fn test_simulate_respects_bound() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "simulation": { "max_scenarios": 1 } }"#).unwrap();
        let builder = GrafcetBuilder::new(config);
        let compiled = builder.compile("Step 0 (Initial)\n").unwrap();
        let err = builder
            .simulate(compiled.diagram(), &[Scenario::new("a"), Scenario::new("b")])
            .unwrap_err();
        assert!(matches!(err, GrafcetError::Scenario(_)));
    }
}
