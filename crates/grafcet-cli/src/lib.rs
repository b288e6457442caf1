//! GRAFCET CLI library
//!
//! This module contains the core CLI logic: compiling chart source into
//! diagram JSON and replaying scenario files against a chart.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::{fs, path::Path};

use log::{info, warn};

use grafcet::{
    GrafcetBuilder, GrafcetError,
    diagram::GrafcetDiagram,
    response::{CompileResponse, DiagnosticReport},
    scenario::ScenarioFile,
    storage::{FsStore, load_diagram},
};

use error_adapter::{DiagnosticAdapter, Reportable, render};

/// Run the GRAFCET CLI application
///
/// # Errors
///
/// Returns `GrafcetError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Syntax and structural errors in the chart
/// - Unreadable diagram or scenario files
pub fn run(args: &Args) -> Result<(), GrafcetError> {
    let app_config = config::load_config(args.config.as_ref())?;

    match &args.command {
        Command::Compile {
            input,
            output,
            title,
        } => {
            let builder = GrafcetBuilder::new(app_config).with_title(title.clone());
            compile(&builder, input, output)
        }
        Command::Simulate {
            input,
            scenarios,
            output,
        } => {
            let builder = GrafcetBuilder::new(app_config);
            simulate(&builder, input, scenarios, output.as_deref())
        }
    }
}

fn compile(builder: &GrafcetBuilder, input: &str, output: &str) -> Result<(), GrafcetError> {
    info!(input_path = input, output_path = output; "Compiling chart");

    let source = fs::read_to_string(input)?;
    let compiled = match builder.compile(&source) {
        Ok(compiled) => compiled,
        Err(err) => {
            write_failure(&err, output)?;
            return Err(err);
        }
    };

    for diagnostic in compiled.warnings() {
        let reportable = Reportable::Diagnostic(DiagnosticAdapter::new(diagnostic, &source));
        warn!("{}", render(&reportable));
    }

    fs::write(output, serde_json::to_string_pretty(compiled.diagram())?)?;
    info!(output_file = output; "Diagram exported successfully");
    Ok(())
}

/// Write the failure envelope with every diagnostic to `output`.
fn write_failure(err: &GrafcetError, output: &str) -> Result<(), GrafcetError> {
    let details = match err {
        GrafcetError::Compile { err, src } => err
            .diagnostics()
            .iter()
            .map(|diagnostic| DiagnosticReport::new(diagnostic, src))
            .collect(),
        _ => Vec::new(),
    };
    let response = CompileResponse::failure(err.to_string(), details);
    fs::write(output, serde_json::to_string_pretty(&response)?)?;
    Ok(())
}

fn simulate(
    builder: &GrafcetBuilder,
    input: &str,
    scenarios: &str,
    output: Option<&str>,
) -> Result<(), GrafcetError> {
    info!(input_path = input, scenarios_path = scenarios; "Simulating chart");

    let diagram = load_chart(builder, Path::new(input))?;
    let scenario_file: ScenarioFile = serde_json::from_str(&fs::read_to_string(scenarios)?)?;
    let trace = builder.simulate(&diagram, &scenario_file.into_scenarios())?;

    let json = serde_json::to_string_pretty(&trace)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            info!(output_file = path; "Trace exported successfully");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Load a stored `.json` diagram, or compile any other file as chart source.
fn load_chart(builder: &GrafcetBuilder, path: &Path) -> Result<GrafcetDiagram, GrafcetError> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if !is_json {
        let source = fs::read_to_string(path)?;
        return Ok(builder.compile(&source)?.into_diagram());
    }

    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(Path::new)
        .ok_or_else(|| std::io::Error::other(format!("not a file: {}", path.display())))?;
    let store = FsStore::new(root);
    Ok(load_diagram(&store, file_name)?)
}
