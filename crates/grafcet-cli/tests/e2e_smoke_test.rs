use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tempfile::tempdir;

use grafcet_cli::{Args, Command};

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

/// Collects all .sfc files from a directory
fn collect_sfc_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("sfc")
            })
            .collect()
    } else {
        Vec::new()
    };

    // Sort for consistent test output
    files.sort();
    files
}

fn compile_args(input: &Path, output: &Path) -> Args {
    Args {
        command: Command::Compile {
            input: input.to_string_lossy().to_string(),
            output: output.to_string_lossy().to_string(),
            title: None,
        },
        config: None,
        log_level: "off".to_string(),
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("Failed to read output"))
        .expect("Output should be JSON")
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let demos = collect_sfc_files(demos_dir());
    assert!(!demos.is_empty(), "No demo charts found in demos/");

    let mut failed = Vec::new();

    for demo in &demos {
        let output = temp_dir
            .path()
            .join(format!("{}.json", demo.file_stem().unwrap().to_string_lossy()));

        match grafcet_cli::run(&compile_args(demo, &output)) {
            Ok(()) => {
                let json = read_json(&output);
                assert_eq!(json["version"], "1.0", "{}", demo.display());
                assert!(json["elements"].as_array().is_some_and(|e| !e.is_empty()));
            }
            Err(err) => failed.push((demo.clone(), err)),
        }
    }

    if !failed.is_empty() {
        eprintln!("\nDemo charts that failed:");
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} demo chart(s) failed unexpectedly", failed.len());
    }
}

#[test]
fn e2e_smoke_test_error_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let error_demos = collect_sfc_files(demos_dir().join("errors"));
    assert!(!error_demos.is_empty(), "No error charts found in demos/errors/");

    for demo in &error_demos {
        let output = temp_dir
            .path()
            .join(format!("{}.json", demo.file_stem().unwrap().to_string_lossy()));

        let result = grafcet_cli::run(&compile_args(demo, &output));
        assert!(result.is_err(), "{} should fail", demo.display());

        let json = read_json(&output);
        assert_eq!(json["success"], false, "{}", demo.display());
        assert!(
            json["details"].as_array().is_some_and(|d| !d.is_empty()),
            "{} should list diagnostics",
            demo.display()
        );
    }
}

#[test]
fn e2e_simulate_from_source_and_json() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let chart = demos_dir().join("conveyor.sfc");
    let scenarios = demos_dir().join("conveyor.scenarios.json");

    let compiled = temp_dir.path().join("conveyor.json");
    grafcet_cli::run(&compile_args(&chart, &compiled)).expect("Failed to compile");

    let mut traces = Vec::new();
    for (input, name) in [(&chart, "from_source.json"), (&compiled, "from_json.json")] {
        let output = temp_dir.path().join(name);
        let args = Args {
            command: Command::Simulate {
                input: input.to_string_lossy().to_string(),
                scenarios: scenarios.to_string_lossy().to_string(),
                output: Some(output.to_string_lossy().to_string()),
            },
            config: None,
            log_level: "off".to_string(),
        };
        grafcet_cli::run(&args).expect("Failed to simulate");
        traces.push(read_json(&output));
    }

    assert_eq!(traces[0], traces[1]);
    let active: Vec<&Value> = traces[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| &r["activeSteps"])
        .collect();
    assert_eq!(active[0], &serde_json::json!(["step-1"]));
    assert_eq!(active[2], &serde_json::json!(["step-0"]));
    assert_eq!(traces[0][0]["actions"], serde_json::json!(["Motor", "Lamp"]));
}

#[test]
fn e2e_simulate_or_choice() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let output = temp_dir.path().join("trace.json");
    let args = Args {
        command: Command::Simulate {
            input: demos_dir().join("tank.sfc").to_string_lossy().to_string(),
            scenarios: demos_dir()
                .join("tank.scenarios.json")
                .to_string_lossy()
                .to_string(),
            output: Some(output.to_string_lossy().to_string()),
        },
        config: None,
        log_level: "off".to_string(),
    };
    grafcet_cli::run(&args).expect("Failed to simulate");

    let trace = read_json(&output);
    assert_eq!(trace[0]["activeSteps"], serde_json::json!(["step-1"]));
    assert_eq!(trace[0]["actions"], serde_json::json!(["Drain"]));
    assert_eq!(trace[1]["activeSteps"], serde_json::json!(["step-0"]));
}
