//! Command-line argument definitions for the GRAFCET CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. The `compile` subcommand turns chart source into diagram
//! JSON, `simulate` replays a scenario file against a chart.

use clap::{Parser, Subcommand};

/// Command-line arguments for the GRAFCET chart tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a chart into diagram JSON
    Compile {
        /// Path to the input chart file
        input: String,

        /// Path to the output JSON file
        #[arg(short, long, default_value = "out.json")]
        output: String,

        /// Chart title, replacing the `SFC` header of the source
        #[arg(long)]
        title: Option<String>,
    },

    /// Run a scenario file against a chart
    Simulate {
        /// Compiled diagram (`.json`) or chart source
        input: String,

        /// Path to the scenario JSON file
        #[arg(short, long)]
        scenarios: String,

        /// Path to the trace JSON file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },
}
