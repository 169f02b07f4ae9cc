//! domprobe CLI library
//!
//! Command-line front end for running and validating domprobe scenario
//! files.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, RunArgs, ValidateArgs};
pub use config::{load_harness_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_json, render_junit, render_text, OutputFormat, ProgressReporter};
pub use runner::{
    check_scenario, expand_inputs, filter_scenarios, load_scenarios, SuiteRunner, SuiteSummary,
};
