//! Command-line interface parsing for spotcast
//!
//! This module handles parsing of CLI arguments using clap: the global
//! `--config`/`--verbose` flags and the `spots` and `run` subcommands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// `--every` must be a positive, finite number of hours
    #[error("Invalid interval: '{0}'. Expected a positive number of hours")]
    InvalidInterval(f64),
}

/// Spotcast - tide classification and wind forecast sync for surf spots
#[derive(Parser, Debug)]
#[command(name = "spotcast")]
#[command(about = "Tide classification and wind forecast sync for surf spots")]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured spots
    Spots,
    /// Fetch, classify and store forecasts
    Run(RunArgs),
}

/// Arguments of `spotcast run`
///
/// Examples:
///   spotcast run --spot wissant            # One spot, once
///   spotcast run --all                     # Every spot, once
///   spotcast run --all --every 6           # Every spot, every 6 hours
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single spot by id
    #[arg(long, value_name = "ID", conflicts_with = "all", required_unless_present = "all")]
    pub spot: Option<String>,

    /// Run every configured spot in order
    #[arg(long)]
    pub all: bool,

    /// Repeat the run every HOURS hours until interrupted
    #[arg(long, value_name = "HOURS")]
    pub every: Option<f64>,
}

/// Which spots a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    Spot(String),
    All,
}

/// Validated settings of `spotcast run`
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub target: RunTarget,
    /// Repeat interval, or `None` for a single pass
    pub every: Option<Duration>,
}

impl RunPlan {
    /// Creates a RunPlan from parsed `run` arguments.
    ///
    /// # Returns
    /// * `Ok(RunPlan)` with the target and optional interval
    /// * `Err(CliError)` if the interval is not a positive number
    pub fn from_args(args: &RunArgs) -> Result<Self, CliError> {
        let target = match &args.spot {
            Some(id) => RunTarget::Spot(id.clone()),
            None => RunTarget::All,
        };

        let every = args.every.map(parse_interval_hours).transpose()?;
        Ok(RunPlan { target, every })
    }
}

/// Converts an hour count to a duration
pub fn parse_interval_hours(hours: f64) -> Result<Duration, CliError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(CliError::InvalidInterval(hours));
    }
    Duration::try_from_secs_f64(hours * 3600.0).map_err(|_| CliError::InvalidInterval(hours))
}

/// Default log filter for the verbosity flag
pub fn log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}
