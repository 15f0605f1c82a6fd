//! Spotcast - tide classification and wind forecast sync for surf spots
//!
//! Loads the spot list, then for each requested spot fetches wind forecasts,
//! classifies tides and reconciles the result with the forecast store, either
//! once or on a fixed interval.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spotcast::cli::{self, Cli, Command, RunPlan, RunTarget};
use spotcast::config::{ApiKeys, Config, ConfigError};
use spotcast::schedule::{self, ScheduleConfig};
use spotcast::workflow::{run_spots, ForecastRun};

/// Installs the stderr log subscriber; RUST_LOG wins over the verbosity flag
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli::log_level(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Prints the configured spots as a table
fn print_spots(config: &Config) {
    if config.spots.is_empty() {
        println!("No spots configured.");
        return;
    }

    println!(
        "{:<20} {:<24} {:>10} {:>10}  {:<5}  FACING",
        "ID", "NAME", "LAT", "LON", "TIDES"
    );
    for spot in &config.spots {
        let facing = spot
            .direction
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<24} {:>10.4} {:>10.4}  {:<5}  {}",
            spot.id,
            spot.name,
            spot.latitude,
            spot.longitude,
            if spot.has_tides { "yes" } else { "no" },
            facing
        );
    }
}

/// Indices into the spot list covered by the run
fn target_indices(config: &Config, target: &RunTarget) -> Result<Vec<usize>, ConfigError> {
    match target {
        RunTarget::All => Ok((0..config.spots.len()).collect()),
        RunTarget::Spot(id) => config.spot_index(id).map(|index| vec![index]),
    }
}

async fn run(config: &Config, plan: RunPlan) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let indices = target_indices(config, &plan.target)?;
    let keys = ApiKeys::from_env()?;
    let store = config.store_client(&keys)?;
    let tides = config.tides_client(&keys);
    let weather = config.weather_client();
    let runner = ForecastRun::new(&store, &weather, &tides);

    let Some(interval) = plan.every else {
        let failures = run_spots(&runner, &config.spots, &indices).await;
        info!(spots = indices.len(), failures, "run finished");
        return Ok(if failures == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    };

    info!(interval_secs = interval.as_secs(), "running on a schedule, Ctrl-C to stop");
    let runner = &runner;
    let spots = config.spots.as_slice();
    let indices = indices.as_slice();
    let summary = schedule::run_periodically(
        ScheduleConfig { interval },
        schedule::shutdown_on_ctrl_c(),
        move || async move { run_spots(runner, spots, indices).await == 0 },
    )
    .await;

    info!(
        cycles = summary.cycles,
        failed_cycles = summary.failed_cycles,
        "scheduler stopped"
    );
    Ok(if summary.failed_cycles == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn dispatch(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Spots => {
            print_spots(&config);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => {
            let plan = RunPlan::from_args(&args)?;
            run(&config, plan).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
