//! Periodic re-runs
//!
//! Runs a job on a fixed interval until a shutdown signal arrives on a tokio
//! channel. The first run starts immediately.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Configuration for periodic runs
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time between the starts of two runs
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(6 * 3600), // 6 hours
        }
    }
}

/// Outcome of a scheduling session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
}

/// Runs `job` every `config.interval` until `shutdown` receives a message or
/// every sender is dropped.
///
/// The job returns whether the cycle succeeded. A shutdown request never
/// interrupts a running cycle; it is honoured before the next one starts.
pub async fn run_periodically<F, Fut>(
    config: ScheduleConfig,
    mut shutdown: mpsc::Receiver<()>,
    mut job: F,
) -> ScheduleSummary
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut interval = tokio::time::interval(config.interval);
    // Late ticks shift the schedule instead of firing back to back
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut summary = ScheduleSummary::default();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!(cycles = summary.cycles, "shutdown requested");
                break;
            }
            _ = interval.tick() => {
                summary.cycles += 1;
                info!(cycle = summary.cycles, "starting scheduled run");
                if !job().await {
                    summary.failed_cycles += 1;
                    warn!(cycle = summary.cycles, "scheduled run had failures");
                }
            }
        }
    }

    summary
}

/// Sends on the returned channel when Ctrl-C is pressed
pub fn shutdown_on_ctrl_c() -> mpsc::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });
    shutdown_rx
}
