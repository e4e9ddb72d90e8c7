//! # Run Loop
//!
//! `RUN_INTERVAL_SECS=0` runs one pass and exits, for use under a CronJob.
//! Any other value keeps the process alive, running a pass per interval and
//! serving metrics and probes. A pass that cannot list namespaces is retried
//! with Fibonacci backoff instead of waiting a full interval.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::{Reconciler, RunSummary};
use crate::controller::server::{start_server, ServerState};
use crate::runtime::InitializationResult;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the job until done (one-shot) or until a shutdown signal (loop mode)
///
/// # Errors
///
/// In one-shot mode, returns an error if the pass could not list namespaces.
pub async fn run(init: InitializationResult) -> Result<()> {
    if init.controller_config.is_loop_mode() {
        run_loop(&init.reconciler, &init.controller_config).await
    } else {
        run_once(&init.reconciler).await.map(|_| ())
    }
}

/// Run a single pass and log its summary
///
/// # Errors
///
/// Returns an error if the pass could not list namespaces.
pub async fn run_once(reconciler: &Reconciler) -> Result<RunSummary> {
    let summary = reconciler
        .run_pass(Utc::now())
        .await
        .context("Reconciliation pass failed")?;
    log_summary(&summary);
    Ok(summary)
}

async fn run_loop(reconciler: &Reconciler, config: &ControllerConfig) -> Result<()> {
    let state = Arc::new(ServerState::default());
    if config.enable_metrics {
        let server_state = Arc::clone(&state);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, server_state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    info!(
        interval_secs = config.run_interval_secs,
        "Running in loop mode"
    );
    let mut backoff = FibonacciBackoff::new(config.backoff_min_secs, config.backoff_max_secs);

    loop {
        let delay = match reconciler.run_pass(Utc::now()).await {
            Ok(summary) => {
                log_summary(&summary);
                state.record_pass(summary).await;
                backoff.reset();
                config.run_interval_duration()
            }
            Err(e) => {
                let delay = backoff.next_backoff();
                warn!(
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "Pass failed, retrying with backoff"
                );
                delay
            }
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, stopping after the last completed pass");
                state.is_ready.store(false, Ordering::Relaxed);
                return Ok(());
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => info!(event_type = "run_summary", summary = %json, "Run summary"),
        Err(e) => warn!(error = %e, "Failed to serialize run summary"),
    }
}
