//! Poll loop
//!
//! Runs one aggregation cycle per period. Ticks never overlap: a tick that
//! fires while the previous cycle is still in flight is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::credentials::CredentialResolver;
use crate::metrics::metrics;
use crate::protocol::QueryError;

use super::matrix::{CycleReport, MatrixBuilder};
use super::reaper;
use super::registry::NodeRegistry;

/// Terminal conditions of a cycle; each one flips the credentials
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Peer states batch failed: {0}")]
    Transport(#[from] QueryError),
    #[error("No peer states request was successful ({failures} failed)")]
    NoSuccess { failures: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing registered yet
    Idle,
    /// Previous cycle still running
    Skipped,
    Unchanged { report: CycleReport, evicted: usize },
    Changed { report: CycleReport, evicted: usize },
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Skipped => "skipped",
            Self::Unchanged { .. } => "unchanged",
            Self::Changed { .. } => "changed",
        }
    }
}

/// Clears the busy flag even when a cycle is cancelled mid-flight
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StatePoller {
    registry: Arc<NodeRegistry>,
    builder: MatrixBuilder,
    credentials: Arc<CredentialResolver>,
    interval: Duration,
    busy: AtomicBool,
}

impl StatePoller {
    pub fn new(
        registry: Arc<NodeRegistry>,
        builder: MatrixBuilder,
        credentials: Arc<CredentialResolver>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            builder,
            credentials,
            interval,
            busy: AtomicBool::new(false),
        }
    }

    /// Build a new matrix and apply it
    ///
    /// On error the registry is left exactly as it was.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let built = match self.builder.build(&self.registry).await? {
            Some(built) => built,
            None => return Ok(CycleOutcome::Idle),
        };
        let report = built.report;
        if report.successes == 0 {
            return Err(CycleError::NoSuccess {
                failures: report.failures,
            });
        }

        // Full comparison: ordering and hostname changes alter the rendered table
        let changed = *self.registry.snapshot() != built.view;
        if changed {
            info!(counts = ?built.view.status_counts(), "Status modified");
            info!("\n{}", built.view.summary());
            self.registry.replace(built.view);
        }

        let stale = reaper::stale_nodes(&self.registry.snapshot());
        for address in &stale {
            warn!(addr = %address, "Removing unreferenced node");
        }
        self.registry.evict(&stale);
        metrics().record_evictions(stale.len());
        metrics().set_known_nodes(self.registry.snapshot().columns().len());

        let evicted = stale.len();
        Ok(if changed {
            CycleOutcome::Changed { report, evicted }
        } else {
            CycleOutcome::Unchanged { report, evicted }
        })
    }

    /// One tick of the loop
    ///
    /// A failed cycle flips the credentials exactly once.
    pub async fn tick(&self) -> Result<CycleOutcome, CycleError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("Previous poll cycle still running, skipping tick");
            metrics().record_poll_cycle(CycleOutcome::Skipped.label(), 0.0);
            return Ok(CycleOutcome::Skipped);
        }
        let _guard = BusyGuard(&self.busy);

        let started = Instant::now();
        let result = self.run_cycle().await;
        let elapsed = started.elapsed().as_secs_f64();

        let label = match &result {
            Ok(CycleOutcome::Idle) => {
                warn!("0 discovered nodes...");
                "idle"
            }
            Ok(outcome) => {
                debug!(outcome = ?outcome, "Poll cycle finished");
                outcome.label()
            }
            Err(e) => {
                let active = self.credentials.toggle();
                error!(error = %e, credentials = %active, "Failed to update node states, retrying with other credentials");
                match e {
                    CycleError::Transport(_) => "transport_error",
                    CycleError::NoSuccess { .. } => "no_success",
                }
            }
        };
        metrics().record_poll_cycle(label, elapsed);
        result
    }

    /// Spawn the periodic loop
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        info!(interval_ms = self.interval.as_millis() as u64, "Poll loop started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; wait one full period like a timer
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Poll loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = self.tick().await;
                    }
                }
            }
        })
    }
}
