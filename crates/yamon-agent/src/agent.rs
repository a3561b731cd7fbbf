use crate::reporter::Reporter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use yamon_collector::Registry;

/// Poll/report loop of the agent.
///
/// One `select!` loop drives both timers, so a collect and a report never run
/// at the same time and each tick is fully handled before the next one.
pub struct Agent {
    registry: Arc<Registry>,
    reporter: Reporter,
    poll_interval: Duration,
    report_interval: Duration,
}

impl Agent {
    pub fn new(
        registry: Arc<Registry>,
        reporter: Reporter,
        poll_interval: Duration,
        report_interval: Duration,
    ) -> Self {
        Self {
            registry,
            reporter,
            poll_interval,
            report_interval,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs until `cancel` fires. An in-flight report is allowed to finish
    /// (bounded by the client timeout) before the loop notices cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut poll = time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = time::interval_at(Instant::now() + self.report_interval, self.report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll_secs = self.poll_interval.as_secs_f64(),
            report_secs = self.report_interval.as_secs_f64(),
            endpoint = %self.reporter.endpoint(),
            "Starting poll/report loop"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Shutting down gracefully");
                    break;
                }
                _ = poll.tick() => self.collect().await,
                _ = report.tick() => {
                    self.report_once().await;
                }
            }
        }
    }

    async fn collect(&self) {
        let registry = self.registry.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || registry.collect()).await {
            tracing::error!(error = %e, "Collection task panicked");
        }
    }

    /// Sends the current snapshot once. Failures are logged and dropped;
    /// returns the number of metrics delivered on success.
    pub async fn report_once(&self) -> Option<usize> {
        let snapshot = self.registry.snapshot();
        match self.reporter.report(&snapshot).await {
            Ok(count) => {
                tracing::debug!(count, "Metrics reported");
                Some(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to report metrics, dropping batch");
                None
            }
        }
    }
}
