use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::smart_sort::{RECOMPUTE_INTERVAL, SmartSort};

/// Periodic trigger for the recompute pass: once shortly after process start,
/// then on a fixed interval for the lifetime of the process.
///
/// The store is an optional collaborator — constructing the scheduler without
/// one is not an error, it simply never ticks. `start` is idempotent; only
/// the first call spawns the timer task.
pub struct SmartSortScheduler {
    smart: Option<Arc<SmartSort>>,
    enabled: bool,
    interval: Duration,
    started: AtomicBool,
}

impl SmartSortScheduler {
    pub fn new(smart: Option<Arc<SmartSort>>, enabled: bool) -> Self {
        Self {
            smart,
            enabled,
            interval: RECOMPUTE_INTERVAL,
            started: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[instrument(skip(self))]
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let Some(smart) = self.smart.clone() else {
            info!("ticket store unconfigured, smart sort scheduler idle");
            return None;
        };

        if !self.enabled {
            info!("smart sort scheduler disabled by configuration");
            return None;
        }

        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }

        let period = self.interval;
        info!(period_secs = period.as_secs(), "smart sort scheduler started");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                // Tick failures are logged and swallowed; the timer outlives
                // any store outage.
                match smart.recompute().await {
                    Ok(outcome) => debug!(
                        open_tickets = outcome.open_tickets,
                        upserted_rows = outcome.upserted_rows,
                        "scheduled recompute complete"
                    ),
                    Err(err) => error!(error = %err, "scheduled recompute failed"),
                }
            }
        }))
    }
}
