use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, instrument};

use crate::db::models::SmartScoreRow;
use crate::db::repositories::TicketStore;
use crate::smart_sort::score::score_ticket;
use crate::smart_sort::signals::aggregate_signals;
use crate::smart_sort::{
    DEFAULT_PASS_TIMEOUT, SmartSortError, SmartSortResult, UPSERT_CHUNK_SIZE,
};

/// Summary of one full recompute pass. Every persisted row of the pass
/// carries the same `computed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecomputeOutcome {
    pub computed_at: DateTime<Utc>,
    pub open_tickets: usize,
    pub upserted_rows: usize,
}

type PassResult = SmartSortResult<RecomputeOutcome>;

/// Owns the urgency-score lifecycle: recompute passes (single-flight),
/// cached-score lookups, and queue ranking. Constructed once at process start
/// and shared behind an [`Arc`].
pub struct SmartSort {
    pub(crate) store: Arc<dyn TicketStore>,
    in_flight: Arc<Mutex<Option<broadcast::Sender<PassResult>>>>,
    pass_timeout: Duration,
    pub(crate) score_ttl: Option<Duration>,
}

impl SmartSort {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(None)),
            pass_timeout: DEFAULT_PASS_TIMEOUT,
            score_ttl: None,
        }
    }

    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Optional staleness cutoff for cached scores at read time. `None`
    /// reproduces the store's historical behavior: rows are suppressed only
    /// by the closed-status filter, never by age.
    pub fn with_score_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.score_ttl = ttl;
        self
    }

    pub fn store(&self) -> &dyn TicketStore {
        self.store.as_ref()
    }

    /// Run one full scoring pass, or join the pass already in flight.
    ///
    /// At most one pass executes process-wide. A caller arriving while one is
    /// running subscribes to its completion and receives the same outcome
    /// (or error) as the caller that started it. The pass itself runs in a
    /// spawned task, so the guard is released unconditionally when work
    /// finishes — on failure, on timeout, and when the caller that started
    /// the pass is dropped before it completes.
    #[instrument(skip(self))]
    pub async fn recompute(&self) -> PassResult {
        let mut rx = {
            let mut slot = self.in_flight.lock().await;
            if let Some(tx) = slot.as_ref() {
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                *slot = Some(tx.clone());

                let store = self.store.clone();
                let in_flight = self.in_flight.clone();
                let pass_timeout = self.pass_timeout;
                tokio::spawn(async move {
                    let result =
                        match tokio::time::timeout(pass_timeout, run_pass(store.as_ref())).await {
                            Ok(result) => result,
                            Err(_) => Err(SmartSortError::PassTimeout(pass_timeout)),
                        };

                    // Clear the guard before publishing: subscribers still
                    // receive this result, and any later caller finds the
                    // slot empty and starts a fresh pass.
                    *in_flight.lock().await = None;
                    let _ = tx.send(result);
                });

                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => Err(SmartSortError::PassInterrupted),
        }
    }
}

async fn run_pass(store: &dyn TicketStore) -> PassResult {
    let computed_at = Utc::now();

    let open = store
        .fetch_open_tickets()
        .await
        .map_err(|e| SmartSortError::TicketRead(e.to_string()))?;

    if open.is_empty() {
        info!("no open tickets, nothing to score");
        return Ok(RecomputeOutcome {
            computed_at,
            open_tickets: 0,
            upserted_rows: 0,
        });
    }

    let signals = aggregate_signals(store, &open).await?;
    let now = Utc::now();

    let rows: Vec<SmartScoreRow> = open
        .iter()
        .map(|ticket| {
            let score = score_ticket(
                ticket,
                &signals.signals_for(&ticket.id),
                signals.open_count_for(ticket.creator_uid),
                now,
            );
            SmartScoreRow {
                ticket_id: ticket.id.clone(),
                urgency_score: score.urgency_score,
                time_score: score.time_score,
                computed_at,
            }
        })
        .collect();

    let mut upserted_rows = 0;
    for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
        store
            .upsert_scores(chunk)
            .await
            .map_err(|e| SmartSortError::ScoreWrite(e.to_string()))?;
        upserted_rows += chunk.len();
    }

    info!(
        open_tickets = open.len(),
        upserted_rows, "smart sort recompute pass complete"
    );

    Ok(RecomputeOutcome {
        computed_at,
        open_tickets: open.len(),
        upserted_rows,
    })
}
