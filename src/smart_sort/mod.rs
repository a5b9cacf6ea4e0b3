//! Ticket urgency scoring and ranking ("smart sort").
//!
//! A periodic pass aggregates nudge and reply history for every open ticket,
//! reduces it to a single urgency score through [`score::score_ticket`], and
//! persists the result in `ticket_smart_scores`. The admin queue later joins
//! those cached scores onto its listing via [`SmartSort::rank`].

use std::time::Duration;

use thiserror::Error;

pub mod rank;
pub mod recompute;
pub mod scheduler;
pub mod score;
pub mod signals;

#[cfg(test)]
pub(crate) mod memory;

pub use rank::{SortDirection, TicketSort};
pub use recompute::{RecomputeOutcome, SmartSort};
pub use scheduler::SmartSortScheduler;

/// Cadence of the background recompute pass.
pub const RECOMPUTE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A nudge's freshness contribution decays linearly to zero over this window.
pub const NUDGE_FRESHNESS_WINDOW_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Upper bound on ids per `IN`-style store lookup.
pub const IN_CHUNK_SIZE: usize = 80;

/// Upper bound on rows per score upsert.
pub const UPSERT_CHUNK_SIZE: usize = 200;

/// A pathologically slow store must not pin the single-flight guard forever.
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(120);

pub type SmartSortResult<T> = core::result::Result<T, SmartSortError>;

/// Store failures are wrapped with the operation that hit them; payloads are
/// plain strings so joined single-flight callers can clone the outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SmartSortError {
    #[error("failed to read tickets: {0}")]
    TicketRead(String),

    #[error("failed to read nudge history: {0}")]
    NudgeRead(String),

    #[error("failed to read message history: {0}")]
    MessageRead(String),

    #[error("failed to read cached smart scores: {0}")]
    ScoreRead(String),

    #[error("failed to persist smart scores: {0}")]
    ScoreWrite(String),

    #[error("recompute pass exceeded {0:?} and was abandoned")]
    PassTimeout(Duration),

    #[error("in-flight recompute pass ended without publishing a result")]
    PassInterrupted,
}
