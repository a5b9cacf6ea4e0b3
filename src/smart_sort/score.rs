use chrono::{DateTime, Utc};

use crate::db::models::Ticket;
use crate::smart_sort::NUDGE_FRESHNESS_WINDOW_MS;
use crate::smart_sort::signals::TicketSignals;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartScore {
    pub urgency_score: f64,
    pub time_score: f64,
}

/// Derive a ticket's urgency from its aggregated history.
///
/// Signals and their weights:
/// - follow-up pressure: `ln(1 + max(0, customer messages - 1))` — the first
///   customer message opens the ticket and is not a follow-up;
/// - `3` if no staff-side message exists yet;
/// - `2` if the ticket was ever nudged, plus `1.5·ln(1 + nudges)`;
/// - `4 · freshness`, where freshness decays linearly from 1 to 0 over the
///   24 h after the latest nudge;
/// - the sum is damped by `1 / (1 + 0.6·(open_tickets - 1))` so one customer
///   with many open tickets cannot monopolize the queue head.
///
/// Deterministic for fixed inputs and total: absent history contributes 0
/// rather than failing.
pub fn score_ticket(
    ticket: &Ticket,
    signals: &TicketSignals,
    peer_open_count: u32,
    now: DateTime<Utc>,
) -> SmartScore {
    let user_reply_count = signals.customer_message_count.saturating_sub(1) as f64;
    let never_handled = if signals.staff_ever_replied { 0.0 } else { 1.0 };

    let total_nudges = signals.nudge_count as f64;
    let ever_nudged = if signals.nudge_count > 0 { 1.0 } else { 0.0 };
    let nudge_freshness = match signals.last_nudge_at {
        Some(last) => {
            let age_ms = (now - last).num_milliseconds() as f64;
            (1.0 - age_ms / NUDGE_FRESHNESS_WINDOW_MS).max(0.0)
        }
        None => 0.0,
    };

    let raw_urgency = (1.0 + user_reply_count).ln()
        + 3.0 * never_handled
        + 2.0 * ever_nudged
        + 4.0 * nudge_freshness
        + 1.5 * (1.0 + total_nudges).ln();

    let open_count = peer_open_count.max(1) as f64;
    let user_penalty_factor = 1.0 / (1.0 + 0.6 * (open_count - 1.0));

    SmartScore {
        urgency_score: raw_urgency * user_penalty_factor,
        time_score: time_blend(ticket.created_at, ticket.updated_at),
    }
}

/// Recency-weighted blend used purely as a deterministic tie-break.
pub fn time_blend(created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> f64 {
    updated_at.timestamp_millis() as f64 * 0.7 + created_at.timestamp_millis() as f64 * 0.3
}
