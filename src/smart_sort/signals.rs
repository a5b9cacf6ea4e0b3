use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::models::{MessageActor, Ticket, TicketId};
use crate::db::repositories::TicketStore;
use crate::smart_sort::{IN_CHUNK_SIZE, SmartSortError, SmartSortResult};

/// Raw per-ticket history reduced to the quantities scoring needs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TicketSignals {
    pub customer_message_count: u32,
    pub staff_ever_replied: bool,
    pub last_staff_reply_at: Option<DateTime<Utc>>,
    pub nudge_count: u32,
    pub last_nudge_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct SignalSet {
    per_ticket: HashMap<TicketId, TicketSignals>,
    open_by_creator: HashMap<i64, u32>,
}

impl SignalSet {
    pub fn signals_for(&self, id: &TicketId) -> TicketSignals {
        self.per_ticket.get(id).cloned().unwrap_or_default()
    }

    /// Open-ticket load of a creator within the aggregated set, clamped to 1
    /// so the scoring penalty is well defined for any candidate ticket.
    pub fn open_count_for(&self, creator_uid: i64) -> u32 {
        self.open_by_creator.get(&creator_uid).copied().unwrap_or(1).max(1)
    }
}

/// Reduce nudge and message history for `tickets` into [`SignalSet`].
///
/// Read-only; every store lookup is chunked at [`IN_CHUNK_SIZE`]. Any store
/// failure aborts the whole aggregation — a partial set is never returned.
#[instrument(skip(store, tickets), fields(tickets = tickets.len()))]
pub async fn aggregate_signals(
    store: &dyn TicketStore,
    tickets: &[Ticket],
) -> SmartSortResult<SignalSet> {
    let mut set = SignalSet::default();

    for ticket in tickets {
        if !ticket.status.is_closed() {
            *set.open_by_creator.entry(ticket.creator_uid).or_insert(0) += 1;
        }
    }

    let ids: Vec<TicketId> = tickets.iter().map(|t| t.id.clone()).collect();

    // System messages carry no triage signal and are filtered at the store.
    let actors = [
        MessageActor::Customer,
        MessageActor::Staff,
        MessageActor::Anonymous,
    ];

    for chunk in ids.chunks(IN_CHUNK_SIZE) {
        let (nudges, messages) = futures::try_join!(
            async {
                store
                    .fetch_nudges(chunk)
                    .await
                    .map_err(|e| SmartSortError::NudgeRead(e.to_string()))
            },
            async {
                store
                    .fetch_messages(chunk, &actors)
                    .await
                    .map_err(|e| SmartSortError::MessageRead(e.to_string()))
            },
        )?;

        for nudge in nudges {
            let entry = set.per_ticket.entry(nudge.ticket_id).or_default();
            entry.nudge_count += 1;
            if entry.last_nudge_at.is_none_or(|prev| nudge.created_at > prev) {
                entry.last_nudge_at = Some(nudge.created_at);
            }
        }

        for message in messages {
            let entry = set.per_ticket.entry(message.ticket_id).or_default();
            match message.actor {
                MessageActor::Customer => entry.customer_message_count += 1,
                actor if actor.is_staff_side() => {
                    entry.staff_ever_replied = true;
                    if entry
                        .last_staff_reply_at
                        .is_none_or(|prev| message.created_at > prev)
                    {
                        entry.last_staff_reply_at = Some(message.created_at);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::db::models::TicketStatus;
    use crate::smart_sort::memory::{MemoryStore, ticket};

    #[tokio::test]
    async fn reduces_history_into_per_ticket_signals() {
        let now = Utc::now();
        let store = MemoryStore::default();
        store.push_ticket(ticket("t1", 7, TicketStatus::Assigned, now));
        store.push_ticket(ticket("t2", 7, TicketStatus::PendingAssign, now));
        store.push_ticket(ticket("t3", 9, TicketStatus::Closed, now));

        store.push_message("t1", MessageActor::Customer, now - TimeDelta::hours(5));
        store.push_message("t1", MessageActor::Customer, now - TimeDelta::hours(2));
        store.push_message("t1", MessageActor::Anonymous, now - TimeDelta::hours(4));
        store.push_message("t1", MessageActor::Staff, now - TimeDelta::hours(1));
        store.push_message("t2", MessageActor::System, now);

        store.push_nudge("t1", now - TimeDelta::hours(10));
        store.push_nudge("t1", now - TimeDelta::hours(3));

        let tickets = store.all_tickets();
        let set = aggregate_signals(&store, &tickets).await.unwrap();

        let s1 = set.signals_for(&"t1".into());
        assert_eq!(s1.customer_message_count, 2);
        assert!(s1.staff_ever_replied);
        assert_eq!(s1.last_staff_reply_at, Some(now - TimeDelta::hours(1)));
        assert_eq!(s1.nudge_count, 2);
        assert_eq!(s1.last_nudge_at, Some(now - TimeDelta::hours(3)));

        // System messages never register as a staff touch.
        let s2 = set.signals_for(&"t2".into());
        assert_eq!(s2, TicketSignals::default());

        // Closed tickets do not contribute to creator load.
        assert_eq!(set.open_count_for(7), 2);
        assert_eq!(set.open_count_for(9), 1);
        assert_eq!(set.open_count_for(404), 1);
    }

    #[tokio::test]
    async fn lookups_are_chunked_at_the_store_limit() {
        let now = Utc::now();
        let store = MemoryStore::default();
        for i in 0..205 {
            store.push_ticket(ticket(&format!("t{i:03}"), i, TicketStatus::Assigned, now));
        }

        let tickets = store.all_tickets();
        aggregate_signals(&store, &tickets).await.unwrap();

        let batches = store.nudge_batches();
        assert_eq!(batches, vec![80, 80, 45]);
        assert_eq!(store.message_batches(), vec![80, 80, 45]);
    }

    #[tokio::test]
    async fn store_failure_aborts_with_descriptive_error() {
        let now = Utc::now();
        let store = MemoryStore::default();
        store.push_ticket(ticket("t1", 1, TicketStatus::Assigned, now));
        store.fail_nudges(true);

        let tickets = store.all_tickets();
        let err = aggregate_signals(&store, &tickets).await.unwrap_err();
        assert!(matches!(err, SmartSortError::NudgeRead(_)));
    }

    #[tokio::test]
    async fn message_failure_is_attributed_to_the_message_read() {
        let now = Utc::now();
        let store = MemoryStore::default();
        store.push_ticket(ticket("t1", 1, TicketStatus::Assigned, now));
        store.fail_messages(true);

        let tickets = store.all_tickets();
        let err = aggregate_signals(&store, &tickets).await.unwrap_err();
        assert!(matches!(err, SmartSortError::MessageRead(_)));
    }
}
