//! In-memory [`TicketStore`] used by unit tests; supports fault injection and
//! records the batch sizes it is handed so chunking behavior is observable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    MessageActor, MessageEvent, NudgeEvent, SmartScoreRow, Ticket, TicketId, TicketStatus,
};
use crate::db::repositories::{TicketListFilters, TicketStore};
use crate::db::{PgError, PgResult};

pub fn ticket(id: &str, creator_uid: i64, status: TicketStatus, created_at: DateTime<Utc>) -> Ticket {
    Ticket {
        id: id.into(),
        short_id: format!("T-{id}"),
        subject: format!("subject for {id}"),
        status,
        creator_uid,
        assigned_to_uid: None,
        created_at,
        updated_at: created_at,
    }
}

#[derive(Default)]
struct State {
    tickets: Vec<Ticket>,
    nudges: Vec<NudgeEvent>,
    messages: Vec<MessageEvent>,
    scores: HashMap<TicketId, SmartScoreRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    open_fetches: AtomicUsize,
    nudge_batches: Mutex<Vec<usize>>,
    message_batches: Mutex<Vec<usize>>,
    upsert_batches: Mutex<Vec<usize>>,
    fail_nudges: AtomicBool,
    fail_messages: AtomicBool,
    fail_upserts: AtomicBool,
    fail_scores: AtomicBool,
    open_fetch_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn push_ticket(&self, ticket: Ticket) {
        self.state.lock().unwrap().tickets.push(ticket);
    }

    pub fn push_nudge(&self, ticket_id: &str, created_at: DateTime<Utc>) {
        self.state.lock().unwrap().nudges.push(NudgeEvent {
            ticket_id: ticket_id.into(),
            created_at,
        });
    }

    pub fn push_message(&self, ticket_id: &str, actor: MessageActor, created_at: DateTime<Utc>) {
        self.state.lock().unwrap().messages.push(MessageEvent {
            ticket_id: ticket_id.into(),
            actor,
            created_at,
        });
    }

    pub fn insert_score(&self, row: SmartScoreRow) {
        self.state
            .lock()
            .unwrap()
            .scores
            .insert(row.ticket_id.clone(), row);
    }

    pub fn all_tickets(&self) -> Vec<Ticket> {
        self.state.lock().unwrap().tickets.clone()
    }

    pub fn scores(&self) -> HashMap<TicketId, SmartScoreRow> {
        self.state.lock().unwrap().scores.clone()
    }

    pub fn open_fetch_count(&self) -> usize {
        self.open_fetches.load(Ordering::SeqCst)
    }

    pub fn nudge_batches(&self) -> Vec<usize> {
        self.nudge_batches.lock().unwrap().clone()
    }

    pub fn message_batches(&self) -> Vec<usize> {
        self.message_batches.lock().unwrap().clone()
    }

    pub fn upsert_batches(&self) -> Vec<usize> {
        self.upsert_batches.lock().unwrap().clone()
    }

    pub fn fail_nudges(&self, fail: bool) {
        self.fail_nudges.store(fail, Ordering::SeqCst);
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_scores(&self, fail: bool) {
        self.fail_scores.store(fail, Ordering::SeqCst);
    }

    pub fn set_open_fetch_delay(&self, delay: Duration) {
        *self.open_fetch_delay.lock().unwrap() = Some(delay);
    }

    fn injected() -> PgError {
        PgError::SqlxError(sqlx::Error::Protocol("injected store failure".into()))
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn list_tickets(&self, filters: &TicketListFilters) -> PgResult<Vec<Ticket>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|t| filters.statuses.is_empty() || filters.statuses.contains(&t.status))
            .filter(|t| {
                if filters.unassigned && !filters.assigned_to_uids.is_empty() {
                    t.assigned_to_uid.is_none()
                        || t.assigned_to_uid
                            .is_some_and(|uid| filters.assigned_to_uids.contains(&uid))
                } else if filters.unassigned {
                    t.assigned_to_uid.is_none()
                } else if !filters.assigned_to_uids.is_empty() {
                    t.assigned_to_uid
                        .is_some_and(|uid| filters.assigned_to_uids.contains(&uid))
                } else {
                    true
                }
            })
            .filter(|t| {
                filters.query.as_deref().is_none_or(|q| {
                    t.subject.to_lowercase().contains(&q.to_lowercase())
                })
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn fetch_ticket(&self, id: &TicketId) -> PgResult<Option<Ticket>> {
        let state = self.state.lock().unwrap();
        Ok(state.tickets.iter().find(|t| &t.id == id).cloned())
    }

    async fn fetch_open_tickets(&self) -> PgResult<Vec<Ticket>> {
        let delay = *self.open_fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.open_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .tickets
            .iter()
            .filter(|t| !t.status.is_closed())
            .cloned()
            .collect())
    }

    async fn fetch_nudges(&self, ticket_ids: &[TicketId]) -> PgResult<Vec<NudgeEvent>> {
        if self.fail_nudges.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.nudge_batches.lock().unwrap().push(ticket_ids.len());
        let state = self.state.lock().unwrap();
        Ok(state
            .nudges
            .iter()
            .filter(|n| ticket_ids.contains(&n.ticket_id))
            .cloned()
            .collect())
    }

    async fn fetch_messages(
        &self,
        ticket_ids: &[TicketId],
        actors: &[MessageActor],
    ) -> PgResult<Vec<MessageEvent>> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.message_batches.lock().unwrap().push(ticket_ids.len());
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| ticket_ids.contains(&m.ticket_id) && actors.contains(&m.actor))
            .cloned()
            .collect())
    }

    async fn upsert_scores(&self, rows: &[SmartScoreRow]) -> PgResult<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.upsert_batches.lock().unwrap().push(rows.len());
        let mut state = self.state.lock().unwrap();
        for row in rows {
            state.scores.insert(row.ticket_id.clone(), row.clone());
        }
        Ok(())
    }

    async fn fetch_scores(
        &self,
        ticket_ids: &[TicketId],
    ) -> PgResult<HashMap<TicketId, SmartScoreRow>> {
        if self.fail_scores.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .scores
            .iter()
            .filter(|(id, _)| ticket_ids.contains(id))
            .map(|(id, row)| (id.clone(), row.clone()))
            .collect())
    }
}
