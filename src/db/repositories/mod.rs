use std::collections::HashMap;

use async_trait::async_trait;

use crate::db::PgResult;
use crate::db::models::{
    MessageActor, MessageEvent, NudgeEvent, SmartScoreRow, Ticket, TicketId, TicketStatus,
};

pub mod tickets;

pub use tickets::TicketRepository;

/// Upstream filters for the admin listing. Everything here narrows the
/// candidate set before ranking; ordering itself is the ranker's job.
#[derive(Debug, Default, Clone)]
pub struct TicketListFilters {
    pub statuses: Vec<TicketStatus>,
    pub assigned_to_uids: Vec<i64>,
    pub unassigned: bool,
    pub query: Option<String>,
}

/// Store contract the smart-sort core consumes.
///
/// Batch methods execute the ids they are handed as a single lookup; keeping
/// each batch under the store's `IN`-list limits is the caller's
/// responsibility (the aggregator and ranker chunk at 80, score persistence
/// at 200).
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn list_tickets(&self, filters: &TicketListFilters) -> PgResult<Vec<Ticket>>;

    async fn fetch_ticket(&self, id: &TicketId) -> PgResult<Option<Ticket>>;

    /// Every ticket whose status is not closed.
    async fn fetch_open_tickets(&self) -> PgResult<Vec<Ticket>>;

    async fn fetch_nudges(&self, ticket_ids: &[TicketId]) -> PgResult<Vec<NudgeEvent>>;

    async fn fetch_messages(
        &self,
        ticket_ids: &[TicketId],
        actors: &[MessageActor],
    ) -> PgResult<Vec<MessageEvent>>;

    /// Overwrite-by-key upsert; a prior row for a ticket is fully replaced.
    async fn upsert_scores(&self, rows: &[SmartScoreRow]) -> PgResult<()>;

    async fn fetch_scores(
        &self,
        ticket_ids: &[TicketId],
    ) -> PgResult<HashMap<TicketId, SmartScoreRow>>;
}
