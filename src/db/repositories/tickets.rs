use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use crate::db::prelude::{
    MessageActor, MessageEvent, NudgeEvent, PgError, PgResult, SmartScoreRow, Ticket, TicketId,
    TicketListFilters, TicketStatus, TicketStore,
};

const TICKET_COLUMNS: &str =
    "id, short_id, subject, status, creator_uid, assigned_to_uid, created_at, updated_at";

pub struct TicketRepository {
    pool: &'static PgPool,
}

impl TicketRepository {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: String,
    short_id: String,
    subject: String,
    status: String,
    creator_uid: i64,
    assigned_to_uid: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = PgError;

    fn try_from(row: TicketRow) -> PgResult<Ticket> {
        let status = row.status.parse::<TicketStatus>().map_err(PgError::Corrupt)?;
        Ok(Ticket {
            id: TicketId(row.id),
            short_id: row.short_id,
            subject: row.subject,
            status,
            creator_uid: row.creator_uid,
            assigned_to_uid: row.assigned_to_uid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    ticket_id: String,
    actor: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct NudgeRow {
    ticket_id: String,
    created_at: DateTime<Utc>,
}

fn open_status_params() -> Vec<String> {
    TicketStatus::OPEN
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

fn id_params(ticket_ids: &[TicketId]) -> Vec<String> {
    ticket_ids.iter().map(|id| id.0.clone()).collect()
}

#[async_trait::async_trait]
impl TicketStore for TicketRepository {
    #[instrument(skip(self, filters), fields(statuses = filters.statuses.len()))]
    async fn list_tickets(&self, filters: &TicketListFilters) -> PgResult<Vec<Ticket>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE TRUE"));

        if !filters.statuses.is_empty() {
            let statuses: Vec<String> = filters
                .statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        }

        let uids = filters.assigned_to_uids.clone();
        if filters.unassigned && !uids.is_empty() {
            qb.push(" AND (assigned_to_uid IS NULL OR assigned_to_uid = ANY(")
                .push_bind(uids)
                .push("))");
        } else if filters.unassigned {
            qb.push(" AND assigned_to_uid IS NULL");
        } else if !uids.is_empty() {
            qb.push(" AND assigned_to_uid = ANY(").push_bind(uids).push(")");
        }

        if let Some(q) = filters.query.as_deref().filter(|q| !q.is_empty()) {
            qb.push(" AND subject ILIKE ").push_bind(format!("%{q}%"));
        }

        // Ranking re-sorts in process; this is only a deterministic baseline.
        qb.push(" ORDER BY updated_at DESC, id ASC");

        let rows: Vec<TicketRow> = qb.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(Ticket::try_from).collect()
    }

    #[instrument(skip(self), fields(ticket = id.as_str()))]
    async fn fetch_ticket(&self, id: &TicketId) -> PgResult<Option<Ticket>> {
        let row: Option<TicketRow> = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"
        ))
        .bind(&id.0)
        .fetch_optional(self.pool)
        .await?;

        row.map(Ticket::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn fetch_open_tickets(&self) -> PgResult<Vec<Ticket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE status = ANY($1)"
        ))
        .bind(open_status_params())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    #[instrument(skip(self, ticket_ids), fields(count = ticket_ids.len()))]
    async fn fetch_nudges(&self, ticket_ids: &[TicketId]) -> PgResult<Vec<NudgeEvent>> {
        if ticket_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<NudgeRow> = sqlx::query_as(
            "SELECT ticket_id, created_at FROM ticket_nudges \
             WHERE ticket_id = ANY($1)",
        )
        .bind(id_params(ticket_ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| NudgeEvent {
                ticket_id: TicketId(r.ticket_id),
                created_at: r.created_at,
            })
            .collect())
    }

    #[instrument(skip(self, ticket_ids, actors), fields(count = ticket_ids.len()))]
    async fn fetch_messages(
        &self,
        ticket_ids: &[TicketId],
        actors: &[MessageActor],
    ) -> PgResult<Vec<MessageEvent>> {
        if ticket_ids.is_empty() || actors.is_empty() {
            return Ok(Vec::new());
        }

        let actor_params: Vec<String> = actors.iter().map(|a| a.as_str().to_string()).collect();
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT ticket_id, actor, created_at FROM ticket_messages \
             WHERE ticket_id = ANY($1) AND actor = ANY($2)",
        )
        .bind(id_params(ticket_ids))
        .bind(actor_params)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let actor = r.actor.parse::<MessageActor>().map_err(PgError::Corrupt)?;
                Ok(MessageEvent {
                    ticket_id: TicketId(r.ticket_id),
                    actor,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn upsert_scores(&self, rows: &[SmartScoreRow]) -> PgResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO ticket_smart_scores (ticket_id, urgency_score, time_score, computed_at) ",
        );
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.ticket_id.0)
                .push_bind(row.urgency_score)
                .push_bind(row.time_score)
                .push_bind(row.computed_at);
        });
        qb.push(
            " ON CONFLICT (ticket_id) DO UPDATE SET \
             urgency_score = EXCLUDED.urgency_score, \
             time_score = EXCLUDED.time_score, \
             computed_at = EXCLUDED.computed_at",
        );

        qb.build().execute(self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self, ticket_ids), fields(count = ticket_ids.len()))]
    async fn fetch_scores(
        &self,
        ticket_ids: &[TicketId],
    ) -> PgResult<HashMap<TicketId, SmartScoreRow>> {
        if ticket_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<SmartScoreRow> = sqlx::query_as(
            "SELECT ticket_id, urgency_score, time_score, computed_at \
             FROM ticket_smart_scores WHERE ticket_id = ANY($1)",
        )
        .bind(id_params(ticket_ids))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.ticket_id.clone(), row))
            .collect())
    }
}
