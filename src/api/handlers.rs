use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::{SmartScoreRow, Ticket, TicketId, TicketListFilters, TicketStatus};
use crate::smart_sort::rank::{SortDirection, TicketSort};
use crate::smart_sort::recompute::RecomputeOutcome;
use crate::smart_sort::signals::{SignalSet, aggregate_signals};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub direction: Option<String>,
    /// Comma-separated status names; unknown names are dropped.
    pub status: Option<String>,
    /// Comma-separated assignee uids; the literal `none` selects unassigned.
    pub assigned: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminTicketView {
    pub id: TicketId,
    pub short_id: String,
    pub subject: String,
    pub status: TicketStatus,
    pub creator_uid: i64,
    pub assigned_to_uid: Option<i64>,
    pub nudge_last_at: Option<DateTime<Utc>>,
    pub nudge_pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_filters(query: &ListQuery) -> TicketListFilters {
    let statuses = query
        .status
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|s| s.trim().parse::<TicketStatus>().ok())
                .collect()
        })
        .unwrap_or_default();

    let mut unassigned = false;
    let mut assigned_to_uids = Vec::new();
    if let Some(raw) = query.assigned.as_deref() {
        for part in raw.split(',').map(str::trim) {
            if part == "none" {
                unassigned = true;
            } else if let Ok(uid) = part.parse::<i64>() {
                assigned_to_uids.push(uid);
            }
        }
    }

    TicketListFilters {
        statuses,
        assigned_to_uids,
        unassigned,
        query: query.q.clone().filter(|q| !q.is_empty()),
    }
}

fn view_for(ticket: Ticket, signals: &SignalSet) -> AdminTicketView {
    let s = signals.signals_for(&ticket.id);
    let nudge_pending = !ticket.status.is_closed()
        && s.last_nudge_at.is_some_and(|nudged| {
            s.last_staff_reply_at.is_none_or(|replied| nudged > replied)
        });

    AdminTicketView {
        id: ticket.id,
        short_id: ticket.short_id,
        subject: ticket.subject,
        status: ticket.status,
        creator_uid: ticket.creator_uid,
        assigned_to_uid: ticket.assigned_to_uid,
        nudge_last_at: s.last_nudge_at,
        nudge_pending,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
    }
}

/// Admin queue listing: filter upstream, decorate with nudge state, rank.
#[instrument(skip(state, query))]
pub async fn list_admin_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> JsonResult<Vec<AdminTicketView>> {
    let smart = state.smart()?;

    let filters = parse_filters(&query);
    let tickets = smart.store().list_tickets(&filters).await?;
    let signals = aggregate_signals(smart.store(), &tickets).await?;

    let sort = TicketSort::parse(query.sort.as_deref());
    let direction = SortDirection::parse(query.direction.as_deref());
    let ranked = smart.rank(tickets, sort, direction).await?;

    Ok(Json(
        ranked
            .into_iter()
            .map(|ticket| view_for(ticket, &signals))
            .collect(),
    ))
}

/// On-demand recompute trigger for the admin "recompute now" action.
#[instrument(skip(state))]
pub async fn recompute_now(State(state): State<AppState>) -> JsonResult<RecomputeOutcome> {
    let outcome = state.smart()?.recompute().await?;
    Ok(Json(outcome))
}

#[instrument(skip(state))]
pub async fn ticket_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> JsonResult<SmartScoreRow> {
    let ticket_id = TicketId(id);
    match state.smart()?.score_for(&ticket_id).await? {
        Some(row) => Ok(Json(row)),
        None => Err(RouteError::ScoreNotFound(ticket_id)),
    }
}
