use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::models::{SmartScoreRow, Ticket, TicketId};
use crate::smart_sort::score::time_blend;
use crate::smart_sort::{IN_CHUNK_SIZE, SmartSort, SmartSortError, SmartSortResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSort {
    CreatedAt,
    #[default]
    UpdatedAt,
    Smart,
}

impl TicketSort {
    /// Unknown or missing values fall back to the default rather than erroring.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("created_at") => TicketSort::CreatedAt,
            Some("updated_at") => TicketSort::UpdatedAt,
            Some("smart") => TicketSort::Smart,
            _ => TicketSort::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            _ => SortDirection::default(),
        }
    }

    fn apply(&self, ord: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

impl SmartSort {
    /// Order a candidate listing.
    ///
    /// Chronological modes compare the requested timestamp; smart mode joins
    /// cached urgency scores with a neutral fallback for never-scored
    /// tickets. Every mode ends its tie-break chain at the ticket id
    /// (ascending), so the result is a strict total order.
    #[instrument(skip(self, tickets), fields(count = tickets.len()))]
    pub async fn rank(
        &self,
        mut tickets: Vec<Ticket>,
        sort: TicketSort,
        direction: SortDirection,
    ) -> SmartSortResult<Vec<Ticket>> {
        match sort {
            TicketSort::CreatedAt => {
                tickets.sort_by(|a, b| {
                    direction
                        .apply(a.created_at.cmp(&b.created_at))
                        .then_with(|| a.id.cmp(&b.id))
                });
                Ok(tickets)
            }
            TicketSort::UpdatedAt => {
                tickets.sort_by(|a, b| {
                    direction
                        .apply(a.updated_at.cmp(&b.updated_at))
                        .then_with(|| a.id.cmp(&b.id))
                });
                Ok(tickets)
            }
            TicketSort::Smart => {
                let scores = self.cached_scores(&tickets).await?;
                let now = Utc::now();

                let mut keyed: Vec<(f64, f64, Ticket)> = tickets
                    .into_iter()
                    .map(|ticket| {
                        let cached = self.usable_score(&ticket, scores.get(&ticket.id), now);
                        let urgency = cached.map(|row| row.urgency_score).unwrap_or(0.0);
                        let time = cached.map(|row| row.time_score).unwrap_or_else(|| {
                            time_blend(ticket.created_at, ticket.updated_at)
                        });
                        (urgency, time, ticket)
                    })
                    .collect();

                keyed.sort_by(|a, b| {
                    direction
                        .apply(a.0.total_cmp(&b.0))
                        .then_with(|| direction.apply(a.1.total_cmp(&b.1)))
                        .then_with(|| a.2.id.cmp(&b.2.id))
                });

                Ok(keyed.into_iter().map(|(_, _, ticket)| ticket).collect())
            }
        }
    }

    /// Cached score for one ticket, or `None` when the ticket is unknown,
    /// closed (stale pre-closure rows are never exposed), or past the TTL.
    #[instrument(skip(self), fields(ticket = ticket_id.as_str()))]
    pub async fn score_for(&self, ticket_id: &TicketId) -> SmartSortResult<Option<SmartScoreRow>> {
        let ticket = self
            .store
            .fetch_ticket(ticket_id)
            .await
            .map_err(|e| SmartSortError::TicketRead(e.to_string()))?;
        let Some(ticket) = ticket else {
            return Ok(None);
        };

        let scores = self
            .store
            .fetch_scores(std::slice::from_ref(ticket_id))
            .await
            .map_err(|e| SmartSortError::ScoreRead(e.to_string()))?;

        Ok(self
            .usable_score(&ticket, scores.get(ticket_id), Utc::now())
            .cloned())
    }

    async fn cached_scores(
        &self,
        tickets: &[Ticket],
    ) -> SmartSortResult<HashMap<TicketId, SmartScoreRow>> {
        let ids: Vec<TicketId> = tickets.iter().map(|t| t.id.clone()).collect();
        let mut merged = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(IN_CHUNK_SIZE) {
            let scores = self
                .store
                .fetch_scores(chunk)
                .await
                .map_err(|e| SmartSortError::ScoreRead(e.to_string()))?;
            merged.extend(scores);
        }

        Ok(merged)
    }

    fn usable_score<'a>(
        &self,
        ticket: &Ticket,
        row: Option<&'a SmartScoreRow>,
        now: DateTime<Utc>,
    ) -> Option<&'a SmartScoreRow> {
        if ticket.status.is_closed() {
            return None;
        }
        let row = row?;
        if let Some(ttl) = self.score_ttl {
            let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
            if now - row.computed_at > ttl {
                return None;
            }
        }
        Some(row)
    }
}
