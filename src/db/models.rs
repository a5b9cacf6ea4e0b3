use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    PendingAssign,
    Assigned,
    RepliedByStaff,
    RepliedByCustomer,
    Closed,
}

impl TicketStatus {
    /// Every status a ticket can hold while still participating in scoring.
    pub const OPEN: [TicketStatus; 4] = [
        TicketStatus::PendingAssign,
        TicketStatus::Assigned,
        TicketStatus::RepliedByStaff,
        TicketStatus::RepliedByCustomer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::PendingAssign => "pending_assign",
            TicketStatus::Assigned => "assigned",
            TicketStatus::RepliedByStaff => "replied_by_staff",
            TicketStatus::RepliedByCustomer => "replied_by_customer",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_assign" => Ok(TicketStatus::PendingAssign),
            "assigned" => Ok(TicketStatus::Assigned),
            "replied_by_staff" => Ok(TicketStatus::RepliedByStaff),
            "replied_by_customer" => Ok(TicketStatus::RepliedByCustomer),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("unknown ticket status '{other}'")),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub short_id: String,
    pub subject: String,
    pub status: TicketStatus,
    pub creator_uid: i64,
    pub assigned_to_uid: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageActor {
    Customer,
    Staff,
    System,
    Anonymous,
}

impl MessageActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageActor::Customer => "customer",
            MessageActor::Staff => "staff",
            MessageActor::System => "system",
            MessageActor::Anonymous => "anonymous",
        }
    }

    /// Staff and anonymous messages both count as a staff-side touch; system
    /// messages never do.
    pub fn is_staff_side(&self) -> bool {
        matches!(self, MessageActor::Staff | MessageActor::Anonymous)
    }
}

impl FromStr for MessageActor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(MessageActor::Customer),
            "staff" => Ok(MessageActor::Staff),
            "system" => Ok(MessageActor::System),
            "anonymous" => Ok(MessageActor::Anonymous),
            other => Err(format!("unknown message actor '{other}'")),
        }
    }
}

/// Per-message event as the aggregator consumes it. Body content is never
/// loaded; only attribution and timing matter here.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub ticket_id: TicketId,
    pub actor: MessageActor,
    pub created_at: DateTime<Utc>,
}

/// A customer's "please look at this" request; only timing matters to
/// scoring, the requester does not.
#[derive(Debug, Clone)]
pub struct NudgeEvent {
    pub ticket_id: TicketId,
    pub created_at: DateTime<Utc>,
}

/// Cached output of one recompute pass; one row per ticket, overwritten
/// wholesale on the next pass and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SmartScoreRow {
    pub ticket_id: TicketId,
    pub urgency_score: f64,
    pub time_score: f64,
    pub computed_at: DateTime<Utc>,
}
