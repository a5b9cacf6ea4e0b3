use sqlx::PgPool;
use tracing::instrument;

use crate::db::PgResult;

const CREATE_TICKETS: &str = r#"
CREATE TABLE IF NOT EXISTS tickets (
    id              TEXT PRIMARY KEY,
    short_id        TEXT NOT NULL,
    subject         TEXT NOT NULL,
    status          TEXT NOT NULL,
    creator_uid     BIGINT NOT NULL,
    assigned_to_uid BIGINT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TICKET_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS ticket_messages (
    id         BIGSERIAL PRIMARY KEY,
    ticket_id  TEXT NOT NULL REFERENCES tickets (id),
    actor      TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TICKET_NUDGES: &str = r#"
CREATE TABLE IF NOT EXISTS ticket_nudges (
    id               BIGSERIAL PRIMARY KEY,
    ticket_id        TEXT NOT NULL REFERENCES tickets (id),
    requested_by_uid BIGINT NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TICKET_SMART_SCORES: &str = r#"
CREATE TABLE IF NOT EXISTS ticket_smart_scores (
    ticket_id     TEXT PRIMARY KEY,
    urgency_score DOUBLE PRECISION NOT NULL,
    time_score    DOUBLE PRECISION NOT NULL,
    computed_at   TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets (status)",
    "CREATE INDEX IF NOT EXISTS idx_ticket_messages_ticket ON ticket_messages (ticket_id)",
    "CREATE INDEX IF NOT EXISTS idx_ticket_nudges_ticket ON ticket_nudges (ticket_id)",
];

#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> PgResult<()> {
    for ddl in [
        CREATE_TICKETS,
        CREATE_TICKET_MESSAGES,
        CREATE_TICKET_NUDGES,
        CREATE_TICKET_SMART_SCORES,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in CREATE_INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::debug!("schema ensured");
    Ok(())
}
