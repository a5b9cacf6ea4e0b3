use std::sync::LazyLock;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::util::env::{Env, EnvErr};

pub mod models;
pub mod repositories;
pub mod schema;

pub mod prelude {
    pub use crate::db::models::{
        MessageActor, MessageEvent, NudgeEvent, SmartScoreRow, Ticket, TicketId, TicketStatus,
    };
    pub use crate::db::repositories::{TicketListFilters, TicketRepository, TicketStore};
    pub use crate::db::{PgError, PgResult, db_pool};
}

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);

/// Process-wide pool accessor. Errors with [`PgError::Unconfigured`] when no
/// `DATABASE_URL` is present, so callers can treat the store as optional.
pub async fn db_pool() -> PgResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    async fn new_pool() -> PgResult<Self> {
        let env = Env::get().await?;
        let db_url = env.database_url.as_deref().ok_or(PgError::Unconfigured)?;
        let pool = sqlx::PgPool::connect(db_url).await?;

        Ok(Self { pool })
    }
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error("{0}")]
    EnvError(#[from] EnvErr),

    #[error("DATABASE_URL is not configured")]
    Unconfigured,

    #[error("unexpected row data: {0}")]
    Corrupt(String),
}
