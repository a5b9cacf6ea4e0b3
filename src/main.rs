use std::sync::Arc;

use thiserror::Error;

use crate::api::server::{AppState, ServeErr};
use crate::db::PgError;
use crate::db::repositories::{TicketRepository, TicketStore};
use crate::smart_sort::{SmartSort, SmartSortScheduler};
use crate::util::env::{Env, EnvErr};

mod api;
mod db;
mod smart_sort;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Pg(#[from] PgError),

    #[error(transparent)]
    Serve(#[from] ServeErr),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    util::telemetry::init();
    let env = Env::get().await?;

    tracing::info!("starting triage server");

    let smart = match db::db_pool().await {
        Ok(pool) => {
            db::schema::ensure_schema(pool).await?;
            let store: Arc<dyn TicketStore> = Arc::new(TicketRepository::new(pool));
            Some(Arc::new(
                SmartSort::new(store)
                    .with_pass_timeout(env.smart_sort_pass_timeout)
                    .with_score_ttl(env.smart_sort_score_ttl),
            ))
        }
        Err(PgError::Unconfigured) => {
            tracing::warn!("DATABASE_URL unset; smart sort and admin listing disabled");
            None
        }
        Err(err) => return Err(err.into()),
    };

    let scheduler = SmartSortScheduler::new(smart.clone(), env.smart_sort_cron_enabled);
    let _recompute_timer = scheduler.start();

    api::server::serve(AppState { smart }).await?;
    Ok(())
}
