use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{Method, StatusCode};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handlers::{list_admin_tickets, recompute_now, ticket_score};
use crate::db::prelude::{PgError, TicketId};
use crate::smart_sort::{SmartSort, SmartSortError};
use crate::util::env::{Env, EnvErr};

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone)]
pub struct AppState {
    /// Absent when no `DATABASE_URL` is configured; store-backed routes then
    /// answer 503 instead of panicking at startup.
    pub smart: Option<Arc<SmartSort>>,
}

impl AppState {
    pub fn smart(&self) -> core::result::Result<&Arc<SmartSort>, RouteError> {
        self.smart.as_ref().ok_or(RouteError::StoreUnconfigured)
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    QueryError(#[from] PgError),

    #[error(transparent)]
    SmartSort(#[from] SmartSortError),

    #[error("ticket store is not configured")]
    StoreUnconfigured,

    #[error("no smart score computed for ticket '{0}'")]
    ScoreNotFound(TicketId),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            RouteError::QueryError(_) | RouteError::SmartSort(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RouteError::StoreUnconfigured => StatusCode::SERVICE_UNAVAILABLE,
            RouteError::ScoreNotFound(_) => StatusCode::NOT_FOUND,
        };

        let message = self.to_string();
        tracing::debug!(%status, message, "route error");

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/admin/tickets", get(list_admin_tickets))
        .route("/admin/tickets/{id}/score", get(ticket_score))
        .route("/admin/smart-sort/recompute", post(recompute_now))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ServeErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Env(#[from] EnvErr),
}

#[instrument(skip(state))]
pub async fn serve(state: AppState) -> core::result::Result<(), ServeErr> {
    let env = Env::get().await?;
    let app = router(state);

    let socket_addr = SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
        env.server_api_port,
    );
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!(%socket_addr, "admin api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
