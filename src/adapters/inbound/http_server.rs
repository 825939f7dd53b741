//! HTTP Server
//!
//! Thin request dispatch over the read models. Handlers resolve their DAO
//! from the container on every request; the whole router sits behind the
//! maintenance guard.

use crate::application::container::{CompositionError, Container};
use crate::domain::ports::{ConferenceDao, DataAccessError, OrderDao, PaymentDao};
use crate::infrastructure::{maintenance_guard, shutdown_signal, MaintenanceModeGate, ShutdownController};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Shared state of the request handlers.
#[derive(Clone)]
pub struct AppState {
    pub container: Arc<Container>,
}

/// Request failure mapped to a JSON response.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
}

impl From<DataAccessError> for ApiError {
    fn from(e: DataAccessError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CompositionError> for ApiError {
    fn from(e: CompositionError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{} not found", what) })),
            )
                .into_response(),
            Self::Internal(reason) => {
                tracing::error!("request failed: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "an unexpected error occurred" })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocateOrderQuery {
    pub email: String,
    pub access_code: String,
}

/// Build the request dispatch, maintenance guard included.
pub fn router(container: Arc<Container>, gate: Arc<MaintenanceModeGate>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/conferences/:code", get(conference_handler))
        .route("/conferences/:code/alias", get(conference_alias_handler))
        .route("/conferences/:code/seats", get(seat_types_handler))
        .route("/orders", get(locate_order_handler))
        .route("/orders/:id", get(order_handler))
        .route("/payments/:id", get(payment_handler))
        .with_state(AppState { container })
        .layer(middleware::from_fn_with_state(gate, maintenance_guard))
        .layer(TraceLayer::new_for_http())
}

/// HTTP listener serving the router until shutdown.
pub struct HttpServer {
    listen_addr: String,
    router: Router,
}

impl HttpServer {
    pub fn new(listen_addr: impl Into<String>, router: Router) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            router,
        }
    }

    /// Serve until Ctrl+C, SIGTERM or a shutdown/recycle request.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("HTTP server listening on {}", self.listen_addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn conference_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let dao = state.container.resolve::<dyn ConferenceDao>()?;
    match dao.get_conference_details(&code).await? {
        Some(details) => Ok(Json(details).into_response()),
        None => Err(ApiError::NotFound(format!("conference {}", code))),
    }
}

async fn conference_alias_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let dao = state.container.resolve::<dyn ConferenceDao>()?;
    match dao.get_conference_alias(&code).await? {
        Some(alias) => Ok(Json(alias).into_response()),
        None => Err(ApiError::NotFound(format!("conference {}", code))),
    }
}

async fn seat_types_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let dao = state.container.resolve::<dyn ConferenceDao>()?;
    let alias = dao
        .get_conference_alias(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("conference {}", code)))?;
    let seats = dao.get_published_seat_types(alias.id).await?;
    Ok(Json(seats).into_response())
}

async fn locate_order_handler(
    State(state): State<AppState>,
    Query(query): Query<LocateOrderQuery>,
) -> Result<Response, ApiError> {
    let dao = state.container.resolve::<dyn OrderDao>()?;
    match dao.locate_order(&query.email, &query.access_code).await? {
        Some(order_id) => Ok(Json(json!({ "order_id": order_id })).into_response()),
        None => Err(ApiError::NotFound("order".to_string())),
    }
}

async fn order_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let dao = state.container.resolve::<dyn OrderDao>()?;
    match dao.find_priced_order(id).await? {
        Some(order) => Ok(Json(order).into_response()),
        None => Err(ApiError::NotFound(format!("order {}", id))),
    }
}

async fn payment_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let dao = state.container.resolve::<dyn PaymentDao>()?;
    match dao.find_third_party_processor_payment(id).await? {
        Some(payment) => Ok(Json(payment).into_response()),
        None => Err(ApiError::NotFound(format!("payment {}", id))),
    }
}
