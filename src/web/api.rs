/// Defines the Axum API routes and handlers.

use crate::ingest::{IngestError, StatusIngestor};
use crate::web::models::{CurrentPrintResponse, PrintHistoryResponse, StatusResponse};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use printwatch_shared::StoreError;
use std::sync::Arc;

/// Helper to create a JSON error response with a message and status code
fn json_error(message: &str, status: StatusCode) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn store_error(e: StoreError) -> axum::response::Response {
    tracing::error!("Store error: {}", e);
    match e {
        StoreError::Conflict { .. } => json_error(&e.to_string(), StatusCode::CONFLICT),
        StoreError::Backend(_) => json_error("Internal error", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub struct AppStateInner {
    pub ingestor: StatusIngestor,
}
pub type AppState = Arc<AppStateInner>;

/// Creates the Axum router with all the API endpoints.
pub fn create_router(ingestor: StatusIngestor) -> Router {
    create_router_with_state(Arc::new(AppStateInner { ingestor }))
}

pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/printers/{printer_id}/status", post(ingest_status).get(get_status))
        .route("/api/v1/printers/{printer_id}/current_print", get(get_current_print))
        .route("/api/v1/printers/{printer_id}/prints", get(list_prints))
        .with_state(state)
}

/// POST /api/v1/printers/{printer_id}/status -- process one agent report
async fn ingest_status(
    State(state): State<AppState>,
    Path(printer_id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> axum::response::Response {
    match state.ingestor.ingest(&printer_id, payload).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(IngestError::Report(e)) => json_error(&e.to_string(), StatusCode::BAD_REQUEST),
        Err(IngestError::Store(e)) => store_error(e),
    }
}

/// GET /api/v1/printers/{printer_id}/status -- cached status snapshot
async fn get_status(
    State(state): State<AppState>,
    Path(printer_id): Path<String>,
) -> axum::response::Response {
    match state.ingestor.backends().status.get(&printer_id).await {
        Ok(Some(status)) => (StatusCode::OK, Json(StatusResponse { printer_id, status })).into_response(),
        Ok(None) => json_error("No recent status", StatusCode::NOT_FOUND),
        Err(e) => store_error(e),
    }
}

/// GET /api/v1/printers/{printer_id}/current_print
async fn get_current_print(
    State(state): State<AppState>,
    Path(printer_id): Path<String>,
) -> axum::response::Response {
    match state.ingestor.backends().prints.load(&printer_id).await {
        Ok(Some(print)) => (StatusCode::OK, Json(CurrentPrintResponse::from(print))).into_response(),
        Ok(None) => json_error("No current print", StatusCode::NOT_FOUND),
        Err(e) => store_error(e),
    }
}

/// GET /api/v1/printers/{printer_id}/prints -- retired prints, oldest first
async fn list_prints(
    State(state): State<AppState>,
    Path(printer_id): Path<String>,
) -> axum::response::Response {
    match state.ingestor.backends().prints.history(&printer_id).await {
        Ok(prints) => (StatusCode::OK, Json(PrintHistoryResponse { printer_id, prints })).into_response(),
        Err(e) => store_error(e),
    }
}
