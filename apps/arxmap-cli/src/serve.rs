use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use arxmap_viz::payload::Details;
use arxmap_viz::VisualizationPayload;

#[derive(Clone)]
struct AppState {
    details: Arc<Details>,
}

/// Read-only API over the payload's detail map. Any origin may call it, the
/// map frontend is served from elsewhere.
pub fn router(payload: VisualizationPayload) -> Router {
    let state = AppState { details: Arc::new(payload.details) };
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/paper/{id}", get(get_paper))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn get_paper(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BTreeMap<String, Value>>, (StatusCode, Json<Value>)> {
    match state.details.get(&id) {
        Some(detail) => Ok(Json(detail.clone())),
        None => Err((StatusCode::NOT_FOUND, Json(json!({ "detail": "Paper not found" })))),
    }
}
