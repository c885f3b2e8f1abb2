use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use house_service::auth::TokenIssuer;
use house_service::housing::{housing_router, HouseRepository, HouseService, Notifier};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Housing API plus the operational endpoints. Expects an [`AppState`] extension layer.
pub(crate) fn with_housing_routes<R, N>(
    service: Arc<HouseService<R, N>>,
    tokens: Arc<TokenIssuer>,
) -> Router
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    housing_router(service, tokens)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
