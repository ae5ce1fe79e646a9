use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use rentazuela::workflows::messaging::{
    messaging_router, MarketplaceDirectory, MessagingRepository, MessagingService,
};
use rentazuela::workflows::publishing::{
    publishing_router, ImageStorage, ListingPublisher, ListingRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_marketplace_routes<R, D, L, S>(
    messaging: Arc<MessagingService<R, D>>,
    publisher: Arc<ListingPublisher<L, S>>,
) -> axum::Router
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
    L: ListingRepository + 'static,
    S: ImageStorage + 'static,
{
    messaging_router(messaging)
        .merge(publishing_router(publisher))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
