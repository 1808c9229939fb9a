use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use scoring_processor::error::AppError;
use scoring_processor::processor::MessageTransport;
use serde_json::json;
use tracing::debug;

pub(crate) fn service_routes() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/events/:topic",
            axum::routing::post(ingest_event_endpoint),
        )
}

pub(crate) async fn healthcheck(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.transport.is_connected() {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "disconnected" })),
        )
    }
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

/// Local stand-in for the broker: queues the raw body on `topic` for the processor loop.
pub(crate) async fn ingest_event_endpoint(
    Extension(state): Extension<AppState>,
    Path(topic): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if !state.topics.subscriptions().contains(&topic.as_str()) {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("topic {topic} is not subscribed") })),
        ));
    }

    let position = state.publisher.publish(&topic, body).await?;
    debug!(?position, "event queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "position": position })),
    ))
}
