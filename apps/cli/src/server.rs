//! HTTP surface: health check and `/predict`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::Result;
use docbot_core::AnswerService;
use docbot_shared::{Answer, DocBotError, MODEL_VERSION, Question};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Health payload returned by `GET /`.
#[derive(Debug, Serialize)]
struct Health {
    health_check: &'static str,
    model_version: &'static str,
}

/// Build the router around a shared answer service.
pub(crate) fn router(service: Arc<AnswerService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind `addr` and serve until ctrl-c.
pub(crate) async fn serve(addr: &str, service: Arc<AnswerService>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn health() -> Json<Health> {
    Json(Health {
        health_check: "OK",
        model_version: MODEL_VERSION,
    })
}

async fn predict(
    State(service): State<Arc<AnswerService>>,
    Json(question): Json<Question>,
) -> Result<Json<Answer>, ApiError> {
    let answer = service.answer(&question.text).await?;
    Ok(Json(answer))
}

/// A [`DocBotError`] rendered as an HTTP response.
#[derive(Debug)]
struct ApiError(DocBotError);

impl From<DocBotError> for ApiError {
    fn from(err: DocBotError) -> Self {
        Self(err)
    }
}

pub(crate) fn status_for(err: &DocBotError) -> StatusCode {
    match err {
        DocBotError::NoContext => StatusCode::NOT_FOUND,
        DocBotError::Validation { .. } => StatusCode::BAD_REQUEST,
        DocBotError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        warn!(status = status.as_u16(), error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
