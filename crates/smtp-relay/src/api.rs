//! HTTP surface
//!
//! - POST /send   - validate and relay an email
//! - GET  /health - liveness and configuration status

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::SmtpSettings;
use crate::error::RelayError;
use crate::relay::Relay;
use crate::types::{ErrorBody, SendResponse};
use crate::validate::validate;

/// Shared, read-only application state
pub struct AppState {
    pub settings: SmtpSettings,
    pub relay: Relay,
}

impl AppState {
    pub fn new(settings: SmtpSettings, relay: Relay) -> Self {
        Self { settings, relay }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/send", post(send_email))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Handle POST /send
///
/// The body is taken raw so that a missing or malformed body is reported by
/// the validator rather than by an extractor rejection.
async fn send_email(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SendResponse>, RelayError> {
    let request = validate(&body)?;
    let config = state.settings.transport_config()?;
    let result = state.relay.send(&config, &request).await?;

    Ok(Json(result.into()))
}

/// Handle GET /health
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "smtp_configured": state.settings.transport_config().is_ok(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not found".to_string(),
            details: None,
        }),
    )
}
