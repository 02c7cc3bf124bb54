//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, WebhookRequest, WebhookResponse, WireContext};
use super::{AppState, ContextSource};
use crate::channel::Channel;
use crate::context::TurnContexts;
use crate::dispatch::DispatchError;
use crate::turn::Turn;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Create the webhook router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/fulfillment", post(fulfill))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ============================================================
// Fulfillment
// ============================================================

async fn fulfill(
    State(state): State<AppState>,
    Json(request): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, AppError> {
    tracing::debug!(
        response_id = ?request.response_id,
        session = %request.session,
        query = ?request.query_result.query_text,
        source = ?request.source(),
        "Fulfillment request"
    );

    let turn = Turn::new(
        request.query_result.intent.display_name.clone(),
        request.query_result.language_code.clone(),
        Channel::from_source(request.source()),
        request.session.clone(),
    );
    let mut rng = StdRng::from_entropy();

    let response = match &state.contexts {
        ContextSource::Request => {
            let contexts = TurnContexts::new(
                request
                    .query_result
                    .output_contexts
                    .into_iter()
                    .map(WireContext::into_session_context),
            );
            let reply = state.dispatcher.dispatch(&turn, &contexts, &mut rng).await?;
            let output = contexts
                .written()
                .into_iter()
                .map(|context| WireContext::from_session_context(turn.session(), context))
                .collect();
            WebhookResponse::from_reply(reply).with_contexts(output)
        }
        ContextSource::Sqlite { store, locks } => {
            let handle = locks.acquire(turn.session());
            let _turn_guard = handle.lock().await;
            let contexts = store.session(turn.session());
            let result = state.dispatcher.dispatch(&turn, &contexts, &mut rng).await;
            if let Err(e) = contexts.finish_turn() {
                tracing::error!(session = %turn.session(), error = %e, "Failed to age session contexts");
            }
            WebhookResponse::from_reply(result?)
        }
    };

    Ok(Json(response))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownIntent(_) => AppError::NotFound(err.to_string()),
            DispatchError::ContextUnavailable(_) => AppError::Unavailable(err.to_string()),
            DispatchError::NoReply(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
