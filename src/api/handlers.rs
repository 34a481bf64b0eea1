//! HTTP request handlers

use super::media_stream::media_stream;
use super::twiml::{self, MEDIA_STREAM_PATH, TWIML_PATH};
use super::types::{
    ActiveCallsResponse, ConversationListResponse, ConversationResponse, ErrorResponse,
    FailureResponse, NextActionRequest, NextActionResponse, OutboundCallRequest,
    OutboundCallResponse, StatusResponse, TwimlParams,
};
use super::AppState;
use crate::evaluation::{CandidatePool, EvaluationError, DEFAULT_ROLLOUTS};
use axum::{
    extract::{Host, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/", get(health))
        // Live and flushed calls
        .route("/api/calls", get(active_calls))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/:call_id", get(get_conversation))
        // Action evaluation
        .route("/next-action", post(next_action))
        // Outbound calls
        .route("/outbound-call", post(outbound_call))
        .route(TWIML_PATH, get(outbound_call_twiml).post(outbound_call_twiml))
        .route(MEDIA_STREAM_PATH, get(media_stream))
        .with_state(state)
}

// ============================================================
// Health and Inspection
// ============================================================

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Server is running".to_string(),
    })
}

async fn active_calls(State(state): State<AppState>) -> Json<ActiveCallsResponse> {
    Json(ActiveCallsResponse {
        active_calls: state.registry.active_calls().await,
    })
}

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state
        .registry
        .store()
        .list_conversations()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ConversationListResponse { conversations }))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .registry
        .store()
        .load_conversation(&call_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Conversation not found: {call_id}")))?;

    Ok(Json(ConversationResponse { conversation }))
}

// ============================================================
// Action Evaluation
// ============================================================

async fn next_action(
    State(state): State<AppState>,
    Json(req): Json<NextActionRequest>,
) -> Result<Json<NextActionResponse>, AppError> {
    let outcome = match req.candidates {
        Some(raw) => {
            let candidates = CandidatePool::from_value(&raw)?.into_inner();
            let rollouts = req.rollouts_per_candidate.unwrap_or(DEFAULT_ROLLOUTS);
            state
                .evaluator
                .evaluate_parallel(req.conversation_history, req.goals, candidates, rollouts)
                .await?
        }
        None => {
            state
                .evaluator
                .generate_best_action_parallel(req.conversation_history, req.goals)
                .await?
        }
    };

    tracing::info!(
        best_action = %outcome.best_action,
        expected_value = outcome.expected_value,
        candidates = outcome.details.len(),
        "Next action selected"
    );

    Ok(Json(NextActionResponse {
        success: true,
        best_action: outcome.best_action,
        highest_ev: outcome.expected_value,
    }))
}

// ============================================================
// Outbound Calls
// ============================================================

async fn outbound_call(
    State(state): State<AppState>,
    Host(request_host): Host,
    Json(req): Json<OutboundCallRequest>,
) -> Result<Json<OutboundCallResponse>, AppError> {
    let number = req
        .number
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Phone number is required".to_string()))?;

    let initiator = state.initiator.as_ref().ok_or_else(|| {
        AppError::Unavailable("Twilio credentials are not configured".to_string())
    })?;

    let host = public_host(&state, &request_host);
    let callback = twiml::callback_url(
        host,
        req.prompt.as_deref().unwrap_or_default(),
        req.first_message.as_deref().unwrap_or_default(),
    )
    .map_err(AppError::Internal)?;

    match initiator.initiate(&number, callback.as_str()).await {
        Ok(call_sid) => Ok(Json(OutboundCallResponse {
            success: true,
            message: "Call initiated".to_string(),
            call_sid,
        })),
        Err(e) => {
            tracing::error!(error = %e, to = %number, "Error initiating outbound call");
            Err(AppError::Failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to initiate call".to_string(),
            ))
        }
    }
}

async fn outbound_call_twiml(
    State(state): State<AppState>,
    Host(request_host): Host,
    Query(params): Query<TwimlParams>,
) -> impl IntoResponse {
    let host = public_host(&state, &request_host);
    (
        [(header::CONTENT_TYPE, "text/xml")],
        twiml::connect_stream(host, &params.prompt, &params.first_message),
    )
}

/// Host Twilio should reach us on: the configured one, else the request's
fn public_host<'a>(state: &'a AppState, request_host: &'a str) -> &'a str {
    state.config.public_host.as_deref().unwrap_or(request_host)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
    /// Reported as `{"success": false, "error": ..}`
    Failure(StatusCode, String),
}

impl From<EvaluationError> for AppError {
    fn from(e: EvaluationError) -> Self {
        match e {
            EvaluationError::InvalidArgument(msg) => AppError::Failure(StatusCode::BAD_REQUEST, msg),
            EvaluationError::Worker(msg) => {
                tracing::error!(error = %msg, "Evaluation worker failed");
                AppError::Failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to evaluate actions".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Failure(status, msg) => {
                return (status, Json(FailureResponse::new(msg))).into_response();
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
