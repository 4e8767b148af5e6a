//! HTTP surface for the onboarding channel.
//!
//! Every response is JSON. Run failures are 5xx with an explicit `failure` kind so a caller can
//! never mistake "could not determine" for a decline.

use crate::onboarding::OnboardingResponse;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kyb_core::{DecisionRecord, DecisionStore, KybError, KybOrchestrator};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub orchestrator: Arc<KybOrchestrator>,
    pub store: Arc<DecisionStore>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/kyb/health", get(health))
        .route("/kyb/check", post(kyb_check))
        .route("/kyb/decisions/:registration_number", get(latest_decision))
        .route(
            "/kyb/decisions/:registration_number/history",
            get(decision_history),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(log_requests))
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        target: "kyb::gateway",
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    response
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    failure: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            failure: "invalid_request",
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            failure: "not_found",
            message: message.into(),
        }
    }

    fn internal(failure: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            failure,
            message: message.into(),
        }
    }
}

impl From<KybError> for ApiError {
    fn from(err: KybError) -> Self {
        let status = match &err {
            KybError::EmptyRegistrationNumber => StatusCode::BAD_REQUEST,
            KybError::Provider(_) => StatusCode::BAD_GATEWAY,
            KybError::StepBudgetExhausted { .. } | KybError::RunTimedOut { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            failure: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "failure": self.failure,
            "requires_human_review": self.status.is_server_error(),
        });
        (self.status, Json(body)).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "kyb-gateway" }))
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    #[serde(default)]
    registration_number: Option<String>,
}

/// POST /kyb/check. The run executes on its own task, so a dropped connection does not abort it
/// and the decision is still recorded.
async fn kyb_check(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<OnboardingResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let number = req
        .registration_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("registration_number is required"))?
        .to_string();

    let orchestrator = Arc::clone(&state.orchestrator);
    let record = tokio::spawn(async move { orchestrator.run(&number).await })
        .await
        .map_err(|e| ApiError::internal("run_aborted", e.to_string()))??;

    Ok(Json(OnboardingResponse::from(&record)))
}

async fn latest_decision(
    State(state): State<Arc<AppState>>,
    Path(registration_number): Path<String>,
) -> Result<Json<DecisionRecord>, ApiError> {
    let record = state
        .store
        .latest(&registration_number)
        .map_err(|e| ApiError::internal("store_error", e.to_string()))?
        .ok_or_else(|| {
            ApiError::not_found(format!("no decision recorded for {}", registration_number.trim()))
        })?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn decision_history(
    State(state): State<Arc<AppState>>,
    Path(registration_number): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DecisionRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let records = state
        .store
        .history(&registration_number, limit)
        .map_err(|e| ApiError::internal("store_error", e.to_string()))?;
    Ok(Json(records))
}
