//! HTTP surface.
//!
//! Handlers map domain errors to status codes with generic messages; detail
//! only goes to the log.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use log::{error, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::{GateError, JoinError, PaymentError, SessionError, ValidationError};
use crate::leaderboard::{LeaderboardData, LeaderboardKind, LeaderboardStore, PlayerStats, ScoreRecorder};
use crate::payment::{PaymentGate, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
use crate::payout::PayoutService;
use crate::rate_limit::{rate_limit, FixedWindowLimiter};
use crate::session::{SessionGate, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub payment: Arc<PaymentGate>,
    pub sessions: SessionGate,
    pub leaderboard: Arc<dyn LeaderboardStore>,
    pub scores: Arc<dyn ScoreRecorder>,
    pub payout: Option<PayoutService>,
}

impl AppState {
    pub fn new(
        payment: PaymentGate,
        sessions: Arc<dyn SessionStore>,
        leaderboard: Arc<dyn LeaderboardStore>,
        scores: Arc<dyn ScoreRecorder>,
        payout: Option<PayoutService>,
    ) -> Self {
        Self {
            payment: Arc::new(payment),
            sessions: SessionGate::new(sessions),
            leaderboard,
            scores,
            payout,
        }
    }
}

/// Build the router. `/join` and `/submit-score` sit behind the limiter.
/// An empty origin list allows any origin.
pub fn router(state: AppState, limiter: Arc<FixedWindowLimiter>, cors_origins: &[String]) -> Router {
    let limited = Router::new()
        .route("/join", post(join))
        .route("/submit-score", post(submit_score))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit));

    Router::new()
        .merge(limited)
        .route("/leaderboard/daily/total", get(daily_total))
        .route("/leaderboard/daily/high", get(daily_high))
        .route("/player/daily/:wallet", get(player_daily))
        .route("/payout/trigger", post(trigger_payout))
        .route("/health", get(health))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {origin:?}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(PAYMENT_RESPONSE_HEADER)])
}

#[derive(Debug)]
enum ApiError {
    Validation(ValidationError),
    Session(SessionError),
    Internal,
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Session(err) => ApiError::Session(err),
            GateError::Store(err) => {
                error!("Session verification error: {err}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(ValidationError::MissingSessionId) => {
                (StatusCode::BAD_REQUEST, "Missing sessionId")
            }
            ApiError::Validation(ValidationError::InvalidBody(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid wallet or score")
            }
            ApiError::Session(SessionError::NotFound) => (StatusCode::FORBIDDEN, "Invalid session ID"),
            ApiError::Session(SessionError::Unpaid) => (StatusCode::PAYMENT_REQUIRED, "Session not paid"),
            ApiError::Session(SessionError::DuplicateSubmission) => {
                (StatusCode::CONFLICT, "Score already submitted for this session")
            }
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn join(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let payment = headers.get(PAYMENT_HEADER).and_then(|v| v.to_str().ok());

    match state.payment.join(payment).await {
        Ok(admission) => {
            let mut response = Json(admission.response).into_response();
            if let Some(value) = admission
                .settlement
                .and_then(|s| HeaderValue::from_str(&s).ok())
            {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(PAYMENT_RESPONSE_HEADER), value);
            }
            response
        }
        Err(JoinError::Payment(PaymentError::Facilitator(detail))) => {
            error!("Payment facilitator error: {detail}");
            ApiError::Internal.into_response()
        }
        Err(JoinError::Payment(err)) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(state.payment.payment_required(&err)),
        )
            .into_response(),
        Err(JoinError::Store(err)) => {
            error!("Could not open session after payment: {err}");
            ApiError::Internal.into_response()
        }
    }
}

async fn daily_total(State(state): State<AppState>) -> Result<Json<LeaderboardData>, ApiError> {
    daily_leaderboard(&state, LeaderboardKind::Total).await
}

async fn daily_high(State(state): State<AppState>) -> Result<Json<LeaderboardData>, ApiError> {
    daily_leaderboard(&state, LeaderboardKind::High).await
}

async fn daily_leaderboard(
    state: &AppState,
    kind: LeaderboardKind,
) -> Result<Json<LeaderboardData>, ApiError> {
    state
        .leaderboard
        .get_daily_leaderboard(kind, None)
        .await
        .map(Json)
        .map_err(|err| {
            error!("Error fetching {kind:?} leaderboard: {err}");
            ApiError::Internal
        })
}

async fn player_daily(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<PlayerStats>, ApiError> {
    match state.leaderboard.get_daily_player_stats(&wallet).await {
        Ok(stats) => Ok(Json(stats.unwrap_or_else(|| PlayerStats::empty(wallet)))),
        Err(err) => {
            error!("Error fetching player stats: {err}");
            Err(ApiError::Internal)
        }
    }
}

/// Body of `POST /submit-score`: `{sessionId, wallet, score}`.
///
/// `score` must be a non-negative JSON integer; fractional, negative or
/// string scores are rejected with 400.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreSubmission {
    session_id: Option<String>,
    wallet: Option<String>,
    score: Option<Value>,
}

impl ScoreSubmission {
    fn session_id(&self) -> Result<&str, ValidationError> {
        self.session_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ValidationError::MissingSessionId)
    }

    fn entry(&self) -> Result<(String, u64), ValidationError> {
        let wallet = self
            .wallet
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| ValidationError::InvalidBody("wallet is required".into()))?;
        let score = self
            .score
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| ValidationError::InvalidBody("score must be a non-negative integer".into()))?;
        Ok((wallet.to_string(), score))
    }
}

/// Checks run in order: missing session id (400), session gate (403, 402,
/// 409), wallet and score (400), then the atomic consume. A malformed body
/// never consumes a session.
async fn submit_score(
    State(state): State<AppState>,
    body: Result<Json<ScoreSubmission>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) =
        body.map_err(|rejection| ApiError::Validation(ValidationError::InvalidBody(rejection.body_text())))?;
    let session_id = body.session_id().map_err(ApiError::Validation)?;

    state.sessions.check(session_id).await?;
    let (wallet, score) = body.entry().map_err(ApiError::Validation)?;
    state.sessions.admit(session_id).await?;

    let stats = state.scores.record_score(&wallet, score).await.map_err(|err| {
        error!("Session {session_id} admitted but score was not recorded: {err}");
        ApiError::Internal
    })?;

    Ok(Json(json!({ "success": true, "stats": stats })))
}

async fn trigger_payout(State(state): State<AppState>) -> Response {
    let Some(payout) = &state.payout else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "Payouts are not configured" })),
        )
            .into_response();
    };

    match payout.trigger().await {
        Ok(outcome) => Json(json!({ "success": true, "outcome": outcome })).into_response(),
        // Already logged in full by the service.
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Payout cycle failed" })),
        )
            .into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(json!({ "status": "ok" })),
    )
}
