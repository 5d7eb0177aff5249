//! HTTP Endpoints
//!
//! The three request/response endpoints of the channel (APP, UIDL,
//! HEARTBEAT), the published-file path, and the monitoring routes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use uplink_core::protocol::constants::{
    APP_PATH, CONTENT_TYPE_TEXT_HTML_UTF_8, CSRF_TOKEN_PARAMETER, HEARTBEAT_PATH,
    PUSH_ID_PARAMETER, UIDL_PATH, UIDL_SECURITY_TOKEN_HEADER, URL_PARAMETER_REPAINT_ALL,
    WIDGETSET_VERSION_ID,
};
use uplink_core::{
    encode_delta, DeliveryChannel, EngineError, ResourceResolver, SessionId, SyncEngine,
};

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use crate::push::PushManager;

/// Shared state for all transport handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub push: Arc<PushManager>,
    pub resolver: ResourceResolver,
    pub metrics: ServerMetrics,
    pub config: ServerConfig,
    pub start_time: Instant,
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

/// Creates the router binding the channel endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(&format!("/{APP_PATH}"), get(app_shell_handler).post(bootstrap_handler))
        .route(&format!("/{APP_PATH}/PUBLISHED/*path"), get(published_handler))
        .route(&format!("/{UIDL_PATH}"), post(uidl_handler))
        .route(&format!("/{HEARTBEAT_PATH}"), post(heartbeat_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/", get(root_handler))
        .with_state(state)
}

/// Maps engine failures to wire status codes. Malformed input is the
/// client's fault, ordering gaps conflict with session state, security
/// rejections are forbidden, and a missing session is simply gone.
fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Protocol(_) => StatusCode::BAD_REQUEST,
        EngineError::Security(_) => StatusCode::FORBIDDEN,
        EngineError::ClientOrdering(_) => StatusCode::CONFLICT,
        EngineError::Session(_) => StatusCode::NOT_FOUND,
    }
}

fn session_param(params: &HashMap<String, String>) -> Result<SessionId, Response> {
    params
        .get("sessionId")
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| {
            (StatusCode::BAD_REQUEST, "missing or malformed sessionId").into_response()
        })
}

/// GET APP - minimal bootstrap shell, served as UTF-8 HTML.
async fn app_shell_handler() -> impl IntoResponse {
    let html = concat!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
        "<title>Uplink</title></head><body></body></html>"
    );
    ([(header::CONTENT_TYPE, CONTENT_TYPE_TEXT_HTML_UTF_8)], html)
}

/// POST APP - bootstraps a session and issues its tokens.
///
/// A malformed request never creates a session; the widget set version
/// check is informative only.
async fn bootstrap_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.metrics.requests.with_label_values(&[APP_PATH]).inc();

    let reported_wsver = params.get(WIDGETSET_VERSION_ID).cloned();
    let widgetset_compatible = match &reported_wsver {
        Some(reported) => {
            let compatible = *reported == state.config.widgetset_version;
            if !compatible {
                warn!(
                    client = %reported,
                    server = %state.config.widgetset_version,
                    "widget set version mismatch"
                );
            }
            compatible
        }
        None => true,
    };

    let info = state.engine.bootstrap(reported_wsver);
    state
        .metrics
        .sessions_active
        .set(state.engine.registry().len() as i64);

    Json(json!({
        "sessionId": info.session_id,
        CSRF_TOKEN_PARAMETER: info.csrf_token,
        PUSH_ID_PARAMETER: info.push_id,
        "widgetsetCompatible": widgetset_compatible,
    }))
    .into_response()
}

/// POST UIDL - RPC batch in, delta (or ack) out. The security key may
/// ride in the request header instead of the batch body.
async fn uidl_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.metrics.requests.with_label_values(&[UIDL_PATH]).inc();

    let session = match session_param(&params) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let header_token = headers
        .get(UIDL_SECURITY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let ack = match state
        .engine
        .receive_with_header_token(session, &body, header_token)
    {
        Ok(ack) => ack,
        Err(err) => {
            state.metrics.rejected_batches.inc();
            return (status_for(&err), err.to_string()).into_response();
        }
    };

    // The URL parameter forces a full resync regardless of batch content.
    if params.contains_key(URL_PARAMETER_REPAINT_ALL) {
        if state.engine.resynchronize(session).is_ok() {
            state.metrics.resyncs.inc();
        }
    }

    // Prefer the push channel when one is bound; the delivery claim
    // guarantees the delta goes out on exactly one of the two.
    if state.push.is_connected(session) {
        deliver_via_push(&state, session);
    }

    match state.engine.claim_delivery(session, DeliveryChannel::Polling) {
        Ok(Some(delta)) => match encode_delta(&delta, None, &state.resolver) {
            Ok(bytes) => json_bytes(bytes),
            Err(err) => {
                state.engine.release_delivery(session).ok();
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        },
        // Delivered on push (or nothing pending): acknowledge only.
        Ok(None) => Json(ack).into_response(),
        Err(err) => (status_for(&err), err.to_string()).into_response(),
    }
}

/// Attempts push delivery of the session's pending delta.
fn deliver_via_push(state: &AppState, session: SessionId) {
    let Ok(Some(delta)) = state.engine.claim_delivery(session, DeliveryChannel::Push) else {
        return;
    };
    let frame = match encode_delta(&delta, None, &state.resolver) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            warn!(%session, error = %err, "delta encode failed");
            state.engine.release_delivery(session).ok();
            return;
        }
    };
    if state
        .push
        .send(session, tokio_tungstenite::tungstenite::Message::Text(frame))
        .is_err()
    {
        // Connection died under us: release the claim so this very
        // request's polling path (or the next one) delivers the delta.
        state.engine.push_disconnected(session);
    }
}

/// POST HEARTBEAT - liveness only.
async fn heartbeat_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state
        .metrics
        .requests
        .with_label_values(&[HEARTBEAT_PATH])
        .inc();

    let session = match session_param(&params) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.engine.heartbeat(session) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => (status_for(&err), err.to_string()).into_response(),
    }
}

/// GET APP/PUBLISHED/<path> - the path is part of the wire contract;
/// file bodies are deployment-provided.
async fn published_handler(Path(path): Path<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("published file {path:?} is not mounted"),
    )
        .into_response()
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "uplink-server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            format!("/{APP_PATH}"),
            format!("/{UIDL_PATH}"),
            format!("/{HEARTBEAT_PATH}"),
            "/health", "/ready", "/metrics",
        ],
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "ready": true,
        "sessions": state.engine.registry().len(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state
        .metrics
        .sessions_active
        .set(state.engine.registry().len() as i64);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}

fn json_bytes(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        bytes,
    )
        .into_response()
}
