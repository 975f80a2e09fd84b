//! HTTP surface.
//!
//! `POST /api/RequestAccess` issues a grant; `GET /health` reports liveness
//! and the last reclaim scan.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::watch;

use jit_access::time::to_rfc3339;
use jit_access::{AccessError, GrantIssuer, ScanReport};

pub const REQUEST_ACCESS_PATH: &str = "/api/RequestAccess";
pub const HEALTH_PATH: &str = "/health";

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<GrantIssuer>,
    pub last_scan: watch::Receiver<Option<ScanReport>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(REQUEST_ACCESS_PATH, post(request_access))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

pub async fn request_access(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let caller = caller_address(&headers, peer);
    tracing::info!(%caller, "processing access request");

    match state.issuer.handle_body(&body, Some(caller)).await {
        Ok(grant) => (
            StatusCode::OK,
            Json(json!({
                "status": grant.status,
                "expires": to_rfc3339(grant.expires),
                "rule": grant.rule,
                "subject": grant.subject,
            })),
        ),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "access request failed");
            } else {
                tracing::info!(error = %e, "access request rejected");
            }
            (
                status,
                Json(json!({"status": e.status(), "error": e.to_string()})),
            )
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let last_scan = state.last_scan.borrow().clone();
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "last_scan": last_scan})),
    )
}

fn status_for(err: &AccessError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// The first `X-Forwarded-For` hop, or the TCP peer.
///
/// Proxies in front of hosted functions append `:port` to the address, so
/// both `a.b.c.d` and `a.b.c.d:port` forms are accepted.
pub fn caller_address(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .and_then(|hop| {
            hop.parse::<SocketAddr>()
                .map(|s| s.ip())
                .or_else(|_| hop.parse::<IpAddr>())
                .ok()
        })
        .unwrap_or_else(|| peer.ip())
        .to_canonical()
}
