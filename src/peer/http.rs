//! HTTP API for the lock peer daemon

use crate::common::{validate_path, Error};
use crate::peer::table::LockTable;
use crate::peer::wire::*;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Lock requests are small JSON bodies; anything bigger is a client bug.
const MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct PeerState {
    pub table: Arc<LockTable>,
    pub started: Instant,
    pub max_ttl: Duration,
}

pub fn create_router(state: PeerState) -> Router {
    Router::new()
        .route("/v1/acquire", axum::routing::post(acquire))
        .route("/v1/release", axum::routing::post(release))
        .route("/v1/release-session", axum::routing::post(release_session))
        .route("/v1/locks", axum::routing::get(list_locks))
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn bad_request(msg: String) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: msg,
            path: None,
        }),
    )
        .into_response()
}

async fn acquire(
    State(state): State<PeerState>,
    Json(req): Json<AcquireRequest>,
) -> impl IntoResponse {
    if req.paths.is_empty() {
        return bad_request("no paths given".into());
    }
    for path in &req.paths {
        if let Err(e) = validate_path(path) {
            return bad_request(e.to_string());
        }
    }

    // A requested TTL of 0 means "peer default"; never exceed the cap.
    let ttl_secs = match req.ttl_secs {
        0 => state.max_ttl.as_secs(),
        secs => secs.min(state.max_ttl.as_secs()),
    };

    match state.table.acquire(
        &req.session,
        req.lock_type,
        &req.paths,
        Duration::from_secs(ttl_secs),
    ) {
        Ok(acquired) => {
            tracing::debug!(
                session = %req.session,
                lock_type = %req.lock_type,
                acquired,
                "locks acquired"
            );
            (StatusCode::OK, Json(AcquireResponse { acquired })).into_response()
        }
        Err(Error::LockConflict { path }) => (
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: format!("lock conflict on '{}'", path),
                path: Some(path),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: e.to_string(),
                path: None,
            }),
        )
            .into_response(),
    }
}

async fn release(
    State(state): State<PeerState>,
    Json(req): Json<ReleaseRequest>,
) -> impl IntoResponse {
    let released = state.table.release(&req.session, req.lock_type, &req.paths);
    tracing::debug!(session = %req.session, released, "locks released");
    (StatusCode::OK, Json(ReleaseResponse { released }))
}

async fn release_session(
    State(state): State<PeerState>,
    Json(req): Json<ReleaseSessionRequest>,
) -> impl IntoResponse {
    let released = state.table.release_session(&req.session);
    if released > 0 {
        tracing::info!(session = %req.session, released, "session cleared");
    }
    (StatusCode::OK, Json(ReleaseResponse { released }))
}

async fn list_locks(State(state): State<PeerState>) -> impl IntoResponse {
    Json(LocksResponse {
        locks: state.table.snapshot(),
    })
}

async fn health(State(state): State<PeerState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        locks_held: state.table.locks_held(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
