use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, Command, ErrorCode, Event, EventType, QueryResponse, SessionConfig, SessionStatus,
    Snapshot, SCHEMA_VERSION_V1,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};

use crate::subscription::{SqlitePlanSource, SubscriptionContext};
use crate::{PersistedCommandEntry, PersistenceError, SessionApi};

const DEFAULT_PAGE_SIZE: usize = 500;
const MAX_PAGE_SIZE: usize = 5000;
const DEFAULT_SQLITE_PATH: &str = "game_runs.sqlite";

include!("error.rs");
include!("state.rs");
include!("routes/control.rs");
include!("routes/query.rs");
include!("routes/stream.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr) -> Result<(), ServerError> {
    let state = AppState::new();
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sessions", post(create_session).get(list_sessions))
        .route("/api/v1/sessions/{session_id}/start", post(start_session))
        .route("/api/v1/sessions/{session_id}/pause", post(pause_session))
        .route("/api/v1/sessions/{session_id}/step", post(step_session))
        .route(
            "/api/v1/sessions/{session_id}/run_to_tick",
            post(run_to_tick),
        )
        .route("/api/v1/sessions/{session_id}/select", post(select_option))
        .route("/api/v1/sessions/{session_id}/reset", post(reset_session))
        .route(
            "/api/v1/sessions/{session_id}/commands",
            post(submit_command).get(get_commands),
        )
        .route("/api/v1/sessions/{session_id}/status", get(get_status))
        .route("/api/v1/sessions/{session_id}/shell", get(get_shell))
        .route("/api/v1/sessions/{session_id}/timeline", get(get_timeline))
        .route("/api/v1/sessions/{session_id}/snapshot", get(get_snapshot))
        .route(
            "/api/v1/sessions/{session_id}/completion",
            get(get_completion),
        )
        .route("/api/v1/sessions/{session_id}/stream", get(stream_session))
        .route("/api/v1/catalog", get(get_catalog))
        .route("/api/v1/catalog/{game_id}", get(get_catalog_game))
        .route("/api/v1/subscription/{user_id}", get(get_subscription))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
