//! REST API Server
//!
//! Hosts the orchestrator behind two endpoints: a liveness probe and the
//! chat entrypoint. Payloads are plain text in, text out; the envelope only
//! adds success/error bookkeeping.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Session Id Resolution
/// =============================

/// An explicit session id wins; otherwise derive a stable id from the user
/// id so one user keeps one conversation; otherwise mint a fresh one.
fn resolve_session_id(session_id: Option<&str>, user_id: Option<&str>) -> String {
    if let Some(id) = session_id.map(str::trim).filter(|s| !s.is_empty()) {
        return id.to_string();
    }
    if let Some(user) = user_id.map(str::trim).filter(|s| !s.is_empty()) {
        return stable_session_id(user);
    }
    format!("session-{}", uuid::Uuid::new_v4())
}

fn stable_session_id(seed: &str) -> String {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    format!("session-{}", uuid::Uuid::from_bytes(bytes))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let workers: Vec<String> = state
        .orchestrator
        .worker_kinds()
        .iter()
        .map(|k| k.to_string())
        .collect();

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "workers": workers,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = resolve_session_id(req.session_id.as_deref(), req.user_id.as_deref());

    match state.orchestrator.handle(&session_id, &req.query).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "response": result.answer,
                "session_id": session_id,
                "routing": result.turn.decision.to_string(),
            }))),
        ),
        Err(OrchestratorError::InvalidQuery(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(reason)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Request failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Background eviction keeps idle sessions from accumulating
    let store = orchestrator.session_store();
    let idle_timeout = orchestrator.config().session_idle_timeout;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            match store.evict_idle(idle_timeout).await {
                Ok(evicted) if evicted > 0 => info!(evicted, "Evicted idle sessions"),
                Ok(_) => {}
                Err(e) => warn!("Session eviction failed: {}", e),
            }
        }
    });

    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_resolution() {
        assert_eq!(
            resolve_session_id(Some("explicit"), Some("user-1")),
            "explicit"
        );

        // Same user always maps to the same session
        let a = resolve_session_id(None, Some("user-1"));
        let b = resolve_session_id(None, Some("user-1"));
        assert_eq!(a, b);
        assert!(a.starts_with("session-"));

        // No identifiers at all: fresh sessions
        let fresh_a = resolve_session_id(None, None);
        let fresh_b = resolve_session_id(None, None);
        assert_ne!(fresh_a, fresh_b);
    }
}
