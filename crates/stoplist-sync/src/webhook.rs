//! # Webhook Listener
//!
//! HTTP endpoint the provider pushes events to. A `StopListUpdate` event
//! queues a sync; everything else is acknowledged and ignored.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET  /          liveness  → {"status":"ok","info":"..."}               │
//! │                                                                         │
//! │  POST /webhook   [ { "eventType": "StopListUpdate", ... }, ... ]        │
//! │                    │                                                    │
//! │                    ├─ any StopListUpdate → Trigger::Sync, "ok"          │
//! │                    ├─ none               → "ignored"                    │
//! │                    ├─ body not JSON      → 400                          │
//! │                    └─ agent gone         → 503                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::Trigger;
use crate::config::WebhookSettings;
use crate::error::{SyncError, SyncResult};

/// Provider event type that means the stop list changed.
pub const STOP_LIST_UPDATE_EVENT: &str = "StopListUpdate";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct WebhookState {
    trigger_tx: mpsc::Sender<Trigger>,
}

/// Builds the webhook router.
pub fn router(trigger_tx: mpsc::Sender<Trigger>) -> Router {
    Router::new()
        .route("/", get(liveness_handler))
        .route("/webhook", post(webhook_handler))
        .with_state(WebhookState { trigger_tx })
}

/// True if the payload is an event list containing a stop-list update.
pub fn has_stop_list_update(payload: &Value) -> bool {
    payload.as_array().is_some_and(|events| {
        events
            .iter()
            .any(|event| event.get("eventType").and_then(Value::as_str) == Some(STOP_LIST_UPDATE_EVENT))
    })
}

async fn liveness_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "info": "Webhook listener is alive" }))
}

/// The body is parsed as JSON whatever `Content-Type` the sender set.
async fn webhook_handler(
    State(state): State<WebhookState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Webhook body is not valid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "detail": "Body is not valid JSON" })),
            );
        }
    };

    if !has_stop_list_update(&payload) {
        debug!("Webhook without stop-list update, ignoring");
        return (
            StatusCode::OK,
            Json(json!({ "status": "ignored", "detail": "No StopListUpdate event in payload" })),
        );
    }

    match state.trigger_tx.try_send(Trigger::Sync) {
        Ok(()) => info!("Stop-list update received, sync queued"),
        // A queued sync will read the latest stop list anyway.
        Err(TrySendError::Full(_)) => debug!("Trigger queue full, sync already pending"),
        Err(TrySendError::Closed(_)) => {
            warn!("Stop-list update received but the agent is not running");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "detail": "Sync agent is not running" })),
            );
        }
    }

    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "detail": "Stop list update task started" })),
    )
}

// =============================================================================
// Server
// =============================================================================

/// Webhook HTTP server.
pub struct WebhookServer {
    settings: WebhookSettings,
    trigger_tx: mpsc::Sender<Trigger>,
}

/// Handle for a running webhook server.
#[derive(Debug)]
pub struct WebhookHandle {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WebhookHandle {
    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting requests and waits for in-flight ones to finish.
    pub async fn shutdown(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Webhook shutdown channel closed".into()))?;
        self.task
            .await
            .map_err(|e| SyncError::ChannelError(format!("Webhook task failed: {}", e)))
    }
}

impl WebhookServer {
    pub fn new(settings: WebhookSettings, trigger_tx: mpsc::Sender<Trigger>) -> Self {
        WebhookServer {
            settings,
            trigger_tx,
        }
    }

    /// Binds the listener and serves in the background.
    pub async fn start(self) -> SyncResult<WebhookHandle> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let app = router(self.trigger_tx);

        let bind_addr = self.settings.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| SyncError::BindFailed {
                addr: bind_addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| SyncError::BindFailed {
            addr: bind_addr.clone(),
            reason: e.to_string(),
        })?;

        info!(addr = %local_addr, "Webhook listener started");

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await;
                    info!("Webhook listener shutting down");
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "Webhook listener exited with error");
            }
        });

        Ok(WebhookHandle {
            local_addr,
            shutdown_tx,
            task,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
