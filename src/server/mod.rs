//! Station HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/status` | Mode, capabilities, uptime, and queue state |
//! | `POST` | `/api/vision/{ocr,document,medical}` | Image analysis |
//! | `POST` | `/api/multimodal/chat` | Text with an optional image |
//! | `POST` | `/api/{translate,chat,...}` | Text-only operations |
//!
//! Every inference request passes through the admission scheduler before it
//! reaches the engine.

mod error;
mod request;

pub use error::ApiError;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::client::RequestClass;
use crate::config::{DeploymentTier, ServerConfig};
use crate::engine::InferenceEngine;
use crate::health::HealthChecker;
use crate::scheduler::{AdmissionError, AdmissionRequest, AdmissionScheduler, InferenceGate};
use crate::shutdown::{ShutdownCoordinator, ShutdownResult};
use crate::station::STATUS_PATH;
use crate::telemetry::{RequestSpan, SpanExt};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    gate: InferenceGate,
    shutdown: ShutdownCoordinator,
    health: Arc<HealthChecker>,
    tier: DeploymentTier,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(config: &ServerConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        let scheduler = AdmissionScheduler::new(config.admission.clone());
        Self {
            gate: InferenceGate::new(scheduler, engine),
            shutdown: ShutdownCoordinator::new(),
            health: Arc::new(HealthChecker::new()),
            tier: config.tier,
            request_timeout: config.request_timeout,
        }
    }

    pub fn scheduler(&self) -> &AdmissionScheduler {
        self.gate.scheduler()
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new().route(STATUS_PATH, get(status_handler));
    for class in RequestClass::ALL {
        app = app.route(
            class.path(),
            post(move |State(state): State<AppState>, headers: HeaderMap, body: Bytes| {
                infer_handler(state, class, headers, body)
            }),
        );
    }
    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct StationServer {
    state: AppState,
    shutdown_timeout: Duration,
}

impl StationServer {
    pub fn new(config: &ServerConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            state: AppState::new(config, engine),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    ///
    /// After the drain completes or times out the scheduler is closed, which
    /// fails any request still queued with `SHUTTING_DOWN`.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = self.state.clone();
        let timeout = self.shutdown_timeout;
        let local = listener.local_addr()?;
        tracing::info!(
            addr = %local,
            tier = %state.tier,
            mode = %state.gate.mode(),
            max_concurrent = state.scheduler().config().max_concurrent,
            max_queue_size = state.scheduler().config().max_queue_size,
            overflow_policy = %state.scheduler().config().overflow_policy,
            "station server listening"
        );

        let drain = async move {
            signal.await;
            tracing::info!("shutdown signal received");
            match state.shutdown.initiate(timeout).await {
                ShutdownResult::Complete => tracing::info!("all in-flight requests completed"),
                ShutdownResult::Timeout { remaining } => {
                    tracing::warn!(remaining, "shutdown timed out with requests still in flight")
                }
            }
            state.scheduler().close();
        };

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(drain)
            .await
    }
}

/// `GET /api/status`
async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    let queue = state.scheduler().snapshot();
    let health = state.health.state(state.shutdown.state(), &queue);
    Json(json!({
        "status": health.status_label(),
        "health": health,
        "mode": state.gate.mode(),
        "tier": state.tier,
        "multimodal_enabled": true,
        "vision_processing": true,
        "model_type": state.gate.model_type(),
        "uptime_seconds": state.health.uptime_seconds(),
        "capabilities": {
            "vision": true,
            "multimodal": true,
            "max_concurrent": queue.max_concurrent,
            "queue_size": queue.max_size,
        },
        "queue": queue,
    }))
}

async fn infer_handler(
    state: AppState,
    class: RequestClass,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(_guard) = state.shutdown.track() else {
        return Err(AdmissionError::ShuttingDown.into());
    };

    let payload = request::parse_body(&body)?;
    let priority = request::priority(class, &headers, &payload);
    let admission = AdmissionRequest::new(priority, class.as_str());
    let admission = match request_id(&headers) {
        Some(id) => admission.with_id(id),
        None => admission,
    };

    let span = RequestSpan::station(&admission.id.to_string(), class.as_str(), priority.as_str());
    let task = request::task(class, payload)?;
    let result = state
        .gate
        .run(admission, task, state.request_timeout)
        .instrument(span.clone())
        .await;
    span.record_result(&result);
    if let Ok(output) = &result {
        span.record("queue_wait_ms", output.queue_wait.as_millis() as u64);
        span.record("latency_ms", (output.queue_wait + output.processing).as_millis() as u64);
    }
    let output = result?;

    let mut value = output.value;
    if let Value::Object(map) = &mut value {
        map.entry("success").or_insert(Value::Bool(true));
        map.insert("mode".into(), json!(state.gate.mode()));
        map.insert("processing_time_ms".into(), json!(output.processing.as_millis() as u64));
        map.insert("queue_time_ms".into(), json!(output.queue_wait.as_millis() as u64));
    }
    Ok(Json(value))
}

fn request_id(headers: &HeaderMap) -> Option<uuid::Uuid> {
    headers
        .get(crate::client::HEADER_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
