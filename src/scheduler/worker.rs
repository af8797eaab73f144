//! The only path from a request handler to the inference engine.
//!
//! A request first acquires an execution permit from the admission
//! scheduler. Once admitted, the engine call runs on its own task holding the
//! permit, so a caller that gives up does not cancel work the engine has
//! already started; the slot is released when that work finishes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;

use super::admission::{Admission, AdmissionError, AdmissionRequest, AdmissionScheduler};
use crate::engine::{EngineError, InferenceEngine, InferenceTask};
use crate::telemetry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("request exceeded its {}ms budget", .0.as_millis())]
    Timeout(Duration),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Outcome of a gated engine call.
#[derive(Debug, Clone)]
pub struct GateOutput {
    pub value: Value,
    pub queue_wait: Duration,
    pub processing: Duration,
}

/// Admission-guarded access to an [`InferenceEngine`].
#[derive(Clone)]
pub struct InferenceGate {
    scheduler: AdmissionScheduler,
    engine: Arc<dyn InferenceEngine>,
}

impl InferenceGate {
    pub fn new(scheduler: AdmissionScheduler, engine: Arc<dyn InferenceEngine>) -> Self {
        Self { scheduler, engine }
    }

    pub fn scheduler(&self) -> &AdmissionScheduler {
        &self.scheduler
    }

    pub fn model_type(&self) -> &str {
        self.engine.model_type()
    }

    pub fn mode(&self) -> crate::station::StationMode {
        self.engine.mode()
    }

    /// Acquire a slot and run `task` on the engine.
    ///
    /// `budget` bounds the total time the caller waits, queueing included.
    pub async fn run(
        &self,
        request: AdmissionRequest,
        task: InferenceTask,
        budget: Duration,
    ) -> Result<GateOutput, GateError> {
        let submitted_at = Instant::now();
        let request_id = request.id;

        let (permit, queue_wait) = match self.scheduler.submit(request)? {
            Admission::Admitted(permit) => (permit, Duration::ZERO),
            Admission::Queued(ticket) => match tokio::time::timeout(budget, ticket.wait()).await {
                Ok(result) => {
                    let permit = result?;
                    let waited = permit.admitted_at().saturating_duration_since(submitted_at);
                    (permit, waited)
                }
                Err(_) => {
                    tracing::warn!(
                        request_id = %request_id,
                        budget_ms = budget.as_millis() as u64,
                        "request timed out waiting for admission"
                    );
                    return Err(GateError::Timeout(budget));
                }
            },
        };

        let engine = Arc::clone(&self.engine);
        let scheduler = self.scheduler.clone();
        let kind = task.kind().to_string();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();
            let result = engine.infer(task).await;
            let elapsed = started.elapsed();
            match &result {
                Ok(_) => {
                    scheduler.stats().record_completed(elapsed);
                    telemetry::record_engine_success(&kind, elapsed);
                }
                Err(e) => {
                    scheduler.stats().record_failed();
                    telemetry::record_engine_failure(&kind);
                    tracing::error!(request_id = %request_id, kind = %kind, error = %e, "engine call failed");
                }
            }
            result.map(|value| (value, elapsed))
        });

        let remaining = budget.saturating_sub(submitted_at.elapsed());
        match tokio::time::timeout(remaining, handle).await {
            Ok(Ok(result)) => {
                let (value, processing) = result?;
                Ok(GateOutput {
                    value,
                    queue_wait,
                    processing,
                })
            }
            Ok(Err(join)) => Err(GateError::Engine(EngineError::ModelError(format!(
                "engine task aborted: {join}"
            )))),
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    budget_ms = budget.as_millis() as u64,
                    "request budget elapsed while executing; engine work continues"
                );
                Err(GateError::Timeout(budget))
            }
        }
    }
}
