//! Bounded priority admission control.
//!
//! All admission state (executing count and queue contents) lives behind a
//! single mutex. Every decision that reads or changes it happens inside one
//! critical section, so concurrent submissions cannot race the limits.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::priority::{PriorityClass, PriorityQueue};
use super::stats::{QueueStats, QueueStatsSnapshot};
use crate::telemetry;

/// What to do with an arrival when the queue is already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the arrival.
    Reject,
    /// Evict the oldest queued entry regardless of priority.
    DropOldest,
    /// Evict the lowest-priority queued entry if the arrival outranks it.
    DropLowestPriority,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::DropLowestPriority
    }
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::DropOldest => "drop_oldest",
            Self::DropLowestPriority => "drop_lowest_priority",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_lowest_priority" => Ok(Self::DropLowestPriority),
            other => Err(format!("unknown overflow policy: {other}")),
        }
    }
}

/// Configuration for the admission scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Maximum requests executing on the engine at once.
    pub max_concurrent: usize,
    /// Maximum requests waiting for a slot.
    pub max_queue_size: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_queue_size: 50,
            overflow_policy: OverflowPolicy::DropLowestPriority,
        }
    }
}

/// Terminal admission outcomes for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("admission rejected: queue full and {priority} does not outrank queued work")]
    Rejected { priority: PriorityClass },

    #[error("dropped from queue by a higher-priority arrival")]
    OverflowDropped,

    #[error("scheduler is shutting down")]
    ShuttingDown,
}

/// Identity of a request as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub id: Uuid,
    pub priority: PriorityClass,
    /// Endpoint or task name, for logs and status.
    pub kind: String,
}

impl AdmissionRequest {
    pub fn new(priority: PriorityClass, kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
            kind: kind.into(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }
}

type Waiter = oneshot::Sender<Result<ExecutionPermit, AdmissionError>>;

struct QueueEntry {
    request: AdmissionRequest,
    enqueued_at: Instant,
    waiter: Waiter,
}

struct AdmissionState {
    executing: usize,
    queue: PriorityQueue<QueueEntry>,
    closed: bool,
}

/// A request currently holding an execution slot.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveExecution {
    pub id: Uuid,
    pub kind: String,
    pub priority: PriorityClass,
    #[serde(skip)]
    pub admitted_at: Instant,
}

struct SchedulerInner {
    config: AdmissionConfig,
    state: Mutex<AdmissionState>,
    stats: QueueStats,
    active: DashMap<Uuid, ActiveExecution>,
}

/// Result of a submission that was not rejected.
pub enum Admission {
    /// A slot was free; execution may begin now.
    Admitted(ExecutionPermit),
    /// Waiting for a slot.
    Queued(QueuedAdmission),
}

/// Handle for a request waiting in the queue.
///
/// Dropping it abandons the wait; the entry is skipped when its turn comes.
pub struct QueuedAdmission {
    id: Uuid,
    priority: PriorityClass,
    rx: oneshot::Receiver<Result<ExecutionPermit, AdmissionError>>,
}

impl QueuedAdmission {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn priority(&self) -> PriorityClass {
        self.priority
    }

    /// Wait until admitted, dropped, or the scheduler shuts down.
    pub async fn wait(self) -> Result<ExecutionPermit, AdmissionError> {
        self.rx.await.unwrap_or(Err(AdmissionError::ShuttingDown))
    }
}

/// RAII execution slot. Dropping it frees the slot and admits the next
/// eligible queued request in the same critical section.
pub struct ExecutionPermit {
    id: Uuid,
    priority: PriorityClass,
    admitted_at: Instant,
    inner: Option<Arc<SchedulerInner>>,
}

impl ExecutionPermit {
    fn issue(inner: &Arc<SchedulerInner>, request: &AdmissionRequest) -> Self {
        let admitted_at = Instant::now();
        inner.active.insert(
            request.id,
            ActiveExecution {
                id: request.id,
                kind: request.kind.clone(),
                priority: request.priority,
                admitted_at,
            },
        );
        Self {
            id: request.id,
            priority: request.priority,
            admitted_at,
            inner: Some(Arc::clone(inner)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn priority(&self) -> PriorityClass {
        self.priority
    }

    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    /// Detach without releasing; the caller keeps ownership of the slot.
    fn disarm(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.active.remove(&self.id);
        }
    }
}

impl fmt::Debug for ExecutionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPermit")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish()
    }
}

impl Drop for ExecutionPermit {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.active.remove(&self.id);
            release_slot(&inner);
        }
    }
}

/// Hand a freed slot to the next queued request, or give it back.
///
/// Loops instead of recursing when the chosen waiter has already gone away.
fn release_slot(inner: &Arc<SchedulerInner>) {
    loop {
        let next = {
            let mut state = inner.state.lock();
            match state.queue.pop() {
                Some((_, entry)) => Some(entry),
                None => {
                    state.executing = state.executing.saturating_sub(1);
                    telemetry::record_executing(state.executing);
                    None
                }
            }
        };
        let Some(entry) = next else { return };
        telemetry::record_queue_depth(inner.state.lock().queue.len());

        let wait = entry.enqueued_at.elapsed();
        let permit = ExecutionPermit::issue(inner, &entry.request);
        match entry.waiter.send(Ok(permit)) {
            Ok(()) => {
                inner.stats.record_admitted();
                inner.stats.record_queue_wait(wait);
                tracing::debug!(
                    request_id = %entry.request.id,
                    priority = %entry.request.priority,
                    wait_ms = wait.as_millis() as u64,
                    "admitted from queue"
                );
                return;
            }
            Err(returned) => {
                inner.stats.record_abandoned(1);
                if let Ok(permit) = returned {
                    permit.disarm();
                }
            }
        }
    }
}

/// Snapshot of scheduler occupancy and statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub queue_size: usize,
    pub processing: usize,
    pub max_size: usize,
    pub max_concurrent: usize,
    pub overflow_policy: OverflowPolicy,
    pub queued: Vec<QueuedSummary>,
    pub active: Vec<ActiveExecution>,
    pub stats: QueueStatsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedSummary {
    pub id: Uuid,
    pub kind: String,
    pub priority: PriorityClass,
    pub waited_ms: u64,
}

/// Gatekeeper for the inference engine's limited concurrency.
#[derive(Clone)]
pub struct AdmissionScheduler {
    inner: Arc<SchedulerInner>,
}

impl AdmissionScheduler {
    pub fn new(config: AdmissionConfig) -> Self {
        tracing::info!(
            max_concurrent = config.max_concurrent,
            max_queue_size = config.max_queue_size,
            overflow_policy = %config.overflow_policy,
            "admission scheduler initialized"
        );
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: Mutex::new(AdmissionState {
                    executing: 0,
                    queue: PriorityQueue::new(),
                    closed: false,
                }),
                stats: QueueStats::new(),
                active: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.inner.config
    }

    /// Decide admission for a request: execute now, queue, or reject.
    ///
    /// When the queue is full the overflow policy decides whether a queued
    /// entry is evicted; an evicted entry's waiter receives
    /// [`AdmissionError::OverflowDropped`].
    pub fn submit(&self, request: AdmissionRequest) -> Result<Admission, AdmissionError> {
        let inner = &self.inner;
        let config = &inner.config;
        inner.stats.record_submitted(request.priority);

        let mut evicted: Option<QueueEntry> = None;
        let decision = {
            let mut state = inner.state.lock();
            if state.closed {
                return Err(AdmissionError::ShuttingDown);
            }

            let abandoned = state.queue.retain(|e| !e.waiter.is_closed());
            if abandoned > 0 {
                inner.stats.record_abandoned(abandoned as u64);
            }

            if state.executing < config.max_concurrent {
                state.executing += 1;
                telemetry::record_executing(state.executing);
                Ok(Admission::Admitted(ExecutionPermit::issue(inner, &request)))
            } else if state.queue.len() < config.max_queue_size {
                Ok(Self::enqueue(&mut state, request))
            } else {
                let victim = match config.overflow_policy {
                    OverflowPolicy::Reject => None,
                    OverflowPolicy::DropOldest => state.queue.pop_oldest(),
                    OverflowPolicy::DropLowestPriority => match state.queue.lowest_priority() {
                        Some(lowest) if request.priority > lowest => state.queue.pop_lowest(),
                        _ => None,
                    },
                };
                match victim {
                    Some((_, entry)) => {
                        evicted = Some(entry);
                        Ok(Self::enqueue(&mut state, request))
                    }
                    None => Err(AdmissionError::Rejected { priority: request.priority }),
                }
            }
        };

        if let Some(entry) = evicted {
            inner.stats.record_dropped();
            telemetry::record_admission("dropped", entry.request.priority);
            tracing::warn!(
                request_id = %entry.request.id,
                priority = %entry.request.priority,
                kind = %entry.request.kind,
                "queued request dropped by higher-priority arrival"
            );
            let _ = entry.waiter.send(Err(AdmissionError::OverflowDropped));
        }

        match &decision {
            Ok(Admission::Admitted(permit)) => {
                inner.stats.record_admitted();
                telemetry::record_admission("admitted", permit.priority());
            }
            Ok(Admission::Queued(ticket)) => {
                inner.stats.record_queued();
                telemetry::record_admission("queued", ticket.priority());
                telemetry::record_queue_depth(self.queue_len());
            }
            Err(AdmissionError::Rejected { priority }) => {
                inner.stats.record_rejected();
                telemetry::record_admission("rejected", *priority);
                tracing::warn!(priority = %priority, "queue full, request rejected");
            }
            Err(_) => {}
        }
        decision
    }

    fn enqueue(state: &mut AdmissionState, request: AdmissionRequest) -> Admission {
        let (tx, rx) = oneshot::channel();
        let id = request.id;
        let priority = request.priority;
        state.queue.push(
            QueueEntry {
                request,
                enqueued_at: Instant::now(),
                waiter: tx,
            },
            priority,
        );
        Admission::Queued(QueuedAdmission { id, priority, rx })
    }

    /// Submit and wait until the request holds an execution slot.
    pub async fn acquire(&self, request: AdmissionRequest) -> Result<ExecutionPermit, AdmissionError> {
        match self.submit(request)? {
            Admission::Admitted(permit) => Ok(permit),
            Admission::Queued(ticket) => ticket.wait().await,
        }
    }

    /// Stop admitting. Queued requests fail with `ShuttingDown`; executing
    /// requests run to completion.
    pub fn close(&self) {
        let drained: Vec<QueueEntry> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            std::iter::from_fn(|| state.queue.pop().map(|(_, e)| e)).collect()
        };
        for entry in drained {
            let _ = entry.waiter.send(Err(AdmissionError::ShuttingDown));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn executing_count(&self) -> usize {
        self.inner.state.lock().executing
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub(crate) fn stats(&self) -> &QueueStats {
        &self.inner.stats
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let (queue_size, processing, queued) = {
            let state = self.inner.state.lock();
            let queued = state
                .queue
                .iter()
                .map(|(priority, e)| QueuedSummary {
                    id: e.request.id,
                    kind: e.request.kind.clone(),
                    priority,
                    waited_ms: e.enqueued_at.elapsed().as_millis() as u64,
                })
                .collect();
            (state.queue.len(), state.executing, queued)
        };
        SchedulerSnapshot {
            queue_size,
            processing,
            max_size: self.inner.config.max_queue_size,
            max_concurrent: self.inner.config.max_concurrent,
            overflow_policy: self.inner.config.overflow_policy,
            queued,
            active: self.inner.active.iter().map(|e| e.value().clone()).collect(),
            stats: self.inner.stats.snapshot(),
        }
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
