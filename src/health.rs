//! Station health as reported by `GET /api/status`.

use std::time::Instant;

use serde::Serialize;

use crate::scheduler::SchedulerSnapshot;
use crate::shutdown::ShutdownState;

/// Coarse station condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Free execution slots or room in the queue.
    Online,
    /// Every slot busy and the queue full; new work may be rejected or drop
    /// queued work.
    Saturated,
    /// Shutting down; new work is refused.
    Draining,
}

impl HealthState {
    /// Value of the top-level `status` field. Clients treat `online` as
    /// reachable, so a saturated station still advertises itself.
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Online | Self::Saturated => "online",
            Self::Draining => "draining",
        }
    }
}

pub struct HealthChecker {
    started: Instant,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn state(&self, shutdown: ShutdownState, queue: &SchedulerSnapshot) -> HealthState {
        if shutdown != ShutdownState::Running {
            return HealthState::Draining;
        }
        let slots_full = queue.processing >= queue.max_concurrent;
        let queue_full = queue.queue_size >= queue.max_size;
        if slots_full && queue_full {
            HealthState::Saturated
        } else {
            HealthState::Online
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{AdmissionConfig, AdmissionRequest, AdmissionScheduler, PriorityClass};

    #[test]
    fn saturation_requires_full_slots_and_queue() {
        let scheduler = AdmissionScheduler::new(AdmissionConfig {
            max_concurrent: 1,
            max_queue_size: 1,
            ..Default::default()
        });
        let checker = HealthChecker::new();
        assert_eq!(
            checker.state(ShutdownState::Running, &scheduler.snapshot()),
            HealthState::Online
        );

        let _running = scheduler
            .submit(AdmissionRequest::new(PriorityClass::Chat, "chat"))
            .unwrap();
        assert_eq!(
            checker.state(ShutdownState::Running, &scheduler.snapshot()),
            HealthState::Online
        );

        let _queued = scheduler
            .submit(AdmissionRequest::new(PriorityClass::Chat, "chat"))
            .unwrap();
        let state = checker.state(ShutdownState::Running, &scheduler.snapshot());
        assert_eq!(state, HealthState::Saturated);
        assert_eq!(state.status_label(), "online");
    }

    #[test]
    fn draining_overrides_queue_state() {
        let scheduler = AdmissionScheduler::new(AdmissionConfig::default());
        let state = HealthChecker::new().state(ShutdownState::Draining, &scheduler.snapshot());
        assert_eq!(state, HealthState::Draining);
        assert_eq!(state.status_label(), "draining");
    }
}
