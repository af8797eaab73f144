//! Queue statistics for status reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::priority::PriorityClass;

/// Lock-free counters updated alongside admission decisions.
#[derive(Default)]
pub struct QueueStats {
    submitted: AtomicU64,
    admitted: AtomicU64,
    queued: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    abandoned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    queue_wait_us: AtomicU64,
    queue_wait_count: AtomicU64,
    processing_us: AtomicU64,
    per_priority: [AtomicU64; 6],
}

/// Point-in-time copy of [`QueueStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    pub total_submitted: u64,
    pub total_admitted: u64,
    pub total_queued: u64,
    pub total_rejected: u64,
    pub total_dropped: u64,
    pub total_abandoned: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub avg_queue_wait_ms: f64,
    pub avg_processing_ms: f64,
    pub priority_breakdown: Vec<(PriorityClass, u64)>,
    pub success_rate: f64,
}

impl QueueStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self, priority: PriorityClass) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.per_priority[priority.rank() as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Waiter left the queue before being admitted (timeout or disconnect).
    pub fn record_abandoned(&self, count: u64) {
        self.abandoned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_queue_wait(&self, wait: Duration) {
        self.queue_wait_us.fetch_add(wait.as_micros() as u64, Ordering::Relaxed);
        self.queue_wait_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, processing: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.processing_us.fetch_add(processing.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueStatsSnapshot {
        let submitted = self.submitted.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let waits = self.queue_wait_count.load(Ordering::Relaxed);

        QueueStatsSnapshot {
            total_submitted: submitted,
            total_admitted: self.admitted.load(Ordering::Relaxed),
            total_queued: self.queued.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
            total_abandoned: self.abandoned.load(Ordering::Relaxed),
            total_completed: completed,
            total_failed: self.failed.load(Ordering::Relaxed),
            avg_queue_wait_ms: average_ms(self.queue_wait_us.load(Ordering::Relaxed), waits),
            avg_processing_ms: average_ms(self.processing_us.load(Ordering::Relaxed), completed),
            priority_breakdown: PriorityClass::ALL
                .iter()
                .map(|p| (*p, self.per_priority[p.rank() as usize].load(Ordering::Relaxed)))
                .collect(),
            success_rate: if submitted == 0 {
                0.0
            } else {
                (completed as f64 / submitted as f64 * 10_000.0).round() / 100.0
            },
        }
    }
}

fn average_ms(total_us: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (total_us as f64 / count as f64 / 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_zero_rates() {
        let snap = QueueStats::new().snapshot();
        assert_eq!(snap.total_submitted, 0);
        assert_eq!(snap.success_rate, 0.0);
        assert_eq!(snap.avg_processing_ms, 0.0);
    }

    #[test]
    fn breakdown_counts_by_priority() {
        let stats = QueueStats::new();
        stats.record_submitted(PriorityClass::Chat);
        stats.record_submitted(PriorityClass::Chat);
        stats.record_submitted(PriorityClass::Emergency);
        let snap = stats.snapshot();
        let chat = snap.priority_breakdown.iter().find(|(p, _)| *p == PriorityClass::Chat);
        assert_eq!(chat, Some(&(PriorityClass::Chat, 2)));
        assert_eq!(snap.priority_breakdown[0], (PriorityClass::Emergency, 1));
    }

    #[test]
    fn averages_are_in_milliseconds() {
        let stats = QueueStats::new();
        stats.record_submitted(PriorityClass::Chat);
        stats.record_completed(Duration::from_millis(40));
        stats.record_submitted(PriorityClass::Chat);
        stats.record_completed(Duration::from_millis(60));
        let snap = stats.snapshot();
        assert_eq!(snap.avg_processing_ms, 50.0);
        assert_eq!(snap.success_rate, 100.0);
    }
}
