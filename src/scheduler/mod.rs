//! Station-side request scheduling.
//!
//! Bounded priority admission in front of the inference engine: a fixed
//! number of execution slots, a bounded wait queue ordered by priority class,
//! and an overflow policy for arrivals that find the queue full.

mod admission;
mod priority;
mod stats;
mod worker;

pub use admission::{
    ActiveExecution, Admission, AdmissionConfig, AdmissionError, AdmissionRequest,
    AdmissionScheduler, ExecutionPermit, OverflowPolicy, QueuedAdmission, QueuedSummary,
    SchedulerSnapshot,
};
pub use priority::{PriorityClass, PriorityQueue};
pub use stats::{QueueStats, QueueStatsSnapshot};
pub use worker::{GateError, GateOutput, InferenceGate};
