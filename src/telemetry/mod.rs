//! Telemetry for the gateway and the station server.
//!
//! Structured logging via `tracing`, per-request spans, and metric recording
//! through the `metrics` facade.

mod logging;
mod metrics;
mod spans;

pub use self::logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_admission, record_cache_lookup, record_discovery,
    record_dispatch_failure, record_dispatch_success, record_engine_failure,
    record_engine_success, record_executing, record_queue_depth,
};
pub use self::spans::{RequestSpan, SpanExt};
