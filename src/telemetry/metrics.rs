//! Metric recording through the `metrics` facade.
//!
//! No exporter is installed here; an embedding binary may install one and
//! these calls start reporting. Without a recorder they are no-ops.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::scheduler::PriorityClass;

/// Register metric descriptions. Safe to call more than once.
pub fn init_metrics() {
    describe_counter!(
        "station_admission_total",
        "Admission decisions by outcome and priority"
    );
    describe_gauge!("station_queue_depth", "Requests waiting for an execution slot");
    describe_gauge!("station_executing", "Requests currently holding an execution slot");
    describe_histogram!(
        "station_engine_duration_seconds",
        "Engine execution time by task kind"
    );
    describe_counter!("station_engine_failures_total", "Engine failures by task kind");
    describe_histogram!(
        "gateway_dispatch_duration_seconds",
        "Client dispatch latency by request class"
    );
    describe_counter!(
        "gateway_dispatch_errors_total",
        "Client dispatch failures by request class and error code"
    );
    describe_counter!("gateway_discovery_total", "Station discovery attempts by outcome");
    describe_counter!("gateway_cache_hits_total", "Result cache hits by kind");
    describe_counter!("gateway_cache_misses_total", "Result cache misses by kind");
}

pub fn record_admission(outcome: &'static str, priority: PriorityClass) {
    counter!(
        "station_admission_total",
        "outcome" => outcome,
        "priority" => priority.as_str()
    )
    .increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("station_queue_depth").set(depth as f64);
}

pub fn record_executing(count: usize) {
    gauge!("station_executing").set(count as f64);
}

pub fn record_engine_success(kind: &str, elapsed: Duration) {
    histogram!("station_engine_duration_seconds", "kind" => kind.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_engine_failure(kind: &str) {
    counter!("station_engine_failures_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_dispatch_success(class: &'static str, elapsed: Duration) {
    histogram!("gateway_dispatch_duration_seconds", "class" => class).record(elapsed.as_secs_f64());
}

pub fn record_dispatch_failure(class: &'static str, code: &'static str) {
    counter!("gateway_dispatch_errors_total", "class" => class, "code" => code).increment(1);
}

pub fn record_discovery(outcome: &'static str) {
    counter!("gateway_discovery_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_lookup(kind: &str, hit: bool) {
    if hit {
        counter!("gateway_cache_hits_total", "kind" => kind.to_string()).increment(1);
    } else {
        counter!("gateway_cache_misses_total", "kind" => kind.to_string()).increment(1);
    }
}
