//! Request spans.

use tracing::{info_span, Span};

/// Record an operation's outcome on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the spans wrapping one request.
pub struct RequestSpan;

impl RequestSpan {
    /// Client-side dispatch of one request to the station.
    ///
    /// `station`, `status`, `error.message` and `latency_ms` are filled in as
    /// the dispatch progresses.
    pub fn dispatch(request_id: &str, class: &str, priority: &str) -> Span {
        info_span!(
            "dispatch_request",
            request_id = %request_id,
            class = %class,
            priority = %priority,
            station = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }

    /// Server-side handling of one request, from admission to response.
    pub fn station(request_id: &str, kind: &str, priority: &str) -> Span {
        info_span!(
            "station_request",
            request_id = %request_id,
            kind = %kind,
            priority = %priority,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            queue_wait_ms = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }

    /// One vision pipeline session.
    pub fn pipeline(session_id: &str, analysis: &str) -> Span {
        info_span!(
            "vision_pipeline",
            session_id = %session_id,
            analysis = %analysis,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
