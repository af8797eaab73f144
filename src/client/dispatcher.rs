//! Tiered-timeout dispatch of typed requests to the station.
//!
//! A dispatch never retries. Transport failures mark the station unhealthy so
//! the next dispatch rediscovers; the caller decides whether to try again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::class::{RequestClass, TimeoutTiers};
use super::envelope::RequestEnvelope;
use super::transport::{Transport, TransportError};
use crate::error::{GatewayError, GatewayResult};
use crate::station::StationResolver;
use crate::telemetry::{self, RequestSpan, SpanExt};

pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_PRIORITY: &str = "x-request-priority";

pub struct RequestDispatcher {
    resolver: Arc<StationResolver>,
    transport: Arc<dyn Transport>,
    tiers: TimeoutTiers,
}

impl RequestDispatcher {
    pub fn new(resolver: Arc<StationResolver>, transport: Arc<dyn Transport>, tiers: TimeoutTiers) -> Self {
        Self {
            resolver,
            transport,
            tiers,
        }
    }

    pub fn tiers(&self) -> &TimeoutTiers {
        &self.tiers
    }

    pub fn resolver(&self) -> &Arc<StationResolver> {
        &self.resolver
    }

    /// Envelope for `class` with this dispatcher's tier budgets.
    pub fn envelope(&self, class: RequestClass, payload: Value) -> RequestEnvelope {
        RequestEnvelope::new(class, payload, &self.tiers)
    }

    pub async fn dispatch(&self, class: RequestClass, payload: Value) -> GatewayResult<Value> {
        self.dispatch_envelope(self.envelope(class, payload)).await
    }

    /// Dispatch, giving up with [`GatewayError::Cancelled`] if `cancel` fires
    /// first. Work already admitted by the station is not cancelled.
    pub async fn dispatch_with_cancel(
        &self,
        envelope: RequestEnvelope,
        cancel: CancellationToken,
    ) -> GatewayResult<Value> {
        let id = envelope.id();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(request_id = %id, "dispatch cancelled by caller");
                Err(GatewayError::Cancelled)
            }
            result = self.dispatch_envelope(envelope) => result,
        }
    }

    pub async fn dispatch_envelope(&self, envelope: RequestEnvelope) -> GatewayResult<Value> {
        let span = RequestSpan::dispatch(
            &envelope.id().to_string(),
            envelope.class().as_str(),
            envelope.priority().as_str(),
        );
        let class = envelope.class();
        let started = Instant::now();

        let result = self.send(envelope).instrument(span.clone()).await;

        let elapsed = started.elapsed();
        span.record("latency_ms", elapsed.as_millis() as u64);
        span.record_result(&result);
        match &result {
            Ok(_) => telemetry::record_dispatch_success(class.as_str(), elapsed),
            Err(e) => telemetry::record_dispatch_failure(class.as_str(), e.code()),
        }
        result
    }

    async fn send(&self, envelope: RequestEnvelope) -> GatewayResult<Value> {
        let station = self.resolver.ensure_station().await?;
        tracing::Span::current().record("station", station.address.as_str());

        let class = envelope.class();
        let capability = class.required_capability();
        if !self.resolver.registry().supports(capability) {
            return Err(GatewayError::CapabilityUnavailable(capability));
        }

        let url = station.url(class.path());
        let budget = envelope.timeout_budget();
        let headers = [
            (HEADER_REQUEST_ID, envelope.id().to_string()),
            (HEADER_PRIORITY, envelope.priority().as_str().to_string()),
        ];

        let response = tokio::time::timeout(
            budget,
            self.transport.post_json(&url, envelope.payload(), &headers, budget),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout));

        let result = response.map_err(|e| classify_failure(e, budget));
        if let Err(e) = &result {
            if e.invalidates_station() {
                self.resolver.invalidate_address(&station.address);
            }
            tracing::warn!(url = %url, error = %e, "dispatch failed");
        }
        result
    }
}

/// Map a transport failure, recognising the station's admission codes.
fn classify_failure(err: TransportError, budget: Duration) -> GatewayError {
    match err {
        TransportError::Status { code: 503, body } => match error_code(&body).as_deref() {
            Some("ADMISSION_REJECTED") => GatewayError::AdmissionRejected,
            Some("OVERFLOW_DROPPED") => GatewayError::OverflowDropped,
            _ => GatewayError::ServerError {
                status: 503,
                message: error_message(&body),
            },
        },
        TransportError::Status { code, body } => GatewayError::ServerError {
            status: code,
            message: error_message(&body),
        },
        other => other.into_gateway(budget),
    }
}

fn error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/code")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, body: &str) -> TransportError {
        TransportError::Status {
            code,
            body: body.to_string(),
        }
    }

    #[test]
    fn admission_codes_map_to_typed_errors() {
        let budget = Duration::from_secs(1);
        let rejected = r#"{"error":{"code":"ADMISSION_REJECTED","message":"queue full"}}"#;
        let dropped = r#"{"error":{"code":"OVERFLOW_DROPPED","message":"evicted"}}"#;
        assert_eq!(classify_failure(status(503, rejected), budget), GatewayError::AdmissionRejected);
        assert_eq!(classify_failure(status(503, dropped), budget), GatewayError::OverflowDropped);
    }

    #[test]
    fn other_failures_become_server_errors() {
        let budget = Duration::from_secs(1);
        let shutting = r#"{"error":{"code":"SHUTTING_DOWN","message":"draining"}}"#;
        assert_eq!(
            classify_failure(status(503, shutting), budget),
            GatewayError::ServerError {
                status: 503,
                message: "draining".into()
            }
        );
        assert_eq!(
            classify_failure(status(500, r#"{"error":"Translation failed"}"#), budget),
            GatewayError::ServerError {
                status: 500,
                message: "Translation failed".into()
            }
        );
        assert_eq!(
            classify_failure(status(502, "bad gateway"), budget),
            GatewayError::ServerError {
                status: 502,
                message: "bad gateway".into()
            }
        );
    }
}
