//! Gateway error taxonomy.
//!
//! Every failure a caller can observe is one of these variants. Nothing in the
//! gateway fabricates a plausible result on failure, and nothing retries
//! automatically: the station is a single constrained device and blind retries
//! add load exactly when it is struggling.

use std::time::Duration;

use thiserror::Error;

use crate::station::Capability;

/// Errors returned by the client-side gateway (resolver, dispatcher, pipeline).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("no station reachable ({attempted} candidates probed)")]
    DiscoveryFailure { attempted: usize },

    #[error("request timed out after {}ms", .budget.as_millis())]
    Timeout { budget: Duration },

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("admission rejected: station queue is full")]
    AdmissionRejected,

    #[error("request dropped from station queue by a higher-priority arrival")]
    OverflowDropped,

    #[error("station error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("station does not provide capability: {0}")]
    CapabilityUnavailable(Capability),

    #[error("request cancelled by caller")]
    Cancelled,

    #[error("invalid station response: {0}")]
    InvalidResponse(String),

    #[error("local storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Recoverable errors trigger rediscovery and allow an explicit user retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailure { .. } | Self::Timeout { .. } | Self::NetworkFailure(_)
        )
    }

    /// Terminal for the specific request: the caller must resubmit.
    pub fn is_admission_failure(&self) -> bool {
        matches!(self, Self::AdmissionRejected | Self::OverflowDropped)
    }

    /// Whether the station should be considered unhealthy after this error.
    pub fn invalidates_station(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NetworkFailure(_))
    }

    /// Stable short code, used in logs and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DiscoveryFailure { .. } => "discovery_failure",
            Self::Timeout { .. } => "timeout",
            Self::NetworkFailure(_) => "network_failure",
            Self::AdmissionRejected => "admission_rejected",
            Self::OverflowDropped => "overflow_dropped",
            Self::ServerError { .. } => "server_error",
            Self::CapabilityUnavailable(_) => "capability_unavailable",
            Self::Cancelled => "cancelled",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Storage(_) => "storage",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
