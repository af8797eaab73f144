//! HTTP error mapping for the station server.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;
use crate::scheduler::{AdmissionError, GateError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("request did not complete within {}s", .0.as_secs())]
    QueueTimeout(Duration),

    #[error(transparent)]
    Engine(EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Engine(EngineError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Admission(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::QueueTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code in `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::Engine(EngineError::InvalidInput(_)) => "INVALID_REQUEST",
            Self::Admission(AdmissionError::Rejected { .. }) => "ADMISSION_REJECTED",
            Self::Admission(AdmissionError::OverflowDropped) => "OVERFLOW_DROPPED",
            Self::Admission(AdmissionError::ShuttingDown) => "SHUTTING_DOWN",
            Self::QueueTimeout(_) => "QUEUE_TIMEOUT",
            Self::Engine(_) => "ENGINE_ERROR",
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Admission(e) => Self::Admission(e),
            GateError::Timeout(budget) => Self::QueueTimeout(budget),
            GateError::Engine(e) => Self::Engine(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request refused");
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PriorityClass;

    #[test]
    fn admission_failures_are_service_unavailable() {
        let rejected = ApiError::from(AdmissionError::Rejected {
            priority: PriorityClass::Chat,
        });
        assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rejected.code(), "ADMISSION_REJECTED");
        assert_eq!(ApiError::from(AdmissionError::OverflowDropped).code(), "OVERFLOW_DROPPED");
        assert_eq!(ApiError::from(AdmissionError::ShuttingDown).code(), "SHUTTING_DOWN");
    }

    #[test]
    fn gate_errors_map_to_http() {
        let timeout = ApiError::from(GateError::Timeout(Duration::from_secs(30)));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.code(), "QUEUE_TIMEOUT");

        let invalid = ApiError::from(GateError::Engine(EngineError::InvalidInput("empty image".into())));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let model = ApiError::from(GateError::Engine(EngineError::ModelError("oom".into())));
        assert_eq!(model.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(model.code(), "ENGINE_ERROR");
    }
}
