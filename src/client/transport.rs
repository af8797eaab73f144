//! HTTP transport to the station.
//!
//! A trait so the resolver and dispatcher can be driven by an in-process fake
//! in tests; [`HttpTransport`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Map to the gateway taxonomy. `budget` is the timeout that applied.
    pub fn into_gateway(self, budget: Duration) -> GatewayError {
        match self {
            Self::Timeout => GatewayError::Timeout { budget },
            Self::Network(msg) => GatewayError::NetworkFailure(msg),
            Self::Status { code, body } => GatewayError::ServerError {
                status: code,
                message: body,
            },
            Self::Decode(msg) => GatewayError::InvalidResponse(msg),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// reqwest-backed transport. One connection pool shared by all requests.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| GatewayError::NetworkFailure(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn finish(response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await.map_err(map_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest)?;
        Self::finish(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let mut request = self.client.post(url).timeout(timeout).json(body);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        let response = request.send().await.map_err(map_reqwest)?;
        Self::finish(response).await
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
