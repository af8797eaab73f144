//! Inference engine boundary.
//!
//! The station treats model execution as a black box returning JSON. Only
//! [`crate::scheduler::InferenceGate`] calls into an engine, so every call is
//! covered by an execution permit.

mod mock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::station::StationMode;

pub use mock::{MockEngine, MockLatency};

/// Unit of work handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceTask {
    Ocr {
        image: Vec<u8>,
        language: String,
    },
    Document {
        image: Vec<u8>,
        document_type: String,
    },
    Medical {
        image: Vec<u8>,
        symptoms: String,
    },
    MultimodalChat {
        text: String,
        image: Option<Vec<u8>>,
    },
    /// Text-only endpoints (`translate`, `chat`, `legal`, ...).
    Text {
        operation: String,
        payload: Value,
    },
}

impl InferenceTask {
    /// Short name used for logs, metrics, and queue status.
    pub fn kind(&self) -> &str {
        match self {
            Self::Ocr { .. } => "vision_ocr",
            Self::Document { .. } => "vision_document",
            Self::Medical { .. } => "vision_medical",
            Self::MultimodalChat { .. } => "multimodal_chat",
            Self::Text { operation, .. } => operation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Opaque model backend.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Model identifier reported by `/api/status`.
    fn model_type(&self) -> &str;

    fn mode(&self) -> StationMode;

    async fn infer(&self, task: InferenceTask) -> Result<Value, EngineError>;
}
