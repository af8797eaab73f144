//! Runs an image through OCR and then the requested analysis.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::session::{PipelineOutcome, PipelineSession, PipelineStage, ProgressUpdate, SessionStatus};
use crate::cache::{CacheKey, ResultCache};
use crate::client::{RequestClass, RequestDispatcher};
use crate::error::GatewayResult;
use crate::scheduler::PriorityClass;
use crate::telemetry::{self, RequestSpan, SpanExt};

/// Second-stage analysis to run after OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisKind {
    Document { document_type: String },
    Medical { symptoms: String },
}

impl AnalysisKind {
    fn class(&self) -> RequestClass {
        match self {
            Self::Document { .. } => RequestClass::VisionDocument,
            Self::Medical { .. } => RequestClass::VisionMedical,
        }
    }

    fn param(&self) -> (&'static str, &str) {
        match self {
            Self::Document { document_type } => ("document_type", document_type),
            Self::Medical { symptoms } => ("symptoms", symptoms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image: Vec<u8>,
    pub language: String,
    pub analysis: AnalysisKind,
    /// Overrides the classes' default priorities for both stages.
    pub priority: Option<PriorityClass>,
}

impl VisionRequest {
    pub fn document(image: Vec<u8>, language: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            image,
            language: language.into(),
            analysis: AnalysisKind::Document {
                document_type: document_type.into(),
            },
            priority: None,
        }
    }

    pub fn medical(image: Vec<u8>, language: impl Into<String>, symptoms: impl Into<String>) -> Self {
        Self {
            image,
            language: language.into(),
            analysis: AnalysisKind::Medical {
                symptoms: symptoms.into(),
            },
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: PriorityClass) -> Self {
        self.priority = Some(priority);
        self
    }
}

pub struct VisionPipeline {
    dispatcher: Arc<RequestDispatcher>,
    cache: Arc<ResultCache>,
}

impl VisionPipeline {
    pub fn new(dispatcher: Arc<RequestDispatcher>, cache: Arc<ResultCache>) -> Self {
        Self { dispatcher, cache }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub async fn process(&self, request: VisionRequest) -> GatewayResult<PipelineOutcome> {
        self.process_with_progress(request, None).await
    }

    /// Run both stages, sending checkpoints at 10, 50 and 100 percent.
    pub async fn process_with_progress(
        &self,
        request: VisionRequest,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
    ) -> GatewayResult<PipelineOutcome> {
        let mut session = PipelineSession::start();
        let span = RequestSpan::pipeline(&session.id().to_string(), request.analysis.class().as_str());
        let result = self
            .run(&mut session, &request, progress.as_ref())
            .instrument(span.clone())
            .await;
        span.record_result(&result);
        result
    }

    async fn run(
        &self,
        session: &mut PipelineSession,
        request: &VisionRequest,
        progress: Option<&mpsc::Sender<ProgressUpdate>>,
    ) -> GatewayResult<PipelineOutcome> {
        let session_id = session.id();
        let report = |stage: Option<PipelineStage>, percent: u8, message: &'static str| {
            let update = ProgressUpdate {
                session_id,
                stage,
                percent,
                message,
            };
            async move {
                if let Some(tx) = progress {
                    let _ = tx.send(update).await;
                }
            }
        };

        session.enter(PipelineStage::Ocr);
        report(Some(PipelineStage::Ocr), 10, "extracting text").await;
        let ocr = match self
            .stage(
                RequestClass::VisionOcr,
                request,
                ("language", request.language.as_str()),
                json!({ "language": request.language }),
            )
            .await
        {
            Ok(ocr) => {
                session.record(PipelineStage::Ocr, ocr.clone());
                ocr
            }
            Err(e) => {
                session.finish(SessionStatus::Aborted);
                tracing::warn!(session_id = %session.id(), error = %e, "ocr stage failed, session aborted");
                return Err(e);
            }
        };

        session.enter(PipelineStage::Analysis);
        report(Some(PipelineStage::Analysis), 50, "analyzing content").await;
        let (name, value) = request.analysis.param();
        let analysis = self
            .stage(request.analysis.class(), request, (name, value), json!({ name: value }))
            .await;

        let outcome = match analysis {
            Ok(analysis) => {
                session.record(PipelineStage::Analysis, analysis.clone());
                session.finish(SessionStatus::Completed);
                PipelineOutcome {
                    session: session.clone(),
                    ocr,
                    analysis: Some(analysis),
                    analysis_error: None,
                }
            }
            Err(e) => {
                session.finish(SessionStatus::PartialFailure);
                tracing::warn!(
                    session_id = %session.id(),
                    error = %e,
                    "analysis stage failed, returning ocr result only"
                );
                PipelineOutcome {
                    session: session.clone(),
                    ocr,
                    analysis: None,
                    analysis_error: Some(e),
                }
            }
        };
        report(None, 100, "complete").await;
        Ok(outcome)
    }

    /// One cached stage. Only successful results are cached.
    async fn stage(
        &self,
        class: RequestClass,
        request: &VisionRequest,
        param: (&str, &str),
        mut payload: Value,
    ) -> GatewayResult<Value> {
        let kind = class.as_str();
        let key = CacheKey::compute(kind, &request.image, &[param]);
        if let Some(hit) = self.cache.get(&key) {
            telemetry::record_cache_lookup(kind, true);
            tracing::debug!(stage = kind, key = %key, "cache hit");
            return Ok(hit);
        }
        telemetry::record_cache_lookup(kind, false);

        payload["image"] = Value::String(STANDARD.encode(&request.image));
        let mut envelope = self.dispatcher.envelope(class, payload);
        if let Some(priority) = request.priority {
            envelope = envelope.with_priority(priority);
        }
        let value = self.dispatcher.dispatch_envelope(envelope).await?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}
