//! Session state and progress reporting for the vision pipeline.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Ocr,
    Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    /// OCR succeeded, analysis failed.
    PartialFailure,
    /// OCR failed; nothing usable was produced.
    Aborted,
}

/// Fixed checkpoint reported while a session runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub session_id: Uuid,
    pub stage: Option<PipelineStage>,
    pub percent: u8,
    pub message: &'static str,
}

/// State of one image submission.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSession {
    id: Uuid,
    stages: Vec<PipelineStage>,
    current_stage: Option<PipelineStage>,
    status: SessionStatus,
    /// Output of each stage that succeeded, in completion order.
    results: Vec<(PipelineStage, Value)>,
}

impl PipelineSession {
    pub(crate) fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            stages: vec![PipelineStage::Ocr, PipelineStage::Analysis],
            current_stage: None,
            status: SessionStatus::Running,
            results: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, stage: PipelineStage) {
        self.current_stage = Some(stage);
    }

    pub(crate) fn record(&mut self, stage: PipelineStage, value: Value) {
        self.results.push((stage, value));
    }

    pub(crate) fn finish(&mut self, status: SessionStatus) {
        self.current_stage = None;
        self.status = status;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn current_stage(&self) -> Option<PipelineStage> {
        self.current_stage
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The result a stage produced, if it succeeded.
    pub fn result(&self, stage: PipelineStage) -> Option<&Value> {
        self.results.iter().find(|(s, _)| *s == stage).map(|(_, v)| v)
    }

    pub fn completed_stages(&self) -> impl Iterator<Item = PipelineStage> + '_ {
        self.results.iter().map(|(s, _)| *s)
    }
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub session: PipelineSession,
    pub ocr: Value,
    pub analysis: Option<Value>,
    /// Set when the analysis stage failed.
    pub analysis_error: Option<GatewayError>,
}

impl PipelineOutcome {
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn is_partial(&self) -> bool {
        self.status() == SessionStatus::PartialFailure
    }
}
