//! Two-stage vision pipeline: OCR, then structured analysis.
//!
//! Each stage goes through the dispatcher with the vision timeout tier and is
//! cached on its own. A failed OCR aborts the session; a failed analysis
//! still returns the OCR result, flagged as a partial failure.

mod pipeline;
mod session;

pub use pipeline::{AnalysisKind, VisionPipeline, VisionRequest};
pub use session::{PipelineOutcome, PipelineSession, PipelineStage, ProgressUpdate, SessionStatus};
