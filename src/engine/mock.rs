//! Mock multimodal model for development stations.
//!
//! Produces responses with the same shape as the real model, after a random
//! delay drawn from a configurable range.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

use super::{EngineError, InferenceEngine, InferenceTask};
use crate::station::StationMode;

const DOCUMENT_TYPES: &[&str] = &[
    "asylum_application",
    "medical_intake",
    "aid_registration",
    "legal_form",
    "id_document",
];

const MEDICAL_CONDITIONS: &[&str] = &[
    "wound_healing",
    "skin_condition",
    "bruising",
    "rash",
    "normal_appearance",
];

const MEDICAL_DISCLAIMER: &str =
    "This is AI-generated information. Always consult healthcare professionals.";

/// Simulated processing delay, drawn uniformly from `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLatency {
    pub min: Duration,
    pub max: Duration,
}

impl MockLatency {
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for MockLatency {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(200),
            max: Duration::from_millis(800),
        }
    }
}

pub struct MockEngine {
    latency: MockLatency,
}

impl MockEngine {
    pub fn new(latency: MockLatency) -> Self {
        tracing::info!(
            min_ms = latency.min.as_millis() as u64,
            max_ms = latency.max.as_millis() as u64,
            "mock multimodal engine initialized"
        );
        Self { latency }
    }

    /// Engine that answers immediately.
    pub fn instant() -> Self {
        Self {
            latency: MockLatency::none(),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(MockLatency::default())
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    fn model_type(&self) -> &str {
        "mock-multimodal"
    }

    fn mode(&self) -> StationMode {
        StationMode::Development
    }

    async fn infer(&self, task: InferenceTask) -> Result<Value, EngineError> {
        validate(&task)?;
        let delay = self.latency.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(respond(&task, delay.as_secs_f64()))
    }
}

fn validate(task: &InferenceTask) -> Result<(), EngineError> {
    match task {
        InferenceTask::Ocr { image, .. }
        | InferenceTask::Document { image, .. }
        | InferenceTask::Medical { image, .. }
            if image.is_empty() =>
        {
            Err(EngineError::InvalidInput("empty image".into()))
        }
        InferenceTask::MultimodalChat { text, image } if text.is_empty() && image.is_none() => {
            Err(EngineError::InvalidInput("no text or image provided".into()))
        }
        _ => Ok(()),
    }
}

fn respond(task: &InferenceTask, processing_time: f64) -> Value {
    let mut rng = rand::thread_rng();
    match task {
        InferenceTask::Ocr { language, .. } => {
            let text = ocr_text(language);
            json!({
                "extracted_text": text,
                "confidence": rng.gen_range(0.85..0.98),
                "language_detected": language,
                "character_count": text.chars().count(),
                "word_count": text.split_whitespace().count(),
                "processing_time": processing_time,
            })
        }
        InferenceTask::Document { document_type, .. } => {
            let document_type = if document_type == "general" || document_type.is_empty() {
                DOCUMENT_TYPES.choose(&mut rng).copied().unwrap_or("legal_form").to_string()
            } else {
                document_type.clone()
            };
            let fields = form_fields(&document_type);
            let extracted: Map<String, Value> = fields
                .iter()
                .map(|f| (f.to_string(), Value::String(format!("[{}]", title_case(f)))))
                .collect();
            let language = ["en", "ar", "fa"].choose(&mut rng).copied().unwrap_or("en");
            let urgency = ["low", "medium", "high"].choose(&mut rng).copied().unwrap_or("low");
            json!({
                "document_type": document_type,
                "extracted_fields": extracted,
                "critical_fields": fields.iter().take(3).collect::<Vec<_>>(),
                "completion_percentage": rng.gen_range(0.6..0.95),
                "confidence": rng.gen_range(0.80..0.95),
                "language_detected": language,
                "urgency_level": urgency,
                "processing_time": processing_time,
            })
        }
        InferenceTask::Medical { symptoms, .. } => {
            let condition = MEDICAL_CONDITIONS.choose(&mut rng).copied().unwrap_or("normal_appearance");
            let analysis = format!(
                "The image shows signs consistent with {}. {}",
                condition.replace('_', " "),
                symptoms
            );
            let urgency = ["routine", "urgent", "emergency"].choose(&mut rng).copied().unwrap_or("routine");
            json!({
                "analysis": analysis.trim_end(),
                "condition_detected": condition,
                "urgency_level": urgency,
                "recommendations": [
                    "Seek professional medical evaluation",
                    "Keep the area clean and dry",
                    "Monitor for changes or worsening symptoms"
                ],
                "confidence": rng.gen_range(0.7..0.9),
                "disclaimer": MEDICAL_DISCLAIMER,
                "processing_time": processing_time,
            })
        }
        InferenceTask::MultimodalChat { text, image } => {
            let response = if image.is_some() {
                format!(
                    "I can see the image you've shared. Based on your question '{text}', \
                     here is what I observe. This is a mock response for development purposes."
                )
            } else {
                format!("Thank you for your question: '{text}'. This is a mock response for development purposes.")
            };
            json!({
                "response": response,
                "has_image": image.is_some(),
                "language_detected": "en",
                "confidence": rng.gen_range(0.8..0.95),
                "processing_time": processing_time,
            })
        }
        InferenceTask::Text { operation, payload } => text_response(operation, payload, processing_time),
    }
}

fn text_response(operation: &str, payload: &Value, processing_time: f64) -> Value {
    let text = payload.get("text").and_then(Value::as_str).unwrap_or_default();
    if operation == "translate" {
        let from = payload.get("from").and_then(Value::as_str).unwrap_or("auto");
        let to = payload.get("to").and_then(Value::as_str).unwrap_or("en");
        return json!({
            "success": true,
            "translated_text": format!("[{to}] {text}"),
            "from_language": from,
            "to_language": to,
            "processing_time_ms": (processing_time * 1000.0).round() as u64,
        });
    }
    json!({
        "success": true,
        "operation": operation,
        "response": format!("Mock {operation} response for: '{text}'"),
        "language_detected": "en",
        "processing_time_ms": (processing_time * 1000.0).round() as u64,
    })
}

fn ocr_text(language: &str) -> &'static str {
    match language {
        "ar" => "طلب اللجوء\nالاسم الكامل: _______________\nتاريخ الميلاد: _______________\nبلد المنشأ: _______________",
        "fa" => "درخواست پناهندگی\nنام کامل: _______________\nتاریخ تولد: _______________\nکشور مبدأ: _______________",
        _ => "Application for Asylum\nFull Name: _______________\nDate of Birth: _______________\nCountry of Origin: _______________\nReason for Seeking Asylum: _______________",
    }
}

fn form_fields(document_type: &str) -> &'static [&'static str] {
    match document_type {
        "asylum_application" => &[
            "full_name",
            "date_of_birth",
            "country_of_origin",
            "reason_for_asylum",
            "arrival_date",
        ],
        "medical_intake" => &[
            "patient_name",
            "symptoms",
            "medical_history",
            "current_medications",
            "emergency_contact",
        ],
        "aid_registration" => &[
            "family_name",
            "family_size",
            "current_location",
            "needs_assessment",
            "contact_info",
        ],
        _ => &["field1", "field2"],
    }
}

fn title_case(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ocr_counts_match_text() {
        let engine = MockEngine::instant();
        let out = engine
            .infer(InferenceTask::Ocr {
                image: vec![1, 2, 3],
                language: "en".into(),
            })
            .await
            .unwrap();
        let text = out["extracted_text"].as_str().unwrap();
        assert_eq!(out["word_count"].as_u64().unwrap() as usize, text.split_whitespace().count());
        let confidence = out["confidence"].as_f64().unwrap();
        assert!((0.85..0.98).contains(&confidence));
    }

    #[tokio::test]
    async fn document_fields_follow_type() {
        let engine = MockEngine::instant();
        let out = engine
            .infer(InferenceTask::Document {
                image: vec![0xff],
                document_type: "medical_intake".into(),
            })
            .await
            .unwrap();
        assert_eq!(out["document_type"], "medical_intake");
        assert_eq!(out["critical_fields"].as_array().unwrap().len(), 3);
        assert_eq!(out["extracted_fields"]["patient_name"], "[Patient Name]");
    }

    #[tokio::test]
    async fn random_labels_come_from_fixed_sets() {
        let engine = MockEngine::instant();
        let document = engine
            .infer(InferenceTask::Document {
                image: vec![0xff],
                document_type: "general".into(),
            })
            .await
            .unwrap();
        assert!(["en", "ar", "fa"].contains(&document["language_detected"].as_str().unwrap()));
        assert!(["low", "medium", "high"].contains(&document["urgency_level"].as_str().unwrap()));
        assert!(DOCUMENT_TYPES.contains(&document["document_type"].as_str().unwrap()));

        let medical = engine
            .infer(InferenceTask::Medical {
                image: vec![0xff],
                symptoms: "itching".into(),
            })
            .await
            .unwrap();
        let urgency = medical["urgency_level"].as_str().unwrap();
        assert!(["routine", "urgent", "emergency"].contains(&urgency));
        assert!(medical["analysis"].as_str().unwrap().ends_with("itching"));
    }

    #[tokio::test]
    async fn empty_image_is_invalid() {
        let engine = MockEngine::instant();
        let err = engine
            .infer(InferenceTask::Medical {
                image: Vec::new(),
                symptoms: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn chat_reports_image_presence() {
        let engine = MockEngine::instant();
        let out = engine
            .infer(InferenceTask::MultimodalChat {
                text: "what is this?".into(),
                image: Some(vec![1]),
            })
            .await
            .unwrap();
        assert_eq!(out["has_image"], true);
    }

    #[test]
    fn title_case_splits_underscores() {
        assert_eq!(title_case("date_of_birth"), "Date Of Birth");
    }
}
