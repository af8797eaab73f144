//! Decoding of incoming station requests into engine tasks.

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use super::error::ApiError;
use crate::client::{RequestClass, HEADER_PRIORITY};
use crate::engine::InferenceTask;
use crate::scheduler::PriorityClass;

/// Document types handled with legal priority.
const LEGAL_DOCUMENTS: &[&str] = &["asylum_application", "legal_form", "id_document"];

/// Parse the JSON body. An empty body counts as `{}`.
pub(crate) fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidRequest(format!("malformed JSON body: {e}")))?;
    if !value.is_object() {
        return Err(ApiError::InvalidRequest("body must be a JSON object".into()));
    }
    Ok(value)
}

/// Header value when it names a known class, otherwise derived from the
/// endpoint and payload.
pub(crate) fn priority(class: RequestClass, headers: &HeaderMap, payload: &Value) -> PriorityClass {
    headers
        .get(HEADER_PRIORITY)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| derive_priority(class, payload))
}

pub(crate) fn derive_priority(class: RequestClass, payload: &Value) -> PriorityClass {
    let field = |name: &str| payload.get(name).and_then(Value::as_str).unwrap_or_default();
    match class {
        RequestClass::Medical | RequestClass::VisionMedical => {
            if field("urgency").eq_ignore_ascii_case("emergency") {
                PriorityClass::Emergency
            } else {
                PriorityClass::Medical
            }
        }
        RequestClass::VisionDocument => {
            if LEGAL_DOCUMENTS.contains(&field("document_type")) {
                PriorityClass::Legal
            } else {
                PriorityClass::Translation
            }
        }
        RequestClass::Chat | RequestClass::MultimodalChat => {
            if field("priority").eq_ignore_ascii_case("high") {
                PriorityClass::Legal
            } else {
                PriorityClass::Chat
            }
        }
        other => other.default_priority(),
    }
}

pub(crate) fn task(class: RequestClass, payload: Value) -> Result<InferenceTask, ApiError> {
    let text = |name: &str, default: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let task = match class {
        RequestClass::VisionOcr => InferenceTask::Ocr {
            image: required_image(&payload)?,
            language: text("language", "en"),
        },
        RequestClass::VisionDocument => InferenceTask::Document {
            image: required_image(&payload)?,
            document_type: text("document_type", "general"),
        },
        RequestClass::VisionMedical => InferenceTask::Medical {
            image: required_image(&payload)?,
            symptoms: text("symptoms", ""),
        },
        RequestClass::MultimodalChat => InferenceTask::MultimodalChat {
            text: text("text", ""),
            image: optional_image(&payload)?,
        },
        other => InferenceTask::Text {
            operation: other.as_str().to_string(),
            payload,
        },
    };
    Ok(task)
}

fn required_image(payload: &Value) -> Result<Vec<u8>, ApiError> {
    optional_image(payload)?.ok_or_else(|| ApiError::InvalidRequest("no image data provided".into()))
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL.
fn optional_image(payload: &Value) -> Result<Option<Vec<u8>>, ApiError> {
    let raw = match payload.get("image").and_then(Value::as_str) {
        Some(raw) if !raw.trim().is_empty() => raw.trim(),
        _ => return Ok(None),
    };
    let encoded = match raw.split_once("base64,") {
        Some((_, data)) if raw.starts_with("data:") => data,
        _ => raw,
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ApiError::InvalidRequest(format!("image is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn header_priority_wins_when_valid() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_PRIORITY, HeaderValue::from_static("emergency"));
        assert_eq!(
            priority(RequestClass::Chat, &headers, &json!({})),
            PriorityClass::Emergency
        );

        headers.insert(HEADER_PRIORITY, HeaderValue::from_static("urgent-ish"));
        assert_eq!(priority(RequestClass::Chat, &headers, &json!({})), PriorityClass::Chat);
    }

    #[test]
    fn derived_priorities() {
        let p = |class, payload| derive_priority(class, &payload);
        assert_eq!(
            p(RequestClass::VisionMedical, json!({"urgency": "emergency"})),
            PriorityClass::Emergency
        );
        assert_eq!(p(RequestClass::Medical, json!({})), PriorityClass::Medical);
        assert_eq!(
            p(RequestClass::VisionDocument, json!({"document_type": "asylum_application"})),
            PriorityClass::Legal
        );
        assert_eq!(
            p(RequestClass::VisionDocument, json!({"document_type": "general"})),
            PriorityClass::Translation
        );
        assert_eq!(p(RequestClass::Chat, json!({"priority": "high"})), PriorityClass::Legal);
        assert_eq!(p(RequestClass::MultimodalChat, json!({})), PriorityClass::Chat);
        assert_eq!(p(RequestClass::Translate, json!({})), PriorityClass::Translation);
        assert_eq!(p(RequestClass::Emergency, json!({})), PriorityClass::Emergency);
        assert_eq!(p(RequestClass::Education, json!({})), PriorityClass::Background);
    }

    #[test]
    fn vision_requires_image() {
        let err = task(RequestClass::VisionOcr, json!({"language": "ar"})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = task(RequestClass::VisionOcr, json!({"image": "***"})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn accepts_data_url_images() {
        let encoded = STANDARD.encode(b"png-bytes");
        let t = task(
            RequestClass::VisionOcr,
            json!({"image": format!("data:image/png;base64,{encoded}"), "language": "fa"}),
        )
        .unwrap();
        assert_eq!(
            t,
            InferenceTask::Ocr {
                image: b"png-bytes".to_vec(),
                language: "fa".into()
            }
        );
    }

    #[test]
    fn text_endpoints_pass_payload_through() {
        let payload = json!({"text": "hello", "to": "ar"});
        let t = task(RequestClass::Translate, payload.clone()).unwrap();
        assert_eq!(
            t,
            InferenceTask::Text {
                operation: "translate".into(),
                payload
            }
        );
    }

    #[test]
    fn malformed_body_is_invalid() {
        assert!(parse_body(b"").unwrap().is_object());
        assert!(matches!(parse_body(b"{nope"), Err(ApiError::InvalidRequest(_))));
        assert!(matches!(parse_body(b"[1,2]"), Err(ApiError::InvalidRequest(_))));
    }
}
