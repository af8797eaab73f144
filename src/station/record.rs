//! Station record and status parsing.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operating mode reported by a station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StationMode {
    Development,
    Production,
    #[default]
    #[serde(other)]
    Unknown,
}

impl StationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "DEVELOPMENT",
            Self::Production => "PRODUCTION",
            Self::Unknown => "UNKNOWN",
        }
    }

    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEVELOPMENT" => Self::Development,
            "PRODUCTION" => Self::Production,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationCapabilities {
    pub multimodal: bool,
    pub vision_processing: bool,
    pub mode: StationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

/// A station known to have answered a status probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecord {
    /// `host:port`, or a full base URL.
    pub address: String,
    pub last_validated_at: DateTime<Utc>,
    pub capabilities: StationCapabilities,
}

const READY_STATUSES: [&str; 3] = ["ready", "ok", "online"];

impl StationRecord {
    /// Build a record from a `/api/status` body, or `None` if the station
    /// does not report itself ready.
    pub fn from_status(address: &str, body: &Value, now: DateTime<Utc>) -> Option<Self> {
        let status = body.get("status")?.as_str()?;
        if !READY_STATUSES.iter().any(|s| status.eq_ignore_ascii_case(s)) {
            return None;
        }

        let nested = body.get("capabilities");
        let flag = |top: &str, inner: &str| {
            body.get(top)
                .and_then(Value::as_bool)
                .or_else(|| nested.and_then(|c| c.get(inner)).and_then(Value::as_bool))
                .unwrap_or(false)
        };

        Some(Self {
            address: address.to_string(),
            last_validated_at: now,
            capabilities: StationCapabilities {
                multimodal: flag("multimodal_enabled", "multimodal"),
                vision_processing: flag("vision_processing", "vision"),
                mode: body
                    .get("mode")
                    .and_then(Value::as_str)
                    .map(StationMode::parse)
                    .unwrap_or_default(),
                model_type: body.get("model_type").and_then(Value::as_str).map(str::to_string),
            },
        })
    }

    pub fn base_url(&self) -> String {
        base_url(&self.address)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Whether the last successful probe lies within `window` of `now`.
    pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now.signed_duration_since(self.last_validated_at) <= window,
            Err(_) => true,
        }
    }
}

/// Normalize an address into a base URL without a trailing slash.
pub fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_any_ready_status_case_insensitively() {
        let now = Utc::now();
        for status in ["ready", "OK", "Online"] {
            let body = json!({ "status": status });
            assert!(StationRecord::from_status("10.0.0.2:5000", &body, now).is_some());
        }
        assert!(StationRecord::from_status("x", &json!({ "status": "loading" }), now).is_none());
        assert!(StationRecord::from_status("x", &json!({}), now).is_none());
    }

    #[test]
    fn reads_flat_and_nested_capabilities() {
        let now = Utc::now();
        let flat = json!({
            "status": "ready",
            "mode": "PRODUCTION",
            "multimodal_enabled": true,
            "vision_processing": true,
            "model_type": "gemma"
        });
        let rec = StationRecord::from_status("a:1", &flat, now).unwrap();
        assert!(rec.capabilities.multimodal && rec.capabilities.vision_processing);
        assert_eq!(rec.capabilities.mode, StationMode::Production);
        assert_eq!(rec.capabilities.model_type.as_deref(), Some("gemma"));

        let nested = json!({
            "status": "online",
            "mode": "DEVELOPMENT",
            "capabilities": { "vision": true, "multimodal": false }
        });
        let rec = StationRecord::from_status("a:1", &nested, now).unwrap();
        assert!(rec.capabilities.vision_processing);
        assert!(!rec.capabilities.multimodal);
    }

    #[test]
    fn freshness_window() {
        let now = Utc::now();
        let rec = StationRecord {
            address: "a:1".into(),
            last_validated_at: now - chrono::Duration::seconds(90),
            capabilities: StationCapabilities::default(),
        };
        assert!(rec.is_fresh(Duration::from_secs(120), now));
        assert!(!rec.is_fresh(Duration::from_secs(60), now));
    }

    #[test]
    fn unknown_mode_deserializes() {
        let caps: StationCapabilities =
            serde_json::from_str(r#"{"multimodal":true,"vision_processing":false,"mode":"STAGING"}"#)
                .unwrap();
        assert_eq!(caps.mode, StationMode::Unknown);
    }

    #[test]
    fn base_url_adds_scheme_once() {
        assert_eq!(base_url("10.0.0.2:5000/"), "http://10.0.0.2:5000");
        assert_eq!(base_url("https://station.local"), "https://station.local");
    }
}
