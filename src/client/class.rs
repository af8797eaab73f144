//! Request classes and their timeout tiers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scheduler::PriorityClass;
use crate::station::Capability;

/// Timeout budget group. Each tier is configured independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutTier {
    /// Text endpoints and multimodal chat.
    Standard,
    /// Single-image OCR, document, and medical analysis.
    Vision,
    /// Translation, the longest-running class.
    Translation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutTiers {
    #[serde(with = "duration_secs")]
    pub standard: Duration,
    #[serde(with = "duration_secs")]
    pub vision: Duration,
    #[serde(with = "duration_secs")]
    pub translation: Duration,
}

impl Default for TimeoutTiers {
    fn default() -> Self {
        Self {
            standard: Duration::from_secs(120),
            vision: Duration::from_secs(180),
            translation: Duration::from_secs(300),
        }
    }
}

impl TimeoutTiers {
    pub fn budget(&self, tier: TimeoutTier) -> Duration {
        match tier {
            TimeoutTier::Standard => self.standard,
            TimeoutTier::Vision => self.vision,
            TimeoutTier::Translation => self.translation,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Every endpoint the gateway can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Translate,
    Chat,
    Search,
    Medical,
    Legal,
    Profile,
    Emergency,
    Education,
    Conversation,
    VisionOcr,
    VisionDocument,
    VisionMedical,
    MultimodalChat,
}

impl RequestClass {
    pub const ALL: [RequestClass; 13] = [
        Self::Translate,
        Self::Chat,
        Self::Search,
        Self::Medical,
        Self::Legal,
        Self::Profile,
        Self::Emergency,
        Self::Education,
        Self::Conversation,
        Self::VisionOcr,
        Self::VisionDocument,
        Self::VisionMedical,
        Self::MultimodalChat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Chat => "chat",
            Self::Search => "search",
            Self::Medical => "medical",
            Self::Legal => "legal",
            Self::Profile => "profile",
            Self::Emergency => "emergency",
            Self::Education => "education",
            Self::Conversation => "conversation",
            Self::VisionOcr => "vision_ocr",
            Self::VisionDocument => "vision_document",
            Self::VisionMedical => "vision_medical",
            Self::MultimodalChat => "multimodal_chat",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Translate => "/api/translate",
            Self::Chat => "/api/chat",
            Self::Search => "/api/search",
            Self::Medical => "/api/medical",
            Self::Legal => "/api/legal",
            Self::Profile => "/api/profile",
            Self::Emergency => "/api/emergency",
            Self::Education => "/api/education",
            Self::Conversation => "/api/conversation",
            Self::VisionOcr => "/api/vision/ocr",
            Self::VisionDocument => "/api/vision/document",
            Self::VisionMedical => "/api/vision/medical",
            Self::MultimodalChat => "/api/multimodal/chat",
        }
    }

    pub fn tier(&self) -> TimeoutTier {
        match self {
            Self::Translate => TimeoutTier::Translation,
            Self::VisionOcr | Self::VisionDocument | Self::VisionMedical => TimeoutTier::Vision,
            _ => TimeoutTier::Standard,
        }
    }

    pub fn default_priority(&self) -> PriorityClass {
        match self {
            Self::Emergency => PriorityClass::Emergency,
            Self::Medical | Self::VisionMedical => PriorityClass::Medical,
            Self::Legal | Self::VisionDocument => PriorityClass::Legal,
            Self::Translate | Self::VisionOcr => PriorityClass::Translation,
            Self::Chat | Self::Conversation | Self::MultimodalChat | Self::Search | Self::Profile => {
                PriorityClass::Chat
            }
            Self::Education => PriorityClass::Background,
        }
    }

    pub fn required_capability(&self) -> Capability {
        match self {
            Self::VisionOcr | Self::VisionDocument | Self::VisionMedical => Capability::VisionProcessing,
            Self::MultimodalChat => Capability::Multimodal,
            _ => Capability::TextInference,
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown request class: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_has_longest_default_budget() {
        let tiers = TimeoutTiers::default();
        let longest = RequestClass::ALL
            .iter()
            .max_by_key(|c| tiers.budget(c.tier()))
            .unwrap();
        assert_eq!(*longest, RequestClass::Translate);
        assert_eq!(tiers.budget(RequestClass::VisionOcr.tier()), Duration::from_secs(180));
        assert_eq!(tiers.budget(RequestClass::MultimodalChat.tier()), Duration::from_secs(120));
    }

    #[test]
    fn vision_classes_need_vision_capability() {
        for class in [RequestClass::VisionOcr, RequestClass::VisionDocument, RequestClass::VisionMedical] {
            assert_eq!(class.required_capability(), Capability::VisionProcessing);
            assert!(class.path().starts_with("/api/vision/"));
        }
    }

    #[test]
    fn parse_round_trips_names() {
        for class in RequestClass::ALL {
            assert_eq!(class.as_str().parse::<RequestClass>(), Ok(class));
        }
        assert!("vision".parse::<RequestClass>().is_err());
    }
}
