//! Capabilities advertised by the current station.

use std::collections::HashSet;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::record::StationCapabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TextInference,
    Multimodal,
    VisionProcessing,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextInference => "text_inference",
            Self::Multimodal => "multimodal",
            Self::VisionProcessing => "vision_processing",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed capability lookups, filled from the last successful probe.
#[derive(Default)]
pub struct CapabilityRegistry {
    available: RwLock<HashSet<Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents with a station's capabilities.
    pub fn load(&self, caps: &StationCapabilities) {
        let mut set = HashSet::from([Capability::TextInference]);
        if caps.multimodal {
            set.insert(Capability::Multimodal);
        }
        if caps.vision_processing {
            set.insert(Capability::VisionProcessing);
        }
        *self.available.write() = set;
    }

    pub fn clear(&self) {
        self.available.write().clear();
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.available.read().contains(&capability)
    }

    pub fn snapshot(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self.available.read().iter().copied().collect();
        caps.sort_by_key(|c| c.as_str());
        caps
    }
}
