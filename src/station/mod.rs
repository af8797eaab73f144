//! Finding and tracking the station.
//!
//! The resolver probes candidate addresses, keeps the last station that
//! answered as known-good for a freshness window, persists it for the next
//! start, and loads its capabilities into the registry.

mod monitor;
mod record;
mod registry;
mod resolver;
mod store;

pub use monitor::HealthMonitor;
pub use record::{base_url, StationCapabilities, StationMode, StationRecord};
pub use registry::{Capability, CapabilityRegistry};
pub use resolver::{DiscoveryConfig, StationResolver, STATUS_PATH};
pub use store::{FileStationStore, MemoryStationStore, StationStore};
pub(crate) use store::write_atomic;
