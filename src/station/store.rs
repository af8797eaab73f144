//! Persistence for the last-known-good station.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::record::StationRecord;
use crate::error::GatewayError;

/// Where the resolver keeps the last station that answered a probe.
pub trait StationStore: Send + Sync {
    fn load(&self) -> Result<Option<StationRecord>, GatewayError>;
    fn save(&self, record: &StationRecord) -> Result<(), GatewayError>;
    fn clear(&self) -> Result<(), GatewayError>;
}

/// JSON file store. A missing or corrupt file loads as "no station".
pub struct FileStationStore {
    path: PathBuf,
}

impl FileStationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StationStore for FileStationStore {
    fn load(&self) -> Result<Option<StationRecord>, GatewayError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GatewayError::Storage(format!("{}: {e}", self.path.display()))),
        };
        match serde_json::from_slice(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt station file");
                Ok(None)
            }
        }
    }

    fn save(&self, record: &StationRecord) -> Result<(), GatewayError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| GatewayError::Storage(e.to_string()))?;
        write_atomic(&self.path, &json)
    }

    fn clear(&self) -> Result<(), GatewayError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}

/// Write through a sibling temp file and rename, so readers never see a
/// half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GatewayError> {
    let storage = |e: std::io::Error| GatewayError::Storage(format!("{}: {e}", path.display()));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(storage)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(storage)?;
    std::fs::rename(&tmp, path).map_err(storage)
}

/// In-memory store for tests and ephemeral clients.
#[derive(Default)]
pub struct MemoryStationStore {
    record: Mutex<Option<StationRecord>>,
}

impl MemoryStationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: StationRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl StationStore for MemoryStationStore {
    fn load(&self) -> Result<Option<StationRecord>, GatewayError> {
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &StationRecord) -> Result<(), GatewayError> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), GatewayError> {
        *self.record.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::StationCapabilities;
    use chrono::Utc;

    fn record() -> StationRecord {
        StationRecord {
            address: "192.168.1.20:5000".into(),
            last_validated_at: Utc::now(),
            capabilities: StationCapabilities::default(),
        }
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStationStore::new(dir.path().join("nested/station.json"));
        assert_eq!(store.load().unwrap(), None);

        let rec = record();
        store.save(&rec).unwrap();
        assert_eq!(store.load().unwrap(), Some(rec));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(FileStationStore::new(path).load().unwrap(), None);
    }
}
