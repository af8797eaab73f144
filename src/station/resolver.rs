//! Station discovery and revalidation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;

use super::record::{base_url, StationRecord};
use super::registry::CapabilityRegistry;
use super::store::StationStore;
use crate::client::Transport;
use crate::error::GatewayError;
use crate::telemetry;

pub const STATUS_PATH: &str = "/api/status";

/// Where and how to look for a station.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Caller-supplied address, probed right after the persisted one.
    pub override_address: Option<String>,
    /// Explicit `host:port` candidates, in order.
    pub candidates: Vec<String>,
    /// Name-service hostnames; `default_port` is appended when absent.
    pub hostnames: Vec<String>,
    pub default_port: u16,
    pub probe_timeout: Duration,
    /// How long a successful probe keeps a record usable.
    pub freshness_window: Duration,
    pub health_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            override_address: None,
            candidates: vec!["127.0.0.1:5000".to_string()],
            hostnames: vec!["station.local".to_string()],
            default_port: 5000,
            probe_timeout: Duration::from_secs(3),
            freshness_window: Duration::from_secs(120),
            health_interval: Duration::from_secs(30),
        }
    }
}

/// Finds the station and tracks whether it is still known-good.
pub struct StationResolver {
    config: DiscoveryConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn StationStore>,
    registry: Arc<CapabilityRegistry>,
    current: RwLock<Option<StationRecord>>,
    discovery_lock: Mutex<()>,
}

impl StationResolver {
    pub fn new(
        config: DiscoveryConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn StationStore>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            registry,
            current: RwLock::new(None),
            discovery_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// The current record, if its last probe is within the freshness window.
    pub fn current(&self) -> Option<StationRecord> {
        let window = self.config.freshness_window;
        self.current
            .read()
            .as_ref()
            .filter(|r| r.is_fresh(window, Utc::now()))
            .cloned()
    }

    /// The current record regardless of freshness.
    pub fn known(&self) -> Option<StationRecord> {
        self.current.read().clone()
    }

    /// Return a fresh station, discovering one if needed.
    ///
    /// Callers that queued behind a running discovery reuse its result
    /// instead of scanning again.
    pub async fn ensure_station(&self) -> Result<StationRecord, GatewayError> {
        if let Some(record) = self.current() {
            return Ok(record);
        }
        let _guard = self.discovery_lock.lock().await;
        if let Some(record) = self.current() {
            return Ok(record);
        }
        self.discover_locked().await
    }

    /// Probe candidates in order and adopt the first ready station.
    pub async fn discover(&self) -> Result<StationRecord, GatewayError> {
        let _guard = self.discovery_lock.lock().await;
        self.discover_locked().await
    }

    async fn discover_locked(&self) -> Result<StationRecord, GatewayError> {
        let persisted = match self.store.load() {
            Ok(record) => record.map(|r| r.address),
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted station");
                None
            }
        };
        let candidates = self.candidate_order(persisted.as_deref());
        tracing::info!(candidates = candidates.len(), "discovering station");

        for address in &candidates {
            if let Some(record) = self.probe(address).await {
                self.adopt(record.clone());
                telemetry::record_discovery("success");
                tracing::info!(
                    address = %record.address,
                    mode = %record.capabilities.mode,
                    "station discovered"
                );
                return Ok(record);
            }
        }

        *self.current.write() = None;
        self.registry.clear();
        telemetry::record_discovery("failure");
        tracing::warn!(attempted = candidates.len(), "no station reachable");
        Err(GatewayError::DiscoveryFailure {
            attempted: candidates.len(),
        })
    }

    /// Re-probe `address`. On success refreshes the current record if it is
    /// the same station.
    pub async fn revalidate(&self, address: &str) -> bool {
        let Some(record) = self.probe(address).await else {
            return false;
        };
        let is_current = self
            .current
            .read()
            .as_ref()
            .is_some_and(|r| r.address == record.address);
        if is_current {
            self.adopt(record);
        }
        true
    }

    /// Fetch the full status document of the current station.
    pub async fn fetch_status(&self) -> Result<(StationRecord, Value), GatewayError> {
        let record = self.ensure_station().await?;
        let timeout = self.config.probe_timeout;
        let url = record.url(STATUS_PATH);
        match tokio::time::timeout(timeout, self.transport.get_json(&url, timeout)).await {
            Ok(Ok(body)) => Ok((record, body)),
            Ok(Err(e)) => {
                self.invalidate_address(&record.address);
                Err(e.into_gateway(timeout))
            }
            Err(_) => {
                self.invalidate_address(&record.address);
                Err(GatewayError::Timeout { budget: timeout })
            }
        }
    }

    /// Forget the known-good station. The persisted address is kept as the
    /// first candidate for the next discovery.
    pub fn invalidate(&self) {
        if let Some(record) = self.current.write().take() {
            tracing::warn!(address = %record.address, "station marked unhealthy");
        }
        self.registry.clear();
    }

    /// Invalidate only if `address` is still the current station.
    pub fn invalidate_address(&self, address: &str) {
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|r| r.address == address) {
            *current = None;
            drop(current);
            self.registry.clear();
            tracing::warn!(address = %address, "station marked unhealthy");
        }
    }

    fn adopt(&self, record: StationRecord) {
        self.registry.load(&record.capabilities);
        if let Err(e) = self.store.save(&record) {
            tracing::warn!(error = %e, "could not persist station");
        }
        *self.current.write() = Some(record);
    }

    async fn probe(&self, address: &str) -> Option<StationRecord> {
        let url = format!("{}{}", base_url(address), STATUS_PATH);
        let timeout = self.config.probe_timeout;
        let reply = match tokio::time::timeout(timeout, self.transport.get_json(&url, timeout)).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::debug!(address = %address, timeout_ms = timeout.as_millis() as u64, "probe timed out");
                return None;
            }
        };
        match reply {
            Ok(body) => {
                let record = StationRecord::from_status(address, &body, Utc::now());
                if record.is_none() {
                    tracing::debug!(address = %address, "station answered but is not ready");
                }
                record
            }
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "probe failed");
                None
            }
        }
    }

    /// Persisted, override, explicit candidates, then hostnames; each once.
    fn candidate_order(&self, persisted: Option<&str>) -> Vec<String> {
        let port = self.config.default_port;
        let hostnames = self.config.hostnames.iter().map(|h| {
            if h.contains(':') {
                h.clone()
            } else {
                format!("{h}:{port}")
            }
        });

        let mut seen = HashSet::new();
        persisted
            .map(str::to_string)
            .into_iter()
            .chain(self.config.override_address.clone())
            .chain(self.config.candidates.iter().cloned())
            .chain(hostnames)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .filter(|a| seen.insert(a.clone()))
            .collect()
    }
}
