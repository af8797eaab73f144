//! Content-addressed cache for station results.
//!
//! Keys hash the request kind, the raw content bytes, and auxiliary
//! parameters, so the same image submitted twice with the same parameters is
//! answered locally. Bounded; evicts one entry per overflowing insert.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::GatewayError;
use crate::station::write_atomic;

/// SHA-256 over length-prefixed `(kind, content, sorted params)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Parameter order does not affect the key.
    pub fn compute(kind: &str, content: &[u8], params: &[(&str, &str)]) -> Self {
        let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        update_prefixed(&mut hasher, kind.as_bytes());
        update_prefixed(&mut hasher, content);
        hasher.update((sorted.len() as u64).to_le_bytes());
        for (name, value) in sorted {
            update_prefixed(&mut hasher, name.as_bytes());
            update_prefixed(&mut hasher, value.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        bytes.try_into().ok().map(Self)
    }
}

fn update_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.to_hex()[..12])
    }
}

/// Which entry an overflowing insert evicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest inserted entry; reads do not affect order.
    #[default]
    InsertionOrder,
    /// Entry read or written least recently.
    LeastRecentlyUsed,
}

impl std::str::FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insertion_order" | "fifo" => Ok(Self::InsertionOrder),
            "least_recently_used" | "lru" => Ok(Self::LeastRecentlyUsed),
            other => Err(format!("unknown eviction policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub capacity: usize,
    pub policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            policy: EvictionPolicy::InsertionOrder,
        }
    }
}

struct CacheEntry {
    value: Value,
    inserted_at: DateTime<Utc>,
    inserted_seq: u64,
    last_access: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: String,
    value: Value,
    inserted_at: DateTime<Utc>,
}

pub struct ResultCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut state = self.state.lock();
        let now = state.tick();
        let entry = state.entries.get_mut(key)?;
        entry.last_access = now;
        Some(entry.value.clone())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Insert or replace. A new key at capacity evicts exactly one entry.
    pub fn insert(&self, key: CacheKey, value: Value) {
        self.insert_at(key, value, Utc::now());
    }

    fn insert_at(&self, key: CacheKey, value: Value, inserted_at: DateTime<Utc>) {
        if self.config.capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        let now = state.tick();
        if let Some(entry) = state.entries.get_mut(&key) {
            entry.value = value;
            entry.last_access = now;
            return;
        }
        if state.entries.len() >= self.config.capacity {
            if let Some(victim) = self.victim(&state) {
                state.entries.remove(&victim);
                tracing::trace!(key = %victim, "evicted cache entry");
            }
        }
        state.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at,
                inserted_seq: now,
                last_access: now,
            },
        );
    }

    fn victim(&self, state: &CacheState) -> Option<CacheKey> {
        let rank = |e: &CacheEntry| match self.config.policy {
            EvictionPolicy::InsertionOrder => e.inserted_seq,
            EvictionPolicy::LeastRecentlyUsed => e.last_access,
        };
        state
            .entries
            .iter()
            .min_by_key(|(_, e)| rank(e))
            .map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Write all entries to `path` as JSON, oldest insertion first.
    pub fn save(&self, path: &Path) -> Result<(), GatewayError> {
        let snapshot: Vec<SnapshotEntry> = {
            let state = self.state.lock();
            let mut entries: Vec<(&CacheKey, &CacheEntry)> = state.entries.iter().collect();
            entries.sort_by_key(|(_, e)| e.inserted_seq);
            entries
                .into_iter()
                .map(|(k, e)| SnapshotEntry {
                    key: k.to_hex(),
                    value: e.value.clone(),
                    inserted_at: e.inserted_at,
                })
                .collect()
        };
        let json = serde_json::to_vec(&snapshot).map_err(|e| GatewayError::Storage(e.to_string()))?;
        write_atomic(path, &json)
    }

    /// Load a snapshot written by [`ResultCache::save`]. A missing or corrupt
    /// file yields an empty cache. Insertion order is preserved; when the
    /// snapshot exceeds capacity, the newest entries survive.
    pub fn load(path: &Path, config: CacheConfig) -> Self {
        let cache = Self::new(config);
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "could not read cache snapshot");
                }
                return cache;
            }
        };
        let entries: Vec<SnapshotEntry> = match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt cache snapshot");
                return cache;
            }
        };
        for entry in entries {
            match CacheKey::from_hex(&entry.key) {
                Some(key) => cache.insert_at(key, entry.value, entry.inserted_at),
                None => tracing::warn!(key = %entry.key, "skipping malformed cache key"),
            }
        }
        cache
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
