//! Configuration loading.
//!
//! Values come from `STATION_*` environment variables, then an optional TOML
//! file named by `STATION_CONFIG`, then built-in defaults. Server admission
//! defaults come from the deployment tier. Invalid values fall back to the
//! next source without failing; only an unreadable or malformed config file
//! is an error.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `STATION_CONFIG` | unset | TOML config file |
//! | `STATION_TIER` | auto | development, production, emergency, camp, clinic, auto |
//! | `STATION_BIND` | 0.0.0.0:5000 | Server listen address |
//! | `STATION_MAX_CONCURRENT` | tier | Execution slots |
//! | `STATION_MAX_QUEUE_SIZE` | tier | Wait queue bound |
//! | `STATION_OVERFLOW_POLICY` | tier | reject, drop_oldest, drop_lowest_priority |
//! | `STATION_REQUEST_TIMEOUT` | tier | Server-side budget per request (secs) |
//! | `STATION_SHUTDOWN_TIMEOUT` | 30 | Drain timeout (secs) |
//! | `STATION_MOCK_LATENCY_MIN_MS` | 200 | Mock engine delay lower bound |
//! | `STATION_MOCK_LATENCY_MAX_MS` | 800 | Mock engine delay upper bound |
//! | `STATION_ADDRESS` | unset | Station address override for clients |
//! | `STATION_CANDIDATES` | 127.0.0.1:5000 | Comma-separated `host:port` list |
//! | `STATION_HOSTNAMES` | station.local | Comma-separated hostnames |
//! | `STATION_PORT` | 5000 | Port appended to bare hostnames |
//! | `STATION_PROBE_TIMEOUT` | 3 | Status probe timeout (secs) |
//! | `STATION_FRESHNESS_WINDOW` | 120 | Station record validity (secs) |
//! | `STATION_HEALTH_INTERVAL` | 30 | Background re-probe interval (secs) |
//! | `STATION_TIMEOUT_STANDARD` | 120 | Text and chat budget (secs) |
//! | `STATION_TIMEOUT_VISION` | 180 | Vision budget (secs) |
//! | `STATION_TIMEOUT_TRANSLATION` | 300 | Translation budget (secs) |
//! | `STATION_CACHE_CAPACITY` | 50 | Result cache entries |
//! | `STATION_CACHE_POLICY` | insertion_order | insertion_order or lru |
//! | `STATION_STATE_DIR` | .station | Persisted station and cache |
//! | `STATION_LOG_LEVEL` | info | Log filter |
//! | `STATION_LOG_FORMAT` | json | json or pretty |
//! | `STATION_LOG_FILE` | unset | Log to file instead of stderr |

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheConfig, EvictionPolicy};
use crate::client::TimeoutTiers;
use crate::engine::MockLatency;
use crate::scheduler::{AdmissionConfig, OverflowPolicy};
use crate::station::{DiscoveryConfig, StationMode};
use crate::telemetry::{LogConfig, LogFormat};

const GIB: u64 = 1024 * 1024 * 1024;

/// Memory at or above which `auto` selects the production tier.
pub const PRODUCTION_MEMORY_THRESHOLD: u64 = 30 * GIB;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Station deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTier {
    Development,
    Production,
    Emergency,
    Camp,
    Clinic,
}

/// Admission defaults for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPreset {
    pub max_queue_size: usize,
    pub max_concurrent: usize,
    pub overflow_policy: OverflowPolicy,
    pub request_timeout: Duration,
}

impl DeploymentTier {
    pub const ALL: [DeploymentTier; 5] = [
        Self::Development,
        Self::Production,
        Self::Emergency,
        Self::Camp,
        Self::Clinic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Emergency => "emergency",
            Self::Camp => "camp",
            Self::Clinic => "clinic",
        }
    }

    pub fn preset(&self) -> TierPreset {
        let (max_queue_size, max_concurrent, overflow_policy, timeout_secs) = match self {
            Self::Development => (20, 6, OverflowPolicy::Reject, 30),
            Self::Production => (50, 3, OverflowPolicy::DropLowestPriority, 120),
            Self::Emergency => (100, 6, OverflowPolicy::DropLowestPriority, 180),
            Self::Camp => (75, 4, OverflowPolicy::DropOldest, 90),
            Self::Clinic => (40, 2, OverflowPolicy::DropLowestPriority, 180),
        };
        TierPreset {
            max_queue_size,
            max_concurrent,
            overflow_policy,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Development stations run the mock engine.
    pub fn mode(&self) -> StationMode {
        match self {
            Self::Development => StationMode::Development,
            _ => StationMode::Production,
        }
    }

    /// Pick a tier from installed memory.
    pub fn detect() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        Self::for_memory(sys.total_memory())
    }

    pub fn for_memory(total_bytes: u64) -> Self {
        if total_bytes >= PRODUCTION_MEMORY_THRESHOLD {
            Self::Production
        } else {
            Self::Development
        }
    }
}

impl fmt::Display for DeploymentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown deployment tier: {s}"))
    }
}

/// Station server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tier: DeploymentTier,
    pub bind: SocketAddr,
    pub admission: AdmissionConfig,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub mock_latency: MockLatency,
}

/// Gateway (client) settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub discovery: DiscoveryConfig,
    pub timeouts: TimeoutTiers,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub state_dir: PathBuf,
    pub log: LogConfig,
    /// File the values were overlaid from, if any.
    pub source_file: Option<PathBuf>,
}

impl Config {
    pub fn station_file(&self) -> PathBuf {
        self.state_dir.join("station.json")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.state_dir.join("result_cache.json")
    }
}

/// Flattened summary for `config show`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub tier: String,
    pub bind: String,
    pub max_concurrent: usize,
    pub max_queue_size: usize,
    pub overflow_policy: String,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub mock_latency_min_ms: u64,
    pub mock_latency_max_ms: u64,
    pub address: Option<String>,
    pub candidates: Vec<String>,
    pub hostnames: Vec<String>,
    pub port: u16,
    pub probe_timeout_secs: u64,
    pub freshness_window_secs: u64,
    pub health_interval_secs: u64,
    pub timeout_standard_secs: u64,
    pub timeout_vision_secs: u64,
    pub timeout_translation_secs: u64,
    pub cache_capacity: usize,
    pub cache_policy: String,
    pub state_dir: String,
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    pub fn effective_config(&self) -> EffectiveConfig {
        let s = &self.server;
        let c = &self.client;
        EffectiveConfig {
            tier: s.tier.to_string(),
            bind: s.bind.to_string(),
            max_concurrent: s.admission.max_concurrent,
            max_queue_size: s.admission.max_queue_size,
            overflow_policy: s.admission.overflow_policy.to_string(),
            request_timeout_secs: s.request_timeout.as_secs(),
            shutdown_timeout_secs: s.shutdown_timeout.as_secs(),
            mock_latency_min_ms: s.mock_latency.min.as_millis() as u64,
            mock_latency_max_ms: s.mock_latency.max.as_millis() as u64,
            address: c.discovery.override_address.clone(),
            candidates: c.discovery.candidates.clone(),
            hostnames: c.discovery.hostnames.clone(),
            port: c.discovery.default_port,
            probe_timeout_secs: c.discovery.probe_timeout.as_secs(),
            freshness_window_secs: c.discovery.freshness_window.as_secs(),
            health_interval_secs: c.discovery.health_interval.as_secs(),
            timeout_standard_secs: c.timeouts.standard.as_secs(),
            timeout_vision_secs: c.timeouts.vision.as_secs(),
            timeout_translation_secs: c.timeouts.translation.as_secs(),
            cache_capacity: c.cache.capacity,
            cache_policy: match c.cache.policy {
                EvictionPolicy::InsertionOrder => "insertion_order".to_string(),
                EvictionPolicy::LeastRecentlyUsed => "least_recently_used".to_string(),
            },
            state_dir: self.state_dir.display().to_string(),
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str().to_string(),
        }
    }
}

// TOML file layout. Every field is optional; missing ones fall through.

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    tier: Option<String>,
    state_dir: Option<PathBuf>,
    server: FileServer,
    discovery: FileDiscovery,
    timeouts: FileTimeouts,
    cache: FileCache,
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileServer {
    bind: Option<String>,
    max_concurrent: Option<usize>,
    max_queue_size: Option<usize>,
    overflow_policy: Option<String>,
    request_timeout_secs: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
    mock_latency_min_ms: Option<u64>,
    mock_latency_max_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileDiscovery {
    address: Option<String>,
    candidates: Option<Vec<String>>,
    hostnames: Option<Vec<String>>,
    port: Option<u16>,
    probe_timeout_secs: Option<u64>,
    freshness_window_secs: Option<u64>,
    health_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileTimeouts {
    standard_secs: Option<u64>,
    vision_secs: Option<u64>,
    translation_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileCache {
    capacity: Option<usize>,
    policy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLogging {
    level: Option<String>,
    format: Option<String>,
    file: Option<PathBuf>,
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse an env var, `None` when missing, empty, or invalid.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn parse_opt<T: FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.parse::<T>().ok())
}

/// Load configuration, overlaying `STATION_CONFIG` if set.
pub fn load() -> Result<Config, ConfigError> {
    let path = env_string("STATION_CONFIG").map(PathBuf::from);
    load_with_file(path.as_deref())
}

/// Load configuration with an explicit file (env vars still win).
pub fn load_with_file(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(p) => read_file(p)?,
        None => FileConfig::default(),
    };
    Ok(resolve(file, path.map(Path::to_path_buf)))
}

fn resolve(file: FileConfig, source_file: Option<PathBuf>) -> Config {
    let tier = match env_string("STATION_TIER").or(file.tier.clone()) {
        Some(t) if t.eq_ignore_ascii_case("auto") => DeploymentTier::detect(),
        Some(t) => t.parse().unwrap_or_else(|_| DeploymentTier::detect()),
        None => DeploymentTier::detect(),
    };
    let preset = tier.preset();
    let fs = &file.server;

    let max_concurrent = env_parse("STATION_MAX_CONCURRENT")
        .or(fs.max_concurrent)
        .unwrap_or(preset.max_concurrent)
        .max(1);
    let max_queue_size = env_parse("STATION_MAX_QUEUE_SIZE")
        .or(fs.max_queue_size)
        .unwrap_or(preset.max_queue_size);
    let overflow_policy = env_parse("STATION_OVERFLOW_POLICY")
        .or_else(|| parse_opt(fs.overflow_policy.as_ref()))
        .unwrap_or(preset.overflow_policy);
    let request_secs = env_parse("STATION_REQUEST_TIMEOUT")
        .or(fs.request_timeout_secs)
        .unwrap_or(preset.request_timeout.as_secs())
        .max(1);
    let shutdown_secs = env_parse("STATION_SHUTDOWN_TIMEOUT")
        .or(fs.shutdown_timeout_secs)
        .unwrap_or(30u64)
        .max(1);
    let bind = env_parse("STATION_BIND")
        .or_else(|| parse_opt(fs.bind.as_ref()))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 5000)));
    let latency_min = env_parse("STATION_MOCK_LATENCY_MIN_MS")
        .or(fs.mock_latency_min_ms)
        .unwrap_or(200u64);
    let latency_max = env_parse("STATION_MOCK_LATENCY_MAX_MS")
        .or(fs.mock_latency_max_ms)
        .unwrap_or(800u64)
        .max(latency_min);

    let server = ServerConfig {
        tier,
        bind,
        admission: AdmissionConfig {
            max_concurrent,
            max_queue_size,
            overflow_policy,
        },
        request_timeout: Duration::from_secs(request_secs),
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        mock_latency: MockLatency {
            min: Duration::from_millis(latency_min),
            max: Duration::from_millis(latency_max),
        },
    };

    let fd = &file.discovery;
    let defaults = DiscoveryConfig::default();
    let discovery = DiscoveryConfig {
        override_address: env_string("STATION_ADDRESS").or(fd.address.clone()),
        candidates: env_list("STATION_CANDIDATES")
            .or(fd.candidates.clone())
            .unwrap_or(defaults.candidates),
        hostnames: env_list("STATION_HOSTNAMES")
            .or(fd.hostnames.clone())
            .unwrap_or(defaults.hostnames),
        default_port: env_parse("STATION_PORT").or(fd.port).unwrap_or(defaults.default_port),
        probe_timeout: secs(
            env_parse("STATION_PROBE_TIMEOUT").or(fd.probe_timeout_secs),
            defaults.probe_timeout,
        ),
        freshness_window: secs(
            env_parse("STATION_FRESHNESS_WINDOW").or(fd.freshness_window_secs),
            defaults.freshness_window,
        ),
        health_interval: secs(
            env_parse("STATION_HEALTH_INTERVAL").or(fd.health_interval_secs),
            defaults.health_interval,
        ),
    };

    let ft = &file.timeouts;
    let tier_defaults = TimeoutTiers::default();
    let timeouts = TimeoutTiers {
        standard: secs(
            env_parse("STATION_TIMEOUT_STANDARD").or(ft.standard_secs),
            tier_defaults.standard,
        ),
        vision: secs(
            env_parse("STATION_TIMEOUT_VISION").or(ft.vision_secs),
            tier_defaults.vision,
        ),
        translation: secs(
            env_parse("STATION_TIMEOUT_TRANSLATION").or(ft.translation_secs),
            tier_defaults.translation,
        ),
    };

    let fc = &file.cache;
    let cache = CacheConfig {
        capacity: env_parse("STATION_CACHE_CAPACITY")
            .or(fc.capacity)
            .unwrap_or(CacheConfig::default().capacity),
        policy: env_parse("STATION_CACHE_POLICY")
            .or_else(|| parse_opt(fc.policy.as_ref()))
            .unwrap_or_default(),
    };

    let fl = &file.logging;
    let log = LogConfig {
        format: env_parse("STATION_LOG_FORMAT")
            .or_else(|| parse_opt(fl.format.as_ref()))
            .unwrap_or(LogFormat::Json),
        level: env_string("STATION_LOG_LEVEL")
            .or(fl.level.clone())
            .unwrap_or_else(|| "info".to_string()),
        output_path: env_string("STATION_LOG_FILE").map(PathBuf::from).or(fl.file.clone()),
    };

    Config {
        server,
        client: ClientConfig {
            discovery,
            timeouts,
            cache,
        },
        state_dir: env_string("STATION_STATE_DIR")
            .map(PathBuf::from)
            .or(file.state_dir)
            .unwrap_or_else(|| PathBuf::from(".station")),
        log,
        source_file,
    }
}

/// Seconds with a floor of one; zero would disable the bound entirely.
fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map(|s| Duration::from_secs(s.max(1))).unwrap_or(default)
}

/// Report environment values that are set but could not be used.
pub fn invalid_env_values() -> Vec<String> {
    fn check<T: FromStr>(key: &str, out: &mut Vec<String>) {
        if let Some(raw) = env_string(key) {
            if raw.parse::<T>().is_err() {
                out.push(format!("{key}={raw} is invalid; using fallback"));
            }
        }
    }

    let mut out = Vec::new();
    if let Some(raw) = env_string("STATION_TIER") {
        if !raw.eq_ignore_ascii_case("auto") && raw.parse::<DeploymentTier>().is_err() {
            out.push(format!("STATION_TIER={raw} is invalid; using auto"));
        }
    }
    for key in [
        "STATION_MAX_CONCURRENT",
        "STATION_MAX_QUEUE_SIZE",
        "STATION_CACHE_CAPACITY",
    ] {
        check::<usize>(key, &mut out);
    }
    for key in [
        "STATION_REQUEST_TIMEOUT",
        "STATION_SHUTDOWN_TIMEOUT",
        "STATION_MOCK_LATENCY_MIN_MS",
        "STATION_MOCK_LATENCY_MAX_MS",
        "STATION_PROBE_TIMEOUT",
        "STATION_FRESHNESS_WINDOW",
        "STATION_HEALTH_INTERVAL",
        "STATION_TIMEOUT_STANDARD",
        "STATION_TIMEOUT_VISION",
        "STATION_TIMEOUT_TRANSLATION",
    ] {
        check::<u64>(key, &mut out);
    }
    check::<u16>("STATION_PORT", &mut out);
    check::<SocketAddr>("STATION_BIND", &mut out);
    check::<OverflowPolicy>("STATION_OVERFLOW_POLICY", &mut out);
    check::<EvictionPolicy>("STATION_CACHE_POLICY", &mut out);
    check::<LogFormat>("STATION_LOG_FORMAT", &mut out);
    out
}

#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_KEYS: &[&str] = &[
    "STATION_CONFIG",
    "STATION_TIER",
    "STATION_BIND",
    "STATION_MAX_CONCURRENT",
    "STATION_MAX_QUEUE_SIZE",
    "STATION_OVERFLOW_POLICY",
    "STATION_REQUEST_TIMEOUT",
    "STATION_SHUTDOWN_TIMEOUT",
    "STATION_MOCK_LATENCY_MIN_MS",
    "STATION_MOCK_LATENCY_MAX_MS",
    "STATION_ADDRESS",
    "STATION_CANDIDATES",
    "STATION_HOSTNAMES",
    "STATION_PORT",
    "STATION_PROBE_TIMEOUT",
    "STATION_FRESHNESS_WINDOW",
    "STATION_HEALTH_INTERVAL",
    "STATION_TIMEOUT_STANDARD",
    "STATION_TIMEOUT_VISION",
    "STATION_TIMEOUT_TRANSLATION",
    "STATION_CACHE_CAPACITY",
    "STATION_CACHE_POLICY",
    "STATION_STATE_DIR",
    "STATION_LOG_LEVEL",
    "STATION_LOG_FORMAT",
    "STATION_LOG_FILE",
];

#[cfg(test)]
pub(crate) fn clear_env_vars() {
    for k in ENV_KEYS {
        std::env::remove_var(k);
    }
}
