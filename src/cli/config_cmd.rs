// Copyright 2024-2026 Station Gateway Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These read configuration directly from the environment and the optional
//! config file, without contacting a station.

use crate::cache::CacheConfig;
use crate::client::TimeoutTiers;
use crate::config::{self, Config, DeploymentTier, EffectiveConfig};
use crate::station::DiscoveryConfig;

use super::{EXIT_CONFIG, EXIT_FAILURE, EXIT_SUCCESS};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() -> i32 {
    match config::load() {
        Ok(cfg) => {
            if let Some(path) = &cfg.source_file {
                println!("# overlaid from {}", path.display());
            }
            print_config(&cfg.effective_config());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            EXIT_CONFIG
        }
    }
}

/// Print built-in defaults, including every tier preset.
pub fn run_defaults() {
    let discovery = DiscoveryConfig::default();
    let timeouts = TimeoutTiers::default();
    let cache = CacheConfig::default();

    println!("STATION_TIER=auto");
    println!("STATION_BIND=0.0.0.0:5000");
    println!("STATION_SHUTDOWN_TIMEOUT=30");
    println!("STATION_MOCK_LATENCY_MIN_MS=200");
    println!("STATION_MOCK_LATENCY_MAX_MS=800");
    println!("STATION_CANDIDATES={}", discovery.candidates.join(","));
    println!("STATION_HOSTNAMES={}", discovery.hostnames.join(","));
    println!("STATION_PORT={}", discovery.default_port);
    println!("STATION_PROBE_TIMEOUT={}", discovery.probe_timeout.as_secs());
    println!("STATION_FRESHNESS_WINDOW={}", discovery.freshness_window.as_secs());
    println!("STATION_HEALTH_INTERVAL={}", discovery.health_interval.as_secs());
    println!("STATION_TIMEOUT_STANDARD={}", timeouts.standard.as_secs());
    println!("STATION_TIMEOUT_VISION={}", timeouts.vision.as_secs());
    println!("STATION_TIMEOUT_TRANSLATION={}", timeouts.translation.as_secs());
    println!("STATION_CACHE_CAPACITY={}", cache.capacity);
    println!("STATION_CACHE_POLICY=insertion_order");
    println!("STATION_STATE_DIR=.station");
    println!("STATION_LOG_LEVEL=info");
    println!("STATION_LOG_FORMAT=json");
    println!();
    println!("# tier presets: max_queue_size max_concurrent overflow_policy request_timeout");
    for tier in DeploymentTier::ALL {
        let p = tier.preset();
        println!(
            "# {:<12} {:>4} {:>3} {:<22} {}s",
            tier.as_str(),
            p.max_queue_size,
            p.max_concurrent,
            p.overflow_policy.as_str(),
            p.request_timeout.as_secs()
        );
    }
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if the config file
/// cannot be loaded.
pub fn run_validate() -> i32 {
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return EXIT_CONFIG;
        }
    };

    let mut warnings = config::invalid_env_values();
    warnings.extend(validation_warnings(&cfg));
    for w in &warnings {
        eprintln!("WARNING: {w}");
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Settings that load fine but combine badly.
pub fn validation_warnings(cfg: &Config) -> Vec<String> {
    let mut out = Vec::new();
    let server = &cfg.server;
    let client = &cfg.client;

    if server.admission.max_queue_size == 0 {
        out.push("STATION_MAX_QUEUE_SIZE is 0; a busy station rejects all new work".to_string());
    }
    let longest_client = client
        .timeouts
        .standard
        .max(client.timeouts.vision)
        .max(client.timeouts.translation);
    if server.request_timeout > longest_client {
        out.push(format!(
            "STATION_REQUEST_TIMEOUT ({}s) exceeds every client timeout tier (longest {}s); clients give up first",
            server.request_timeout.as_secs(),
            longest_client.as_secs()
        ));
    }
    if client.discovery.freshness_window < client.discovery.health_interval {
        out.push(format!(
            "STATION_FRESHNESS_WINDOW ({}s) is shorter than STATION_HEALTH_INTERVAL ({}s); records go stale between probes",
            client.discovery.freshness_window.as_secs(),
            client.discovery.health_interval.as_secs()
        ));
    }
    if client.cache.capacity == 0 {
        out.push("STATION_CACHE_CAPACITY is 0; results are never cached".to_string());
    }
    out
}

fn print_config(cfg: &EffectiveConfig) {
    println!("STATION_TIER={}", cfg.tier);
    println!("STATION_BIND={}", cfg.bind);
    println!("STATION_MAX_CONCURRENT={}", cfg.max_concurrent);
    println!("STATION_MAX_QUEUE_SIZE={}", cfg.max_queue_size);
    println!("STATION_OVERFLOW_POLICY={}", cfg.overflow_policy);
    println!("STATION_REQUEST_TIMEOUT={}", cfg.request_timeout_secs);
    println!("STATION_SHUTDOWN_TIMEOUT={}", cfg.shutdown_timeout_secs);
    println!("STATION_MOCK_LATENCY_MIN_MS={}", cfg.mock_latency_min_ms);
    println!("STATION_MOCK_LATENCY_MAX_MS={}", cfg.mock_latency_max_ms);
    println!("STATION_ADDRESS={}", cfg.address.as_deref().unwrap_or(""));
    println!("STATION_CANDIDATES={}", cfg.candidates.join(","));
    println!("STATION_HOSTNAMES={}", cfg.hostnames.join(","));
    println!("STATION_PORT={}", cfg.port);
    println!("STATION_PROBE_TIMEOUT={}", cfg.probe_timeout_secs);
    println!("STATION_FRESHNESS_WINDOW={}", cfg.freshness_window_secs);
    println!("STATION_HEALTH_INTERVAL={}", cfg.health_interval_secs);
    println!("STATION_TIMEOUT_STANDARD={}", cfg.timeout_standard_secs);
    println!("STATION_TIMEOUT_VISION={}", cfg.timeout_vision_secs);
    println!("STATION_TIMEOUT_TRANSLATION={}", cfg.timeout_translation_secs);
    println!("STATION_CACHE_CAPACITY={}", cfg.cache_capacity);
    println!("STATION_CACHE_POLICY={}", cfg.cache_policy);
    println!("STATION_STATE_DIR={}", cfg.state_dir);
    println!("STATION_LOG_LEVEL={}", cfg.log_level);
    println!("STATION_LOG_FORMAT={}", cfg.log_format);
}
