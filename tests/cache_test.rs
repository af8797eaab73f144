//! Integration tests for result cache persistence across gateway restarts.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{ready_status, Reply, ScriptedTransport};
use serde_json::json;
use station_gateway::cache::{CacheConfig, CacheKey, EvictionPolicy, ResultCache};
use station_gateway::config::{self, Config};
use station_gateway::station::MemoryStationStore;
use station_gateway::vision::{SessionStatus, VisionRequest};
use station_gateway::Gateway;

const STATION: &str = "10.0.0.2:5000";

fn config(state_dir: &Path) -> Config {
    let mut cfg = config::load_with_file(None).unwrap();
    cfg.state_dir = state_dir.to_path_buf();
    cfg.client.discovery.candidates = vec![STATION.to_string()];
    cfg.client.discovery.hostnames = vec![];
    cfg.client.discovery.override_address = None;
    cfg
}

fn gateway(cfg: &Config, transport: &Arc<ScriptedTransport>) -> Gateway {
    Gateway::new(cfg, transport.clone(), Arc::new(MemoryStationStore::new()))
}

// =============================================================================
// Gateway restart
// =============================================================================

#[tokio::test]
async fn persisted_results_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let transport = ScriptedTransport::new();
    transport.station(STATION, ready_status());
    transport.reply("/api/vision/ocr", Reply::ok(json!({"text": "LEASE AGREEMENT"})));
    transport.reply("/api/vision/document", Reply::ok(json!({"analysis": "lease"})));

    let request = VisionRequest::document(b"scan".to_vec(), "en", "legal_form");
    let first = gateway(&cfg, &transport);
    first.pipeline.process(request.clone()).await.unwrap();
    first.persist_cache().unwrap();
    assert!(cfg.cache_file().exists());
    assert_eq!(transport.post_count(), 2);

    let second = gateway(&cfg, &transport);
    assert_eq!(second.cache.len(), 2);
    let outcome = second.pipeline.process(request).await.unwrap();
    assert_eq!(outcome.status(), SessionStatus::Completed);
    assert_eq!(outcome.ocr["text"], "LEASE AGREEMENT");
    assert_eq!(transport.post_count(), 2);
}

#[tokio::test]
async fn missing_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let transport = ScriptedTransport::new();

    let gateway = gateway(&cfg, &transport);
    assert!(gateway.cache.is_empty());
}

#[tokio::test]
async fn corrupt_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    std::fs::write(cfg.cache_file(), b"[{\"key\": 12").unwrap();
    let transport = ScriptedTransport::new();

    let gateway = gateway(&cfg, &transport);
    assert!(gateway.cache.is_empty());
}

// =============================================================================
// Snapshot ordering
// =============================================================================

#[test]
fn smaller_capacity_on_reload_keeps_newest_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result_cache.json");
    let keys: Vec<CacheKey> = (0..5)
        .map(|i| CacheKey::compute("vision_ocr", format!("image-{i}").as_bytes(), &[("language", "en")]))
        .collect();

    let cache = ResultCache::new(CacheConfig::default());
    for (i, key) in keys.iter().enumerate() {
        cache.insert(*key, json!({"text": i}));
    }
    cache.save(&path).unwrap();

    let reloaded = ResultCache::load(
        &path,
        CacheConfig {
            capacity: 3,
            policy: EvictionPolicy::InsertionOrder,
        },
    );
    assert_eq!(reloaded.len(), 3);
    assert!(!reloaded.contains(&keys[0]));
    assert!(!reloaded.contains(&keys[1]));
    assert_eq!(reloaded.get(&keys[4]).unwrap()["text"], 4);
}

#[test]
fn reloaded_cache_evicts_in_original_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result_cache.json");
    let config = CacheConfig {
        capacity: 2,
        policy: EvictionPolicy::InsertionOrder,
    };
    let a = CacheKey::compute("vision_ocr", b"a", &[]);
    let b = CacheKey::compute("vision_ocr", b"b", &[]);
    let c = CacheKey::compute("vision_ocr", b"c", &[]);

    let cache = ResultCache::new(config);
    cache.insert(a, json!("a"));
    cache.insert(b, json!("b"));
    cache.save(&path).unwrap();

    let reloaded = ResultCache::load(&path, config);
    reloaded.insert(c, json!("c"));
    assert!(!reloaded.contains(&a));
    assert!(reloaded.contains(&b));
    assert!(reloaded.contains(&c));
}
