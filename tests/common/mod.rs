//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use station_gateway::client::{Transport, TransportError};

/// Status document of a ready station with every capability.
pub fn ready_status() -> Value {
    json!({
        "status": "online",
        "mode": "DEVELOPMENT",
        "multimodal_enabled": true,
        "vision_processing": true,
        "model_type": "mock-multimodal",
    })
}

/// Canned reply for one endpoint path.
#[derive(Clone)]
pub struct Reply {
    pub delay: Duration,
    pub result: Result<Value, TransportError>,
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn err(err: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(err),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// In-process station: status answers per address, POST replies per path.
#[derive(Default)]
pub struct ScriptedTransport {
    statuses: Mutex<HashMap<String, Value>>,
    replies: Mutex<HashMap<String, Reply>>,
    probes: Mutex<Vec<String>>,
    hanging: Mutex<HashSet<String>>,
    posts: AtomicUsize,
    last_headers: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `address` answer status probes with `body`.
    pub fn station(&self, address: &str, body: Value) {
        self.statuses.lock().insert(address.to_string(), body);
    }

    pub fn unplug(&self, address: &str) {
        self.statuses.lock().remove(address);
    }

    /// Make status probes to `address` never complete.
    pub fn hang(&self, address: &str) {
        self.hanging.lock().insert(address.to_string());
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        self.replies.lock().insert(path.to_string(), reply);
    }

    /// Addresses probed so far, in order.
    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.last_headers.lock().clone()
    }
}

fn split(url: &str) -> (String, String) {
    let rest = url.trim_start_matches("http://");
    match rest.find('/') {
        Some(i) => (rest[..i].to_string(), rest[i..].to_string()),
        None => (rest.to_string(), String::new()),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &str, _timeout: Duration) -> Result<Value, TransportError> {
        let (address, _) = split(url);
        self.probes.lock().push(address.clone());
        let hangs = self.hanging.lock().contains(&address);
        if hangs {
            std::future::pending::<()>().await;
        }
        self.statuses
            .lock()
            .get(&address)
            .cloned()
            .ok_or_else(|| TransportError::Network(format!("connection refused: {address}")))
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &Value,
        headers: &[(&'static str, String)],
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock() = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        let (address, path) = split(url);
        if !self.statuses.lock().contains_key(&address) {
            return Err(TransportError::Network(format!("connection refused: {address}")));
        }
        let reply = self.replies.lock().get(&path).cloned();
        let Some(reply) = reply else {
            return Err(TransportError::Status {
                code: 404,
                body: r#"{"error":{"code":"NOT_FOUND","message":"no route"}}"#.to_string(),
            });
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
