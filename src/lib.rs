//! Station Gateway
//!
//! Client and server halves of a multimodal request gateway for an offline
//! edge AI station.
//!
//! - **Client**: finds the station on the local network, classifies each
//!   request with a priority and timeout tier, runs the two-stage vision
//!   pipeline, and caches results by content.
//! - **Server**: admits requests under a bounded concurrency ceiling with a
//!   priority wait queue, and answers them from an inference engine.
//!
//! [`Gateway`] wires the client half together. The station server lives in
//! [`server`].

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod station;
pub mod telemetry;
pub mod vision;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cache::ResultCache;
use client::{RequestDispatcher, Transport};
use config::Config;
use error::GatewayResult;
use station::{CapabilityRegistry, HealthMonitor, StationResolver, StationStore};
use vision::VisionPipeline;

/// Client-side object graph: one resolver, dispatcher, cache and pipeline.
pub struct Gateway {
    pub resolver: Arc<StationResolver>,
    pub dispatcher: Arc<RequestDispatcher>,
    pub cache: Arc<ResultCache>,
    pub pipeline: Arc<VisionPipeline>,
    cache_file: PathBuf,
}

impl Gateway {
    /// Build the graph. The cache snapshot in the state directory is loaded
    /// if present.
    pub fn new(config: &Config, transport: Arc<dyn Transport>, store: Arc<dyn StationStore>) -> Self {
        let client = &config.client;
        let registry = Arc::new(CapabilityRegistry::new());
        let resolver = Arc::new(StationResolver::new(
            client.discovery.clone(),
            Arc::clone(&transport),
            store,
            registry,
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&resolver),
            transport,
            client.timeouts,
        ));
        let cache_file = config.cache_file();
        let cache = Arc::new(ResultCache::load(&cache_file, client.cache));
        let pipeline = Arc::new(VisionPipeline::new(Arc::clone(&dispatcher), Arc::clone(&cache)));

        Self {
            resolver,
            dispatcher,
            cache,
            pipeline,
            cache_file,
        }
    }

    /// Re-probe the current station periodically until `shutdown` fires.
    pub fn spawn_health_monitor(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        HealthMonitor::spawn(
            Arc::clone(&self.resolver),
            self.resolver.config().health_interval,
            shutdown,
        )
    }

    /// Write the result cache to the state directory.
    pub fn persist_cache(&self) -> GatewayResult<()> {
        self.cache.save(&self.cache_file)
    }
}
