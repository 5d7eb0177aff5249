//! Uplink Server
//!
//! Transport front for the synchronization engine: HTTP polling
//! endpoints plus the WebSocket push channel.

pub mod config;
pub mod http;
pub mod metrics;
pub mod provider;
pub mod push;

use std::sync::Arc;
use std::time::Instant;

use config::ServerConfig;
use http::AppState;
use metrics::ServerMetrics;
use provider::MemoryStateProvider;
use push::PushManager;
use uplink_core::{ResourceResolver, SessionRegistry, SyncEngine, TokenStore};

/// Wires the engine and shared state for a given configuration.
pub fn build_state(config: ServerConfig) -> AppState {
    let engine = SyncEngine::new(
        Arc::new(SessionRegistry::new()),
        Arc::new(TokenStore::new(config.csrf_protection)),
        Arc::new(MemoryStateProvider::new()),
    );
    let resolver = ResourceResolver::new(
        config.context_root.clone(),
        config.vaadin_dir.clone(),
        config.frontend_url.clone(),
        config.theme.clone(),
    );
    AppState {
        engine: Arc::new(engine),
        push: Arc::new(PushManager::new()),
        resolver,
        metrics: ServerMetrics::new(),
        config,
        start_time: Instant::now(),
    }
}
