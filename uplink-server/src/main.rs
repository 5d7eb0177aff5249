//! Uplink Server
//!
//! Transport front for the UI state synchronization engine. Provides:
//! - HTTP endpoints for bootstrap, UIDL polling and heartbeats
//! - WebSocket endpoint for push delta delivery
//! - Session expiry sweeping after missed heartbeats
//! - Health checks and Prometheus metrics

use tokio::net::TcpListener;
use tracing::info;

use uplink_server::config::ServerConfig;
use uplink_server::http::create_router;
use uplink_server::push::run_push_listener;
use uplink_server::build_state;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uplink_server=info".parse().unwrap())
                .add_directive("uplink_core=info".parse().unwrap()),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env();
    info!("Starting Uplink Server v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP (APP/UIDL/HEARTBEAT): {}", config.http_addr);
    info!("Push (WebSocket): {}", config.push_addr);
    info!("CSRF protection: {}", config.csrf_protection);

    let state = build_state(config.clone());

    // Start HTTP server for the polling endpoints
    let http_listener = TcpListener::bind(&config.http_addr)
        .await
        .expect("Failed to bind HTTP listener");
    let router = create_router(state.clone());
    let http_addr = config.http_addr;
    tokio::spawn(async move {
        info!("HTTP server listening on {}", http_addr);
        axum::serve(http_listener, router).await.unwrap();
    });

    // Start session expiry sweep
    let sweep_state = state.clone();
    let sweep_interval = config.heartbeat_interval;
    let session_timeout = config.session_timeout();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            let expired = sweep_state.engine.registry().expire_idle(session_timeout);
            if !expired.is_empty() {
                info!("Expired {} idle sessions", expired.len());
                for session in &expired {
                    sweep_state.engine.tokens().revoke(*session);
                }
                sweep_state
                    .metrics
                    .sessions_expired
                    .inc_by(expired.len() as u64);
                sweep_state
                    .metrics
                    .sessions_active
                    .set(sweep_state.engine.registry().len() as i64);
            }
        }
    });

    // Accept push connections on the dedicated listener
    let push_listener = TcpListener::bind(&config.push_addr)
        .await
        .expect("Failed to bind push listener");
    info!("Push server listening on {}", config.push_addr);
    run_push_listener(push_listener, state).await;
}
