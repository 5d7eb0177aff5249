//! Server Configuration
//!
//! All settings come from the environment with sensible defaults, so a
//! bare `uplink-server` starts a local instance.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for the transport front.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the HTTP endpoints (APP, UIDL, HEARTBEAT, health).
    pub http_addr: SocketAddr,
    /// Address of the WebSocket PUSH listener.
    pub push_addr: SocketAddr,
    /// Application-wide CSRF protection toggle. Disabling accepts only
    /// the reserved default token value.
    pub csrf_protection: bool,
    /// Interval at which clients are expected to heartbeat.
    pub heartbeat_interval: Duration,
    /// Heartbeats a session may miss before it is expired.
    pub max_missed_heartbeats: u32,
    /// Context root URL for resource resolution.
    pub context_root: String,
    /// Framework directory URL (themes, widget sets).
    pub vaadin_dir: String,
    /// Base URL `frontend://` resolves against.
    pub frontend_url: String,
    /// Active theme name.
    pub theme: String,
    /// Widget set version the server was built against; clients
    /// reporting another version get a warning, not a rejection.
    pub widgetset_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            http_addr: "127.0.0.1:8080".parse().expect("static addr"),
            push_addr: "127.0.0.1:8082".parse().expect("static addr"),
            csrf_protection: true,
            heartbeat_interval: Duration::from_secs(300),
            max_missed_heartbeats: 3,
            context_root: "/".into(),
            vaadin_dir: "/VAADIN/".into(),
            frontend_url: "vaadin://frontend/".into(),
            theme: "valo".into(),
            widgetset_version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `UPLINK_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = ServerConfig::default();
        ServerConfig {
            http_addr: env_parse("UPLINK_HTTP_ADDR", defaults.http_addr),
            push_addr: env_parse("UPLINK_PUSH_ADDR", defaults.push_addr),
            csrf_protection: env_parse("UPLINK_CSRF_PROTECTION", defaults.csrf_protection),
            heartbeat_interval: Duration::from_secs(env_parse(
                "UPLINK_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval.as_secs(),
            )),
            max_missed_heartbeats: env_parse(
                "UPLINK_MAX_MISSED_HEARTBEATS",
                defaults.max_missed_heartbeats,
            ),
            context_root: env_string("UPLINK_CONTEXT_ROOT", defaults.context_root),
            vaadin_dir: env_string("UPLINK_VAADIN_DIR", defaults.vaadin_dir),
            frontend_url: env_string("UPLINK_FRONTEND_URL", defaults.frontend_url),
            theme: env_string("UPLINK_THEME", defaults.theme),
            widgetset_version: env_string("UPLINK_WIDGETSET_VERSION", defaults.widgetset_version),
        }
    }

    /// Idle timeout after which a session counts as expired.
    pub fn session_timeout(&self) -> Duration {
        self.heartbeat_interval * self.max_missed_heartbeats
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = ServerConfig::default();
        assert!(config.csrf_protection);
        assert_eq!(config.session_timeout(), Duration::from_secs(900));
    }
}
