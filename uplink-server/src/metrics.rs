//! Prometheus Metrics
//!
//! Counters and gauges for the transport front, exposed on `/metrics`.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metrics handle, cheap to clone.
#[derive(Clone)]
pub struct ServerMetrics {
    registry: Registry,
    pub sessions_active: IntGauge,
    pub sessions_expired: IntCounter,
    pub requests: IntCounterVec,
    pub push_connections_active: IntGauge,
    pub resyncs: IntCounter,
    pub rejected_batches: IntCounter,
}

impl ServerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let sessions_active =
            IntGauge::new("uplink_sessions_active", "Live sessions").expect("metric");
        let sessions_expired = IntCounter::new(
            "uplink_sessions_expired_total",
            "Sessions expired after missed heartbeats",
        )
        .expect("metric");
        let requests = IntCounterVec::new(
            Opts::new("uplink_requests_total", "Requests per endpoint"),
            &["endpoint"],
        )
        .expect("metric");
        let push_connections_active =
            IntGauge::new("uplink_push_connections_active", "Active push connections")
                .expect("metric");
        let resyncs = IntCounter::new(
            "uplink_resyncs_total",
            "Forced full-state resynchronizations",
        )
        .expect("metric");
        let rejected_batches = IntCounter::new(
            "uplink_rejected_batches_total",
            "RPC batches rejected for security, protocol or ordering reasons",
        )
        .expect("metric");

        for collector in [
            Box::new(sessions_active.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(sessions_expired.clone()),
            Box::new(requests.clone()),
            Box::new(push_connections_active.clone()),
            Box::new(resyncs.clone()),
            Box::new(rejected_batches.clone()),
        ] {
            registry.register(collector).expect("metric registration");
        }

        ServerMetrics {
            registry,
            sessions_active,
            sessions_expired,
            requests,
            push_connections_active,
            resyncs,
            rejected_batches,
        }
    }

    /// Renders the registry in the Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
