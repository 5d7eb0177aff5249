//! WebSocket PUSH Endpoint
//!
//! Long-lived bidirectional channel, one per session at most. The
//! client presents its push id on connect; a successful handshake
//! rotates the id and displaces any previous connection for the same
//! session. Deltas go out as JSON text frames; inbound frames are RPC
//! batches, same wire format as UIDL polling.

use std::collections::HashMap;
use std::sync::Mutex;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use uuid::Uuid;

use uplink_core::protocol::constants::{PUSH_ID_PARAMETER, UIDL_PUSH_ID_HEADER};
use uplink_core::{encode_delta, DeliveryChannel, SessionId};

use crate::http::AppState;

/// Identifies one physical push connection within its session, so a
/// displaced connection's teardown cannot touch its replacement.
type ConnectionId = Uuid;

struct Registration {
    connection: ConnectionId,
    sender: mpsc::UnboundedSender<Message>,
}

/// Registry of active push connections, keyed by session.
///
/// The map holds the channel's only sender. Registering a session
/// drops the previous registration's sender, so the displaced
/// connection's forward loop sees the channel close and exits: at most
/// one active push per session.
pub struct PushManager {
    registrations: Mutex<HashMap<SessionId, Registration>>,
}

impl PushManager {
    pub fn new() -> Self {
        PushManager {
            registrations: Mutex::new(HashMap::new()),
        }
    }

    fn register(
        &self,
        session: SessionId,
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut registrations = self.lock();
        registrations.insert(session, Registration { connection, sender });
    }

    /// Removes the session's registration, but only if `connection` is
    /// still the registered one. Returns whether it was: a displaced
    /// connection must not unregister (or report the loss of) its
    /// replacement.
    fn unregister(&self, session: SessionId, connection: ConnectionId) -> bool {
        let mut registrations = self.lock();
        if registrations
            .get(&session)
            .is_some_and(|current| current.connection == connection)
        {
            registrations.remove(&session);
            true
        } else {
            false
        }
    }

    /// Queues a frame for the session's push connection.
    pub fn send(&self, session: SessionId, message: Message) -> Result<(), ()> {
        let registrations = self.lock();
        match registrations.get(&session) {
            Some(registration) => registration.sender.send(message).map_err(|_| ()),
            None => Err(()),
        }
    }

    /// Whether the session currently has a push connection.
    pub fn is_connected(&self, session: SessionId) -> bool {
        self.lock().contains_key(&session)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Registration>> {
        self.registrations.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PushManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept loop for the push listener.
pub async fn run_push_listener(listener: TcpListener, state: AppState) {
    while let Ok((stream, addr)) = listener.accept().await {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(reason) = handle_push_connection(stream, state).await {
                info!(%addr, reason, "push connection rejected");
            }
        });
    }
}

/// Handles one push connection from handshake to disconnect.
async fn handle_push_connection(stream: TcpStream, state: AppState) -> Result<(), &'static str> {
    // Capture the request query and push id header during the
    // WebSocket handshake.
    let mut query = String::new();
    let mut header_push_id = None;
    let ws_stream = accept_hdr_async(stream, |request: &Request, response: Response| {
        query = request.uri().query().unwrap_or("").to_string();
        header_push_id = request
            .headers()
            .get(UIDL_PUSH_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(response)
    })
    .await
    .map_err(|_| "websocket handshake failed")?;

    let session = query_param(&query, "sessionId")
        .and_then(|v| Uuid::parse_str(&v).ok())
        .ok_or("missing or malformed sessionId")?;
    // The push id travels as a URL parameter or as a request header.
    let push_id = query_param(&query, PUSH_ID_PARAMETER)
        .or(header_push_id)
        .ok_or("missing push id")?;

    // Validates and rotates the push id; a replay of an old id fails here.
    let rotated = state
        .engine
        .push_connected(session, &push_id)
        .map_err(|_| "push id rejected")?;

    let connection = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.push.register(session, connection, tx);
    state.metrics.push_connections_active.inc();
    info!(%session, "push connection open");

    let (mut sink, mut source) = ws_stream.split();

    // Handshake frame carries the rotated push id for the next connect.
    let handshake = serde_json::json!({ PUSH_ID_PARAMETER: rotated }).to_string();
    if sink.send(Message::Text(handshake)).await.is_err() {
        finish_connection(&state, session, connection);
        return Err("handshake frame failed");
    }

    loop {
        tokio::select! {
            queued = rx.recv() => {
                match queued {
                    // The map held our only sender; `None` means a newer
                    // push connection for this session displaced us.
                    None => break,
                    Some(frame) => {
                        if sink.send(frame).await.is_err() {
                            break;
                        }
                    }
                }
            }
            inbound = source.next() => {
                match inbound {
                    Some(Ok(Message::Text(raw))) => {
                        if !handle_inbound_batch(&state, session, raw.as_bytes()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(raw))) => {
                        if !handle_inbound_batch(&state, session, &raw).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by tungstenite
                    Some(Err(e)) => {
                        warn!(%session, error = %e, "push read error");
                        break;
                    }
                }
            }
        }
    }

    finish_connection(&state, session, connection);
    info!(%session, "push connection closed");
    Ok(())
}

/// Tears down one connection. Only the connection still registered for
/// the session reports the push channel lost; a displaced connection's
/// close must not release a delivery claim held by its replacement.
fn finish_connection(state: &AppState, session: SessionId, connection: ConnectionId) {
    if state.push.unregister(session, connection) {
        state.engine.push_disconnected(session);
    }
    state.metrics.push_connections_active.dec();
}

/// Processes an RPC batch arriving over the push channel. Returns false
/// when the connection should close (session terminated).
async fn handle_inbound_batch(state: &AppState, session: SessionId, raw: &[u8]) -> bool {
    match state.engine.receive(session, raw) {
        Ok(_) => {}
        Err(err) => {
            state.metrics.rejected_batches.inc();
            warn!(%session, error = %err, "batch rejected on push channel");
            // Security and client-ordering violations have already
            // terminated the session; drop the connection.
            return state.engine.registry().get(session).is_ok();
        }
    }

    match state.engine.claim_delivery(session, DeliveryChannel::Push) {
        Ok(Some(delta)) => {
            match encode_delta(&delta, None, &state.resolver) {
                Ok(bytes) => {
                    let frame = Message::Text(String::from_utf8_lossy(&bytes).into_owned());
                    if state.push.send(session, frame).is_err() {
                        state.engine.push_disconnected(session);
                        return false;
                    }
                }
                Err(err) => warn!(%session, error = %err, "delta encode failed"),
            }
            true
        }
        Ok(None) => true,
        Err(_) => false,
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::metrics::ServerMetrics;
    use crate::provider::MemoryStateProvider;
    use std::sync::Arc;
    use std::time::Instant;
    use uplink_core::{ResourceResolver, SessionRegistry, SyncEngine, TokenStore};

    fn test_state() -> AppState {
        let config = ServerConfig::default();
        AppState {
            engine: Arc::new(SyncEngine::new(
                Arc::new(SessionRegistry::new()),
                Arc::new(TokenStore::new(config.csrf_protection)),
                Arc::new(MemoryStateProvider::new()),
            )),
            push: Arc::new(PushManager::new()),
            resolver: ResourceResolver::new(
                config.context_root.clone(),
                config.vaadin_dir.clone(),
                config.frontend_url.clone(),
                config.theme.clone(),
            ),
            metrics: ServerMetrics::new(),
            config,
            start_time: Instant::now(),
        }
    }

    #[test]
    fn test_query_param_parsing() {
        let query = "sessionId=abc&v-pushId=123";
        assert_eq!(query_param(query, "sessionId").as_deref(), Some("abc"));
        assert_eq!(query_param(query, PUSH_ID_PARAMETER).as_deref(), Some("123"));
        assert_eq!(query_param(query, "missing"), None);
    }

    #[test]
    fn test_new_registration_displaces_previous() {
        let manager = PushManager::new();
        let session = Uuid::new_v4();
        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        manager.register(session, old_conn, old_tx);
        manager.register(session, new_conn, new_tx);

        // Displacement dropped the old connection's only sender, which
        // is what makes its forward loop exit.
        assert_eq!(
            old_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );

        manager.send(session, Message::Text("hi".into())).unwrap();
        assert!(new_rx.try_recv().is_ok());

        // The displaced connection cannot unregister its replacement.
        assert!(!manager.unregister(session, old_conn));
        assert!(manager.is_connected(session));

        assert!(manager.unregister(session, new_conn));
        assert!(!manager.is_connected(session));
    }

    /// A displaced connection's late close must not release the
    /// delivery claim held by its live replacement, or polling would
    /// resend a sync id the replacement already pushed.
    #[test]
    fn test_displaced_connection_close_keeps_push_claim() {
        let state = test_state();
        let info = state.engine.bootstrap(None);
        let session = info.session_id;
        state.engine.push_connected(session, &info.push_id).unwrap();

        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        state.push.register(session, old_conn, old_tx);
        state.push.register(session, new_conn, new_tx);

        // The live connection claims and sends the pending delta.
        let batch = serde_json::json!({
            "csrfToken": info.csrf_token,
            "clientId": 0,
            "syncId": 0,
            "rpc": [],
        });
        state
            .engine
            .receive(session, batch.to_string().as_bytes())
            .unwrap();
        let sent = state
            .engine
            .claim_delivery(session, DeliveryChannel::Push)
            .unwrap();
        assert!(sent.is_some());

        // Now the displaced connection's socket finally closes.
        state.metrics.push_connections_active.inc();
        finish_connection(&state, session, old_conn);

        // The claim survives; polling must not get the same sync id.
        assert!(state.push.is_connected(session));
        let via_polling = state
            .engine
            .claim_delivery(session, DeliveryChannel::Polling)
            .unwrap();
        assert!(via_polling.is_none());

        // The live connection's own close still falls back to polling.
        state.metrics.push_connections_active.inc();
        finish_connection(&state, session, new_conn);
        assert!(!state.push.is_connected(session));
        let released = state
            .engine
            .claim_delivery(session, DeliveryChannel::Polling)
            .unwrap();
        assert!(released.is_some());
    }
}
