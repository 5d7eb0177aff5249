// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Synchronization Engine
//!
//! The single authority that, per session, serializes state mutation
//! and delta emission. An inbound batch holds the session's exclusive
//! lane for validation, application and delta computation; concurrent
//! operations for the same session queue behind it while other
//! sessions proceed in parallel.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::protocol::codec::{decode_batch, CodecError};
use crate::protocol::constants::CSRF_TOKEN_DEFAULT_VALUE;
use crate::protocol::message::{BatchAck, DeltaMessage, RpcInvocation, StateChange};
use crate::security::{SecurityError, TokenStore};
use crate::sequencer::OrderingError;
use crate::session::{DeliveryChannel, SessionError, SessionId, SessionRegistry};

/// A single invocation's application failed. Isolated: the rest of the
/// batch continues.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct InvocationFault(pub String);

/// Engine error types.
///
/// Only `Security` and `ClientOrdering` terminate the session; the
/// engine absorbs everything else as diagnostics or recovery state.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Protocol(#[from] CodecError),

    #[error(transparent)]
    ClientOrdering(#[from] OrderingError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Server-side component state, supplied by the UI framework.
///
/// The component model itself is outside the engine: the engine only
/// needs to apply invocations in order and snapshot the current tree.
pub trait StateProvider: Send + Sync {
    /// Applies one invocation, returning the state changes it caused.
    fn apply(
        &self,
        session: SessionId,
        invocation: &RpcInvocation,
    ) -> Result<Vec<StateChange>, InvocationFault>;

    /// Full snapshot of the session's current component tree.
    fn snapshot(&self, session: SessionId) -> Vec<StateChange>;
}

/// Everything a freshly bootstrapped client needs to start the channel.
#[derive(Debug, Clone)]
pub struct BootstrapInfo {
    pub session_id: SessionId,
    pub csrf_token: String,
    pub push_id: String,
}

/// The per-application synchronization engine.
pub struct SyncEngine {
    registry: Arc<SessionRegistry>,
    tokens: Arc<TokenStore>,
    provider: Arc<dyn StateProvider>,
}

impl SyncEngine {
    pub fn new(
        registry: Arc<SessionRegistry>,
        tokens: Arc<TokenStore>,
        provider: Arc<dyn StateProvider>,
    ) -> Self {
        SyncEngine {
            registry,
            tokens,
            provider,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Creates a session and issues its tokens.
    pub fn bootstrap(&self, widgetset_version: Option<String>) -> BootstrapInfo {
        let (session_id, handle) = self.registry.create();
        let csrf_token = self.tokens.issue(session_id);
        let push_id = self.tokens.issue_push_id(session_id);
        handle.lock().widgetset_version = widgetset_version;
        info!(%session_id, "session created");
        BootstrapInfo {
            session_id,
            csrf_token,
            push_id,
        }
    }

    /// Accepts an inbound RPC batch.
    ///
    /// Decode → CSRF → client ordering → ack bookkeeping → sequential
    /// invocation application → delta assignment. Returns the ack with
    /// the new sync id; the delta itself is fetched by whichever
    /// transport wins the delivery claim.
    pub fn receive(&self, session_id: SessionId, raw: &[u8]) -> Result<BatchAck, EngineError> {
        self.receive_with_header_token(session_id, raw, None)
    }

    /// Like [`SyncEngine::receive`], with a token the transport lifted
    /// from the request (the security key header). The batch body's own
    /// token wins when both are present.
    pub fn receive_with_header_token(
        &self,
        session_id: SessionId,
        raw: &[u8],
        header_token: Option<&str>,
    ) -> Result<BatchAck, EngineError> {
        let handle = self.registry.get(session_id)?;

        // Malformed payloads reject before any session mutation.
        let batch = decode_batch(raw)?;

        let presented = batch
            .csrf_token
            .as_deref()
            .or(header_token)
            .unwrap_or(CSRF_TOKEN_DEFAULT_VALUE);
        if let Err(violation) = self.tokens.validate(session_id, presented) {
            self.terminate(session_id, "security key mismatch");
            return Err(violation.into());
        }

        let mut session = handle.lock();
        session.touch();

        if let Err(gap) = session.sequencer.accept_client_id(batch.client_id) {
            // RPC side effects cannot be re-derived from a snapshot, so
            // a client-id gap is fatal to the session, not just the batch.
            drop(session);
            self.terminate(session_id, "client message id out of order");
            return Err(gap.into());
        }

        session.acknowledge_pending(batch.sync_id);
        session.sequencer.observe_client_ack(batch.sync_id);

        let mut changes = Vec::new();
        for invocation in &batch.invocations {
            match self.provider.apply(session_id, invocation) {
                Ok(mut caused) => {
                    session.revision += 1;
                    changes.append(&mut caused);
                }
                Err(fault) => {
                    // One component's defect must not freeze the rest
                    // of the UI: skip this invocation, keep the batch.
                    error!(
                        %session_id,
                        connector = %invocation.connector_id,
                        method = %invocation.method,
                        %fault,
                        "invocation fault, skipping"
                    );
                }
            }
        }

        let full_state = batch.resynchronize || session.sequencer.needs_full_state();
        if full_state {
            changes = self.provider.snapshot(session_id);
        }

        let sync_id = session.sequencer.next_sync_id();
        session.store_pending(DeltaMessage {
            sync_id,
            full_state,
            changes,
        });
        Ok(BatchAck { sync_id })
    }

    /// Refreshes session liveness. No state mutation beyond the clock.
    pub fn heartbeat(&self, session_id: SessionId) -> Result<(), EngineError> {
        let handle = self.registry.get(session_id)?;
        handle.lock().touch();
        Ok(())
    }

    /// Forces full-state recovery, bypassing the incremental diff.
    ///
    /// Idempotent: repeated without intervening client activity it
    /// returns the same full-state delta, same sync id included.
    pub fn resynchronize(&self, session_id: SessionId) -> Result<DeltaMessage, EngineError> {
        let handle = self.registry.get(session_id)?;
        let mut session = handle.lock();
        session.touch();

        if let Some(pending) = &session.pending {
            if pending.delta.full_state && pending.claimed_by().is_none() {
                return Ok(pending.delta.clone());
            }
        }

        let changes = self.provider.snapshot(session_id);
        let sync_id = session.sequencer.next_sync_id();
        let delta = DeltaMessage {
            sync_id,
            full_state: true,
            changes,
        };
        session.store_pending(delta.clone());
        info!(%session_id, sync_id, "resynchronizing with full state");
        Ok(delta)
    }

    /// Claims the session's pending delta for one transport. Only the
    /// first claimant gets it; see [`crate::session::PendingDelta`].
    pub fn claim_delivery(
        &self,
        session_id: SessionId,
        channel: DeliveryChannel,
    ) -> Result<Option<DeltaMessage>, EngineError> {
        let handle = self.registry.get(session_id)?;
        let claimed = handle.lock().claim_pending(channel);
        Ok(claimed)
    }

    /// Releases a timed-out delivery; the delta is retained for the
    /// next successful request.
    pub fn release_delivery(&self, session_id: SessionId) -> Result<(), EngineError> {
        let handle = self.registry.get(session_id)?;
        handle.lock().release_pending();
        Ok(())
    }

    /// Binds a new push connection: validates the presented push id,
    /// rotates it (invalidating the previous connection) and marks the
    /// push channel active. Returns the rotated id.
    pub fn push_connected(
        &self,
        session_id: SessionId,
        presented_push_id: &str,
    ) -> Result<String, EngineError> {
        self.registry.get(session_id)?;
        self.tokens.validate_push_id(session_id, presented_push_id)?;
        let rotated = self.tokens.issue_push_id(session_id);

        let handle = self.registry.get(session_id)?;
        handle.lock().push_active = true;
        info!(%session_id, "push connection established");
        Ok(rotated)
    }

    /// Push connection dropped: fall back to polling. A delta the push
    /// channel had claimed but may not have sent is released so the
    /// next UIDL request delivers it.
    pub fn push_disconnected(&self, session_id: SessionId) {
        if let Ok(handle) = self.registry.get(session_id) {
            let mut session = handle.lock();
            session.push_active = false;
            session.release_pending_if(DeliveryChannel::Push);
            info!(%session_id, "push connection lost, falling back to polling");
        }
    }

    /// Explicitly closes a session.
    pub fn close(&self, session_id: SessionId) {
        self.terminate(session_id, "closed");
    }

    fn terminate(&self, session_id: SessionId, reason: &str) {
        if self.registry.remove(session_id) {
            self.tokens.revoke(session_id);
            info!(%session_id, reason, "session terminated");
        }
    }
}
