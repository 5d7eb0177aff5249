// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Model and Registry
//!
//! One session per browser tab/window, owned exclusively by the server.
//! Each session has a single exclusive lane: all engine operations for
//! a session run under its mutex, while different sessions proceed
//! concurrently. The registry itself is a read-heavy map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

use crate::protocol::message::DeltaMessage;
use crate::sequencer::Sequencer;

/// Session identifier.
pub type SessionId = Uuid;

/// Session error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no such session")]
    NotFound,
}

/// Transport a delta can be delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// UIDL request/response polling.
    Polling,
    /// Long-lived push connection.
    Push,
}

/// A computed but not yet acknowledged delta, with its delivery claim.
///
/// At most one transport may actually send a given sync id. The first
/// channel to claim the delta wins; the other sees nothing. A timed-out
/// delivery releases the claim without discarding the delta.
#[derive(Debug, Clone)]
pub struct PendingDelta {
    pub delta: DeltaMessage,
    claimed_by: Option<DeliveryChannel>,
}

impl PendingDelta {
    fn new(delta: DeltaMessage) -> Self {
        PendingDelta {
            delta,
            claimed_by: None,
        }
    }

    pub fn claimed_by(&self) -> Option<DeliveryChannel> {
        self.claimed_by
    }
}

/// Mutable per-session state. Accessed only through the session mutex.
#[derive(Debug)]
pub struct SessionState {
    pub id: SessionId,
    pub sequencer: Sequencer,
    /// Component-tree revision; bumped per applied invocation.
    pub revision: u64,
    /// Last computed delta awaiting acknowledgment.
    pub pending: Option<PendingDelta>,
    /// Whether a push connection is currently bound to the session.
    pub push_active: bool,
    /// Widget set version the client reported at bootstrap.
    pub widgetset_version: Option<String>,
    last_heartbeat: Instant,
}

impl SessionState {
    fn new(id: SessionId) -> Self {
        SessionState {
            id,
            sequencer: Sequencer::new(),
            revision: 0,
            pending: None,
            push_active: false,
            widgetset_version: None,
            last_heartbeat: Instant::now(),
        }
    }

    /// Refreshes the liveness clock.
    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// True once the session has missed heartbeats beyond `timeout`.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() > timeout
    }

    /// Stores a freshly computed delta as pending, unclaimed.
    pub fn store_pending(&mut self, delta: DeltaMessage) {
        self.pending = Some(PendingDelta::new(delta));
    }

    /// Claims the pending delta for one transport.
    ///
    /// Returns the delta only to the first claimant; a later claim by
    /// the other channel returns `None`, which is what guarantees a
    /// sync id is sent at most once even while push and polling race.
    pub fn claim_pending(&mut self, channel: DeliveryChannel) -> Option<DeltaMessage> {
        let pending = self.pending.as_mut()?;
        match pending.claimed_by {
            None => {
                pending.claimed_by = Some(channel);
                Some(pending.delta.clone())
            }
            Some(owner) if owner == channel => Some(pending.delta.clone()),
            Some(_) => None,
        }
    }

    /// Releases a failed delivery so the next successful request can
    /// pick the delta up. The delta itself is retained.
    pub fn release_pending(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.claimed_by = None;
        }
    }

    /// Releases the claim only if `channel` holds it. Used when a push
    /// connection drops with a possibly-unsent delta.
    pub fn release_pending_if(&mut self, channel: DeliveryChannel) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.claimed_by == Some(channel) {
                pending.claimed_by = None;
            }
        }
    }

    /// Drops the pending delta once the client has acknowledged it.
    pub fn acknowledge_pending(&mut self, reported_sync_id: i64) {
        if let Some(pending) = &self.pending {
            if pending.delta.sync_id <= reported_sync_id {
                self.pending = None;
            }
        }
    }
}

/// Handle wrapping a session's exclusive lane.
pub struct SessionHandle {
    state: Mutex<SessionState>,
}

impl SessionHandle {
    fn new(state: SessionState) -> Self {
        SessionHandle {
            state: Mutex::new(state),
        }
    }

    /// Takes the session's exclusive lane. Holding the guard excludes
    /// every other operation on the same session; a poisoned lock is
    /// recovered since session state stays consistent per operation.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a session and returns its id and handle.
    pub fn create(&self) -> (SessionId, Arc<SessionHandle>) {
        let id = Uuid::new_v4();
        let handle = Arc::new(SessionHandle::new(SessionState::new(id)));
        let mut sessions = self.write();
        sessions.insert(id, handle.clone());
        (id, handle)
    }

    /// Looks up a session handle.
    pub fn get(&self, id: SessionId) -> Result<Arc<SessionHandle>, SessionError> {
        self.read().get(&id).cloned().ok_or(SessionError::NotFound)
    }

    /// Destroys a session. Returns true if it existed.
    pub fn remove(&self, id: SessionId) -> bool {
        self.write().remove(&id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes sessions whose heartbeats stopped longer than `timeout`
    /// ago. Returns the ids removed, so the caller can revoke tokens.
    pub fn expire_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let expired: Vec<SessionId> = self
            .read()
            .iter()
            .filter(|(_, handle)| handle.lock().is_expired(timeout))
            .map(|(id, _)| *id)
            .collect();

        if !expired.is_empty() {
            let mut sessions = self.write();
            for id in &expired {
                sessions.remove(id);
            }
        }
        expired
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Arc<SessionHandle>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Arc<SessionHandle>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}
