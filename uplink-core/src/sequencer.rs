// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync-ID Sequencer
//!
//! Per-session ordering authority for both directions of the channel.
//! Server-to-client deltas carry a monotonically increasing sync id;
//! a client-reported gap moves the session to `Desynced` and the next
//! delta is forced to full state, re-baselining the client. The
//! client-to-server message id counter is independent and has no
//! full-resync escape: RPC invocations have side effects that cannot
//! be re-derived from a snapshot, so a gap there is a hard reject.

use thiserror::Error;

use crate::protocol::constants::IGNORE_SYNC_ID;

/// Ordering error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("client message id out of order: expected {expected}, got {actual}")]
    ClientOrdering { expected: i64, actual: i64 },
}

/// Synchronization phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No deltas sent yet; the first delta is a full snapshot.
    Fresh,
    /// Client acknowledged up to the last-sent delta.
    Synced,
    /// Gap detected; the next delta re-baselines with full state.
    Desynced,
}

/// Per-session sequencer state machine.
#[derive(Debug, Clone)]
pub struct Sequencer {
    phase: SyncPhase,
    last_sync_id: i64,
    expected_client_id: i64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Sequencer {
            phase: SyncPhase::Fresh,
            last_sync_id: 0,
            expected_client_id: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Sync id of the last delta assigned, 0 when fresh.
    pub fn last_sync_id(&self) -> i64 {
        self.last_sync_id
    }

    /// Next client message id the server will accept.
    pub fn expected_client_id(&self) -> i64 {
        self.expected_client_id
    }

    /// True when the next outbound delta must carry full state: either
    /// nothing was ever sent, or a gap forced a re-baseline.
    pub fn needs_full_state(&self) -> bool {
        matches!(self.phase, SyncPhase::Fresh | SyncPhase::Desynced)
    }

    /// Assigns the sync id for the next outbound delta.
    ///
    /// Always `last + 1`; the transition to `Synced` is optimistic.
    /// After a desync this is the baseline the client is told to adopt,
    /// so a single dropped packet cannot start an infinite resync loop.
    pub fn next_sync_id(&mut self) -> i64 {
        self.last_sync_id += 1;
        self.phase = SyncPhase::Synced;
        self.last_sync_id
    }

    /// Records the last-seen sync id reported by an inbound batch.
    ///
    /// A mismatch with the last-sent id means the client missed (or
    /// double-applied) a delta: the session goes `Desynced` and
    /// recovers via the next full-state delta. [`IGNORE_SYNC_ID`]
    /// skips the check entirely.
    pub fn observe_client_ack(&mut self, reported: i64) {
        if reported == IGNORE_SYNC_ID {
            return;
        }
        if self.phase == SyncPhase::Synced && reported != self.last_sync_id {
            self.phase = SyncPhase::Desynced;
        }
    }

    /// Accepts the next client message id, or rejects the batch.
    ///
    /// Strictly sequential: a repeat, regression or gap is a hard
    /// failure and the counter is left untouched.
    pub fn accept_client_id(&mut self, id: i64) -> Result<(), OrderingError> {
        if id != self.expected_client_id {
            return Err(OrderingError::ClientOrdering {
                expected: self.expected_client_id,
                actual: id,
            });
        }
        self.expected_client_id += 1;
        Ok(())
    }
}
