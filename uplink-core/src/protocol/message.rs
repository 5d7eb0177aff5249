// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Protocol Message Types
//!
//! Wire types for the UIDL channel: server-produced delta messages and
//! client-produced RPC invocation batches. Field renames follow the
//! identifiers in [`super::constants`]; `codec` tests assert the two
//! stay in agreement.

use serde::{Deserialize, Serialize};

use super::constants::IGNORE_SYNC_ID;

/// A single component-state change inside a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    /// Connector (component) the change applies to.
    #[serde(rename = "connectorId")]
    pub connector_id: String,
    /// State property being changed.
    pub property: String,
    /// New value. String values carrying a reserved protocol prefix are
    /// resolved to concrete URLs at encode time.
    pub value: serde_json::Value,
}

impl StateChange {
    pub fn new(
        connector_id: impl Into<String>,
        property: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        StateChange {
            connector_id: connector_id.into(),
            property: property.into(),
            value,
        }
    }
}

/// Server-produced, ordered delta message.
///
/// Brings the client from its last-applied revision to `sync_id`. A
/// client must never apply a delta whose sync id is not exactly one
/// greater than its last-applied id, except when `full_state` is set,
/// in which case the client adopts `sync_id` as its new baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaMessage {
    /// Revision this delta brings the client to.
    #[serde(rename = "syncId")]
    pub sync_id: i64,
    /// Full-state flag: the change list is a complete snapshot, not an
    /// increment (the `repaintAll` semantics).
    #[serde(rename = "repaintAll", default)]
    pub full_state: bool,
    /// Ordered component-state changes.
    pub changes: Vec<StateChange>,
}

/// A single RPC invocation within a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcInvocation {
    /// Target connector (component) id.
    #[serde(rename = "connectorId")]
    pub connector_id: String,
    /// Method name on the target.
    pub method: String,
    /// Invocation arguments, as self-describing JSON values.
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

/// Client-produced, ordered RPC invocation batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcBatch {
    /// CSRF token accompanying the batch.
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
    /// Client message id, monotonic per session.
    #[serde(rename = "clientId")]
    pub client_id: i64,
    /// Last server sync id the client has applied, or
    /// [`IGNORE_SYNC_ID`] to skip the ordering check.
    #[serde(rename = "syncId")]
    pub sync_id: i64,
    /// Explicit resynchronization request.
    #[serde(rename = "resynchronize", default)]
    pub resynchronize: bool,
    /// Widget set version reported by the client, if any.
    #[serde(rename = "wsver", default, skip_serializing_if = "Option::is_none")]
    pub widgetset_version: Option<String>,
    /// Ordered invocations to apply.
    #[serde(rename = "rpc", default)]
    pub invocations: Vec<RpcInvocation>,
}

impl RpcBatch {
    /// True when the batch asks the server to skip the sync id check.
    pub fn ignores_sync_id(&self) -> bool {
        self.sync_id == IGNORE_SYNC_ID
    }
}

/// Acknowledgment returned for an accepted RPC batch, carrying the sync
/// id of the delta the batch produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchAck {
    #[serde(rename = "syncId")]
    pub sync_id: i64,
}
