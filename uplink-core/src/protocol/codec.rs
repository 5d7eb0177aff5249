// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! UIDL Message Codec
//!
//! Serializes delta messages to the wire and parses inbound RPC
//! batches. Encoding is deterministic for identical input. Decoding a
//! malformed payload fails without touching any session state; callers
//! decode before mutating anything.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::message::{DeltaMessage, RpcBatch, StateChange};
use crate::resource::ResourceResolver;

/// Codec error types.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Outbound frame: a delta plus the transport-level fields that only
/// the codec knows when to include.
#[derive(Serialize)]
struct WireDelta<'a> {
    #[serde(rename = "syncId")]
    sync_id: i64,
    #[serde(rename = "repaintAll", skip_serializing_if = "is_false")]
    full_state: bool,
    changes: &'a [StateChange],
    /// Included only at the transport's authentication point (the
    /// bootstrap response), never on routine deltas.
    #[serde(rename = "csrfToken", skip_serializing_if = "Option::is_none")]
    csrf_token: Option<&'a str>,
}

fn is_false(v: &bool) -> bool {
    !v
}

/// Encodes a delta for transmission.
///
/// Every string state value carrying a reserved protocol prefix is
/// resolved exactly once through `resolver`. A change whose reference
/// cannot be resolved is dropped from the delta with a diagnostic;
/// rendering degrades but the session continues.
pub fn encode_delta(
    delta: &DeltaMessage,
    csrf_token: Option<&str>,
    resolver: &ResourceResolver,
) -> Result<Vec<u8>, CodecError> {
    let mut changes = Vec::with_capacity(delta.changes.len());
    for change in &delta.changes {
        match resolve_change(change, resolver) {
            Ok(resolved) => changes.push(resolved),
            Err(err) => {
                warn!(
                    connector = %change.connector_id,
                    property = %change.property,
                    %err,
                    "dropping state change with unresolvable resource reference"
                );
            }
        }
    }

    let frame = WireDelta {
        sync_id: delta.sync_id,
        full_state: delta.full_state,
        changes: &changes,
        csrf_token,
    };
    serde_json::to_vec(&frame).map_err(|e| CodecError::ProtocolViolation(e.to_string()))
}

/// Resolves the resource references of a single change, if any.
fn resolve_change(
    change: &StateChange,
    resolver: &ResourceResolver,
) -> Result<StateChange, crate::resource::ResourceError> {
    let value = match &change.value {
        serde_json::Value::String(s) => {
            serde_json::Value::String(resolver.resolve(s)?)
        }
        other => other.clone(),
    };
    Ok(StateChange {
        connector_id: change.connector_id.clone(),
        property: change.property.clone(),
        value,
    })
}

/// Parses an inbound RPC batch.
///
/// Fails with [`CodecError::ProtocolViolation`] on malformed input;
/// performs no session mutation of any kind.
pub fn decode_batch(raw: &[u8]) -> Result<RpcBatch, CodecError> {
    serde_json::from_slice(raw).map_err(|e| CodecError::ProtocolViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{
        CLIENT_TO_SERVER_ID, CSRF_TOKEN, RESYNCHRONIZE_ID, RPC_INVOCATIONS, SERVER_SYNC_ID,
        URL_PARAMETER_REPAINT_ALL, WIDGETSET_VERSION_ID,
    };

    fn resolver() -> ResourceResolver {
        ResourceResolver::new("/app", "/app/VAADIN", "vaadin://frontend", "valo")
    }

    fn sample_delta() -> DeltaMessage {
        DeltaMessage {
            sync_id: 7,
            full_state: false,
            changes: vec![
                StateChange::new("5", "caption", serde_json::json!("Save")),
                StateChange::new("5", "icon", serde_json::json!("theme://img/save.png")),
            ],
        }
    }

    #[test]
    fn test_encode_resolves_references() {
        let bytes = encode_delta(&sample_delta(), None, &resolver()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value["changes"][1]["value"],
            "/app/VAADIN/themes/valo/img/save.png"
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let delta = sample_delta();
        let a = encode_delta(&delta, None, &resolver()).unwrap();
        let b = encode_delta(&delta, None, &resolver()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_drops_unresolvable_reference() {
        let mut delta = sample_delta();
        delta
            .changes
            .push(StateChange::new("9", "icon", serde_json::json!("gopher://x")));

        let bytes = encode_delta(&delta, None, &resolver()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        // The bad reference is dropped, the rest of the delta survives.
        assert_eq!(value["changes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_encode_includes_token_only_when_given() {
        let delta = sample_delta();
        let without = encode_delta(&delta, None, &resolver()).unwrap();
        let with = encode_delta(&delta, Some("abc123"), &resolver()).unwrap();

        let without: serde_json::Value = serde_json::from_slice(&without).unwrap();
        let with: serde_json::Value = serde_json::from_slice(&with).unwrap();
        assert!(without.get(CSRF_TOKEN).is_none());
        assert_eq!(with[CSRF_TOKEN], "abc123");
    }

    #[test]
    fn test_decode_batch_round() {
        let raw = format!(
            r#"{{"{CSRF_TOKEN}":"tok","{CLIENT_TO_SERVER_ID}":0,"{SERVER_SYNC_ID}":3,
               "{RPC_INVOCATIONS}":[{{"connectorId":"12","method":"click","arguments":[true]}}]}}"#
        );
        let batch = decode_batch(raw.as_bytes()).unwrap();
        assert_eq!(batch.client_id, 0);
        assert_eq!(batch.sync_id, 3);
        assert!(!batch.resynchronize);
        assert_eq!(batch.invocations.len(), 1);
        assert_eq!(batch.invocations[0].method, "click");
    }

    #[test]
    fn test_decode_malformed_is_protocol_violation() {
        let err = decode_batch(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::ProtocolViolation(_)));

        // Missing required fields is also malformed.
        let err = decode_batch(b"{}").unwrap_err();
        assert!(matches!(err, CodecError::ProtocolViolation(_)));
    }

    /// The serde renames on the wire types must match the constants
    /// module byte-for-byte; interop depends on it.
    #[test]
    fn test_wire_field_names_match_constants() {
        let batch = RpcBatch {
            csrf_token: Some("t".into()),
            client_id: 1,
            sync_id: 2,
            resynchronize: true,
            widgetset_version: Some("8.9".into()),
            invocations: vec![],
        };
        let value = serde_json::to_value(&batch).unwrap();
        for key in [
            CSRF_TOKEN,
            CLIENT_TO_SERVER_ID,
            SERVER_SYNC_ID,
            RESYNCHRONIZE_ID,
            WIDGETSET_VERSION_ID,
            RPC_INVOCATIONS,
        ] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }

        let delta = serde_json::to_value(DeltaMessage {
            sync_id: 1,
            full_state: true,
            changes: vec![],
        })
        .unwrap();
        assert!(delta.get(SERVER_SYNC_ID).is_some());
        assert!(delta.get(URL_PARAMETER_REPAINT_ALL).is_some());
    }
}
