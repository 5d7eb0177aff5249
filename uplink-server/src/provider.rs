//! In-Memory State Provider
//!
//! The component model proper lives in the UI framework embedding this
//! server; the binary ships a minimal property-tree provider so the
//! channel is exercisable end to end (and in tests) without one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use uplink_core::engine::{InvocationFault, StateProvider};
use uplink_core::{RpcInvocation, SessionId, StateChange};

type PropertyTree = BTreeMap<(String, String), serde_json::Value>;

/// Per-session property tree held in memory.
///
/// Understands a single RPC method, `setProperty(name, value)`, which
/// is enough to drive the delta channel; anything else is an
/// invocation fault (isolated by the engine, not fatal).
pub struct MemoryStateProvider {
    trees: Mutex<HashMap<SessionId, PropertyTree>>,
}

impl MemoryStateProvider {
    pub fn new() -> Self {
        MemoryStateProvider {
            trees: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProvider for MemoryStateProvider {
    fn apply(
        &self,
        session: SessionId,
        invocation: &RpcInvocation,
    ) -> Result<Vec<StateChange>, InvocationFault> {
        if invocation.method != "setProperty" {
            return Err(InvocationFault(format!(
                "unknown method {:?}",
                invocation.method
            )));
        }
        let [name, value] = invocation.arguments.as_slice() else {
            return Err(InvocationFault(format!(
                "setProperty expects 2 arguments, got {}",
                invocation.arguments.len()
            )));
        };
        let name = name
            .as_str()
            .ok_or_else(|| InvocationFault("property name must be a string".into()))?
            .to_string();

        let mut trees = self.trees.lock().unwrap_or_else(|e| e.into_inner());
        trees
            .entry(session)
            .or_default()
            .insert((invocation.connector_id.clone(), name.clone()), value.clone());

        Ok(vec![StateChange::new(
            invocation.connector_id.clone(),
            name,
            value.clone(),
        )])
    }

    fn snapshot(&self, session: SessionId) -> Vec<StateChange> {
        let trees = self.trees.lock().unwrap_or_else(|e| e.into_inner());
        trees
            .get(&session)
            .map(|tree| {
                tree.iter()
                    .map(|((connector, property), value)| {
                        StateChange::new(connector.clone(), property.clone(), value.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
