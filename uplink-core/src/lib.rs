// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Uplink Core Library
//!
//! UI state synchronization engine for server-driven UIs: keeps a
//! server-held component tree and a browser-held mirror consistent
//! over an unreliable, possibly-reordered, possibly-reconnecting
//! transport. Guarantees exactly-once, in-order application of
//! server-to-client deltas and client-to-server RPC batches, and
//! guards the channel against replay and CSRF.
//!
//! The widget model, bootstrap HTML and resource serving are external
//! collaborators; this crate covers the channel itself: tokens,
//! sequencing, codec, sessions and the engine orchestrating them.

pub mod engine;
pub mod protocol;
pub mod resource;
pub mod security;
pub mod sequencer;
pub mod session;

pub use engine::{BootstrapInfo, EngineError, InvocationFault, StateProvider, SyncEngine};
pub use protocol::{
    decode_batch, encode_delta, BatchAck, CodecError, DeltaMessage, RpcBatch, RpcInvocation,
    StateChange,
};
pub use resource::{ResourceError, ResourceProtocol, ResourceResolver};
pub use security::{SecurityError, TokenStore};
pub use sequencer::{OrderingError, Sequencer, SyncPhase};
pub use session::{
    DeliveryChannel, SessionError, SessionHandle, SessionId, SessionRegistry, SessionState,
};
