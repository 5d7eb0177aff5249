// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Protocol
//!
//! The UIDL wire contract: the constant table shared by codec and
//! transport, the message types, and the codec itself.

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{decode_batch, encode_delta, CodecError};
pub use message::{BatchAck, DeltaMessage, RpcBatch, RpcInvocation, StateChange};
