// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Security Token Store
//!
//! Issues and validates the per-session anti-CSRF token and the push
//! connection identifier. Validation is constant-time and deliberately
//! opaque: an unknown session and a wrong token produce the same error.

use std::collections::HashMap;
use std::sync::RwLock;

use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::protocol::constants::CSRF_TOKEN_DEFAULT_VALUE;
use crate::session::SessionId;

/// Token length in random bytes (hex-encoded on the wire).
const TOKEN_BYTES: usize = 32;

/// Security error types.
///
/// Both variants are opaque on purpose: they carry no indication of
/// whether the session exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("security key mismatch")]
    InvalidToken,

    #[error("invalid push connection identifier")]
    InvalidPushId,
}

/// Per-session CSRF token and push id store.
///
/// Validation is read-heavy and issuance is rare, so both tables sit
/// behind an `RwLock`. Writes (issue, rotate, revoke) are serialized.
pub struct TokenStore {
    csrf_protection: bool,
    rng: SystemRandom,
    tokens: RwLock<HashMap<SessionId, String>>,
    push_ids: RwLock<HashMap<SessionId, String>>,
    /// Compared against when the session is unknown, so the timing of a
    /// rejection does not reveal session existence.
    decoy: String,
}

impl TokenStore {
    /// Creates a store. `csrf_protection` is application-wide: when
    /// disabled, only the reserved default value is accepted and no
    /// real token comparison happens.
    pub fn new(csrf_protection: bool) -> Self {
        let rng = SystemRandom::new();
        let decoy = generate_token(&rng);
        TokenStore {
            csrf_protection,
            rng,
            tokens: RwLock::new(HashMap::new()),
            push_ids: RwLock::new(HashMap::new()),
            decoy,
        }
    }

    /// Whether CSRF protection is active.
    pub fn csrf_protection(&self) -> bool {
        self.csrf_protection
    }

    /// Issues a fresh CSRF token for the session, replacing any
    /// previous one. The reserved default value is never generated.
    pub fn issue(&self, session: SessionId) -> String {
        let token = generate_token(&self.rng);
        debug_assert_ne!(token, CSRF_TOKEN_DEFAULT_VALUE);
        let mut tokens = write_lock(&self.tokens);
        tokens.insert(session, token.clone());
        token
    }

    /// Validates a presented CSRF token.
    ///
    /// With protection disabled, only the literal reserved default is
    /// accepted. With protection enabled, the comparison is constant
    /// time and an unknown session is indistinguishable from a
    /// mismatch.
    pub fn validate(&self, session: SessionId, presented: &str) -> Result<(), SecurityError> {
        if !self.csrf_protection {
            return if presented == CSRF_TOKEN_DEFAULT_VALUE {
                Ok(())
            } else {
                Err(SecurityError::InvalidToken)
            };
        }

        let tokens = read_lock(&self.tokens);
        let expected = tokens.get(&session).unwrap_or(&self.decoy);
        constant_time_eq(expected, presented).map_err(|_| SecurityError::InvalidToken)
    }

    /// Issues a fresh push connection identifier, invalidating any
    /// previous one. Called at bootstrap and again whenever a new push
    /// connection is established.
    pub fn issue_push_id(&self, session: SessionId) -> String {
        let id = generate_token(&self.rng);
        let mut push_ids = write_lock(&self.push_ids);
        push_ids.insert(session, id.clone());
        id
    }

    /// Validates a presented push identifier. Push ids are always
    /// enforced, even when CSRF protection is disabled: the push
    /// channel carries deltas and must not be hijackable.
    pub fn validate_push_id(&self, session: SessionId, presented: &str) -> Result<(), SecurityError> {
        let push_ids = read_lock(&self.push_ids);
        let expected = push_ids.get(&session).unwrap_or(&self.decoy);
        constant_time_eq(expected, presented).map_err(|_| SecurityError::InvalidPushId)
    }

    /// Drops all tokens for a closed session.
    pub fn revoke(&self, session: SessionId) {
        write_lock(&self.tokens).remove(&session);
        write_lock(&self.push_ids).remove(&session);
    }
}

fn generate_token(rng: &SystemRandom) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes)
        .expect("operating system RNG unavailable");
    hex::encode(bytes)
}

fn constant_time_eq(expected: &str, presented: &str) -> Result<(), ()> {
    // Length mismatch rejects early; token length is public anyway.
    if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(())
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_issue_and_validate() {
        let store = TokenStore::new(true);
        let session = Uuid::new_v4();
        let token = store.issue(session);

        assert!(store.validate(session, &token).is_ok());
        assert!(store.validate(session, "wrong").is_err());
    }

    #[test]
    fn test_equal_length_mismatch_rejected() {
        let store = TokenStore::new(true);
        let session = Uuid::new_v4();
        let token = store.issue(session);

        // Same length, one hex digit off.
        let mut forged: Vec<char> = token.chars().collect();
        forged[0] = if forged[0] == '0' { '1' } else { '0' };
        let forged: String = forged.into_iter().collect();

        assert_eq!(
            store.validate(session, &forged),
            Err(SecurityError::InvalidToken)
        );
    }

    #[test]
    fn test_default_value_rejected_when_protected() {
        let store = TokenStore::new(true);
        let session = Uuid::new_v4();
        store.issue(session);

        assert_eq!(
            store.validate(session, CSRF_TOKEN_DEFAULT_VALUE),
            Err(SecurityError::InvalidToken)
        );
    }

    #[test]
    fn test_default_value_accepted_only_when_disabled() {
        let store = TokenStore::new(false);
        let session = Uuid::new_v4();

        assert!(store.validate(session, CSRF_TOKEN_DEFAULT_VALUE).is_ok());
        assert!(store.validate(session, "anything-else").is_err());
    }

    #[test]
    fn test_unknown_session_same_error_as_mismatch() {
        let store = TokenStore::new(true);
        let known = Uuid::new_v4();
        let token = store.issue(known);

        let unknown = Uuid::new_v4();
        assert_eq!(
            store.validate(unknown, &token),
            Err(SecurityError::InvalidToken)
        );
    }

    #[test]
    fn test_reissue_invalidates_previous_token() {
        let store = TokenStore::new(true);
        let session = Uuid::new_v4();
        let first = store.issue(session);
        let second = store.issue(session);

        assert_ne!(first, second);
        assert!(store.validate(session, &first).is_err());
        assert!(store.validate(session, &second).is_ok());
    }

    #[test]
    fn test_push_id_rotation() {
        let store = TokenStore::new(true);
        let session = Uuid::new_v4();
        let first = store.issue_push_id(session);
        assert!(store.validate_push_id(session, &first).is_ok());

        // A new push connection rotates the id; the old one is dead.
        let second = store.issue_push_id(session);
        assert!(store.validate_push_id(session, &first).is_err());
        assert!(store.validate_push_id(session, &second).is_ok());
    }

    #[test]
    fn test_push_id_enforced_even_without_csrf_protection() {
        let store = TokenStore::new(false);
        let session = Uuid::new_v4();
        store.issue_push_id(session);

        assert_eq!(
            store.validate_push_id(session, CSRF_TOKEN_DEFAULT_VALUE),
            Err(SecurityError::InvalidPushId)
        );
    }

    #[test]
    fn test_revoke_drops_tokens() {
        let store = TokenStore::new(true);
        let session = Uuid::new_v4();
        let token = store.issue(session);
        store.revoke(session);

        assert!(store.validate(session, &token).is_err());
    }
}
