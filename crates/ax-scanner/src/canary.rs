//! Canary token minting and leak detection.
//!
//! A canary is a uniformly random, high-entropy string bound to a session for
//! one inbound/outbound turn. Its appearance in agent output signals
//! exfiltration of the queued (canary-tagged) form of the inbound message.

use std::collections::HashMap;

use ax_domain::trace::TraceEvent;
use parking_lot::RwLock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const CANARY_BYTES: usize = 16; // 128 bits of entropy, per spec.

fn mint_token() -> String {
    let mut bytes = [0u8; CANARY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("CANARY-{}", hex::encode(bytes))
}

/// Process-wide canary map: session ID → live token for the in-flight turn.
pub struct CanaryStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl Default for CanaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CanaryStore {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Mint and store a fresh token for this session, replacing any prior one.
    pub fn mint(&self, session_id: &str) -> String {
        let token = mint_token();
        self.tokens
            .write()
            .insert(session_id.to_string(), token.clone());
        TraceEvent::CanaryMinted {
            session_id: session_id.to_string(),
        }
        .emit();
        token
    }

    /// Destroy the token for a session after its outbound has been processed.
    pub fn clear(&self, session_id: &str) {
        self.tokens.write().remove(session_id);
    }

    /// The currently live token for a session, if any.
    pub fn get(&self, session_id: &str) -> Option<String> {
        self.tokens.read().get(session_id).cloned()
    }
}

/// Check whether `output` contains `token` as a substring. Comparison itself
/// need not be constant-time for a substring search over public response
/// text (the canary's secrecy comes from its entropy, not from hiding the
/// comparison), but callers that need a direct equality check on an
/// extracted candidate slice should use [`tokens_equal`].
pub fn check_canary(output: &str, token: &str) -> bool {
    !token.is_empty() && output.contains(token)
}

/// Constant-time equality between two token candidates, guarding against
/// timing side channels when comparing a caller-supplied value against a
/// stored secret (e.g. IPC action auth, not the substring scan above).
pub fn tokens_equal(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    bool::from(da.ct_eq(&db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_has_expected_shape() {
        let token = mint_token();
        assert!(token.starts_with("CANARY-"));
        assert_eq!(token.len(), "CANARY-".len() + CANARY_BYTES * 2);
    }

    #[test]
    fn mint_tokens_are_distinct() {
        assert_ne!(mint_token(), mint_token());
    }

    #[test]
    fn store_roundtrip() {
        let store = CanaryStore::new();
        let token = store.mint("s1");
        assert_eq!(store.get("s1").unwrap(), token);
        store.clear("s1");
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn check_canary_detects_substring() {
        let token = "CANARY-deadbeef";
        assert!(check_canary("leaked: CANARY-deadbeef here", token));
        assert!(!check_canary("nothing to see", token));
    }

    #[test]
    fn tokens_equal_is_order_independent_of_case_sensitivity() {
        assert!(tokens_equal("abc", "abc"));
        assert!(!tokens_equal("abc", "abd"));
    }
}
