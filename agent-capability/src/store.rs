//! Concurrent store for issued capability tokens.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use agent_primitives::TokenId;
use chrono::Utc;
use tracing::debug;

use crate::token::CapabilityToken;

/// Token registry shared across decision threads.
#[derive(Debug, Default)]
pub struct CapabilityTokenStore {
    tokens: RwLock<HashMap<TokenId, CapabilityToken>>,
}

impl CapabilityTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TokenId, CapabilityToken>> {
        self.tokens.read().expect("token store poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TokenId, CapabilityToken>> {
        self.tokens.write().expect("token store poisoned")
    }

    /// Stores a token, replacing any token with the same id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn store(&self, token: CapabilityToken) {
        debug!(token_id = %token.token_id(), action = %token.scope().action, tool = %token.scope().tool, "capability token stored");
        self.write().insert(token.token_id().clone(), token);
    }

    /// Returns a stored token, expired or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn get(&self, token_id: &TokenId) -> Option<CapabilityToken> {
        self.read().get(token_id).cloned()
    }

    /// Checks that a token exists, is unexpired, and is scoped exactly to
    /// `(action, tool)`.
    ///
    /// Unknown and expired tokens both yield `false` so callers cannot tell
    /// the two apart.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn verify(&self, token_id: &TokenId, action: &str, tool: &str) -> bool {
        self.read()
            .get(token_id)
            .is_some_and(|token| token.is_authorized_for(action, tool))
    }

    /// Removes every expired token and returns how many were removed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut tokens = self.write();
        let before = tokens.len();
        tokens.retain(|_, token| token.is_valid_at(now));
        let removed = before - tokens.len();
        if removed > 0 {
            debug!(removed, remaining = tokens.len(), "expired capability tokens removed");
        }
        removed
    }

    /// Number of stored tokens, including expired ones not yet swept.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true when the store holds no tokens.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn verify_requires_exact_scope() {
        let store = CapabilityTokenStore::new();
        let token = CapabilityToken::create("read", "crm", "hash", 5);
        let id = token.token_id().clone();
        store.store(token);

        assert!(store.verify(&id, "read", "crm"));
        assert!(!store.verify(&id, "write", "crm"));
        assert!(!store.verify(&id, "read", "erp"));
    }

    #[test]
    fn missing_and_expired_are_indistinguishable() {
        let store = CapabilityTokenStore::new();
        let expired = CapabilityToken::create("read", "crm", "hash", 0);
        let expired_id = expired.token_id().clone();
        store.store(expired);

        assert!(!store.verify(&expired_id, "read", "crm"));
        assert!(!store.verify(&TokenId::generate(), "read", "crm"));
        assert!(store.get(&expired_id).is_some());
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let store = CapabilityTokenStore::new();
        store.store(CapabilityToken::create("a", "t", "h", 0));
        store.store(CapabilityToken::create("b", "t", "h", -1));
        let live = CapabilityToken::create("c", "t", "h", 5);
        let live_id = live.token_id().clone();
        store.store(live);

        assert_eq!(store.cleanup_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.verify(&live_id, "c", "t"));
        assert_eq!(store.cleanup_expired(), 0);
    }

    #[test]
    fn concurrent_store_and_verify() {
        let store = Arc::new(CapabilityTokenStore::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let token = CapabilityToken::create(format!("action{n}"), "tool", "h", 5);
                    let id = token.token_id().clone();
                    store.store(token);
                    assert!(store.verify(&id, &format!("action{n}"), "tool"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
