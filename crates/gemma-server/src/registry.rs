//! Process-wide cancellation registry.
//!
//! Maps generation ids to cancellation tokens so an external `/cancel`
//! request can reach a running session. The registry is an explicit object
//! injected into whoever needs it, never a global. Entries are short-lived
//! and contention is low, so a single mutex-guarded map is enough.
//!
//! Invariant: only Running sessions appear here — every terminal transition
//! unregisters immediately, so `signal` on a finished id reports "not
//! found" rather than mutating anything.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Attempted to register a generation id that is still active.
#[derive(Debug, thiserror::Error)]
#[error("generation {0} is already active")]
pub struct DuplicateSession(pub String);

pub struct CancellationRegistry {
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Create and store a fresh token for `id`.
    pub async fn register(&self, id: &str) -> Result<CancellationToken, DuplicateSession> {
        let mut active = self.active.lock().await;
        if active.contains_key(id) {
            return Err(DuplicateSession(id.to_string()));
        }
        let token = CancellationToken::new();
        active.insert(id.to_string(), token.clone());
        Ok(token)
    }

    /// Cancel the token for `id` if present; returns whether it existed.
    pub async fn signal(&self, id: &str) -> bool {
        let active = self.active.lock().await;
        match active.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id`. Idempotent.
    pub async fn unregister(&self, id: &str) {
        let mut active = self.active.lock().await;
        active.remove(id);
    }

    /// Number of currently running sessions.
    pub async fn active_count(&self) -> usize {
        let active = self.active.lock().await;
        active.len()
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_signal_unregister() {
        let registry = CancellationRegistry::new();
        let token = registry.register("gen-1").await.unwrap();
        assert!(!token.is_cancelled());
        assert_eq!(registry.active_count().await, 1);

        assert!(registry.signal("gen-1").await);
        assert!(token.is_cancelled());

        registry.unregister("gen-1").await;
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let registry = CancellationRegistry::new();
        registry.register("gen-1").await.unwrap();
        assert!(registry.register("gen-1").await.is_err());
        // original entry untouched
        assert_eq!(registry.active_count().await, 1);
    }

    #[tokio::test]
    async fn signal_unknown_id_is_not_found() {
        let registry = CancellationRegistry::new();
        assert!(!registry.signal("nope").await);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = CancellationRegistry::new();
        registry.register("gen-1").await.unwrap();
        registry.unregister("gen-1").await;
        registry.unregister("gen-1").await;
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn id_is_reusable_after_unregister() {
        let registry = CancellationRegistry::new();
        let first = registry.register("gen-1").await.unwrap();
        first.cancel();
        registry.unregister("gen-1").await;
        let second = registry.register("gen-1").await.unwrap();
        // fresh token, not the cancelled one
        assert!(!second.is_cancelled());
    }
}
