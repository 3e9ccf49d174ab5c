//! Session-keyed in-memory state: the per-visitor cart and, when the visitor
//! has logged in, their user id. Thread-safe, with lazy TTL-based eviction.
//!
//! The store has no durability of its own; a session's cart lives exactly as
//! long as the session does. Concurrent writes for the same session are
//! last-writer-wins by design of the storefront request model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use model::Cart;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct SessionEntry {
    cart: Cart,
    user_id: Option<i64>,
    touched_at: Instant,
}

impl SessionEntry {
    fn fresh() -> Self {
        Self {
            cart: Cart::new(),
            user_id: None,
            touched_at: Instant::now(),
        }
    }

    fn is_blank(&self) -> bool {
        self.cart.is_empty() && self.user_id.is_none()
    }
}

/// Thread-safe session store keyed by session id.
#[derive(Debug)]
pub struct CartStore {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl CartStore {
    /// Create an empty store. Entries untouched for longer than `ttl` are
    /// evicted lazily on the write path.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Get a cloned cart for the session; empty if the session is unknown.
    pub async fn cart(&self, session_id: &str) -> Cart {
        let map = self.inner.read().await;
        map.get(session_id)
            .map(|e| e.cart.clone())
            .unwrap_or_default()
    }

    /// Store the session's cart. Writing an empty cart into a session that
    /// carries no user removes the entry entirely.
    pub async fn put_cart(&self, session_id: &str, cart: Cart) {
        let mut map = self.inner.write().await;
        let now = Instant::now();
        match map.entry(session_id.to_string()) {
            std::collections::hash_map::Entry::Occupied(mut o) => {
                let entry = o.get_mut();
                entry.cart = cart;
                entry.touched_at = now;
                if entry.is_blank() {
                    o.remove();
                }
            }
            std::collections::hash_map::Entry::Vacant(v) => {
                if !cart.is_empty() {
                    let mut entry = SessionEntry::fresh();
                    entry.cart = cart;
                    v.insert(entry);
                }
            }
        }
        Self::sweep(&mut map, now, self.ttl);
    }

    /// The user bound to the session, if any.
    pub async fn user_id(&self, session_id: &str) -> Option<i64> {
        let map = self.inner.read().await;
        map.get(session_id).and_then(|e| e.user_id)
    }

    /// Bind or unbind a user on the session.
    pub async fn set_user(&self, session_id: &str, user_id: Option<i64>) {
        let mut map = self.inner.write().await;
        let now = Instant::now();
        let entry = map
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::fresh);
        entry.user_id = user_id;
        entry.touched_at = now;
        if entry.is_blank() {
            map.remove(session_id);
        }
        Self::sweep(&mut map, now, self.ttl);
    }

    /// Drop all state for the session.
    pub async fn remove(&self, session_id: &str) {
        let mut map = self.inner.write().await;
        map.remove(session_id);
    }

    /// Number of live sessions (test and metrics hook).
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    fn sweep(map: &mut HashMap<String, SessionEntry>, now: Instant, ttl: Duration) {
        map.retain(|_, e| now.duration_since(e.touched_at) <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CartStore {
        CartStore::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_unknown_session_yields_empty_cart() {
        let s = store();
        assert!(s.cart("nope").await.is_empty());
    }

    #[tokio::test]
    async fn test_put_and_get_cart() {
        let s = store();
        let mut cart = Cart::new();
        cart.set(1, 2);
        s.put_cart("sid-1", cart.clone()).await;
        assert_eq!(s.cart("sid-1").await, cart);
        assert_eq!(s.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_anonymous_cart_is_not_retained() {
        let s = store();
        let mut cart = Cart::new();
        cart.set(1, 2);
        s.put_cart("sid-1", cart).await;
        s.put_cart("sid-1", Cart::new()).await;
        assert!(s.is_empty().await);
    }

    #[tokio::test]
    async fn test_user_binding_outlives_cart_clear() {
        let s = store();
        s.set_user("sid-1", Some(42)).await;
        s.put_cart("sid-1", Cart::new()).await;
        assert_eq!(s.user_id("sid-1").await, Some(42));
        s.set_user("sid-1", None).await;
        assert!(s.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_on_write() {
        let s = CartStore::new(Duration::ZERO);
        let mut cart = Cart::new();
        cart.set(1, 1);
        s.put_cart("old", cart).await;
        // Any later write sweeps entries older than the (zero) TTL.
        s.set_user("new", Some(1)).await;
        assert!(s.cart("old").await.is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins_for_same_session() {
        let s = store();
        let mut a = Cart::new();
        a.set(1, 1);
        let mut b = Cart::new();
        b.set(2, 5);
        s.put_cart("sid", a).await;
        s.put_cart("sid", b.clone()).await;
        assert_eq!(s.cart("sid").await, b);
    }
}
