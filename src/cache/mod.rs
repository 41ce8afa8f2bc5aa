//! Persistent caches for resolved specs, checkouts and built sites
//!
//! Everything on disk is content-addressed by SHA256 keys derived from the
//! repository identity (and, for built sites, the base URL too).
//!
//! # Cache Layers
//!
//! | Layer | Backing | Key | Lifetime |
//! |-------|---------|-----|----------|
//! | Resolution | memory | raw spec | TTL, bounded size |
//! | Checkout | `checkout_root/<key>` | identity | until `cache gc`/`clear` |
//! | Built site | `built_sites_root/<key>` | identity + base URL | until `cache gc`/`clear` |
//!
//! A keyed directory only exists once complete. Work in progress lives in
//! dot-prefixed scratch directories next to it and is renamed into place.

pub mod artifact;
pub mod checkout;
pub mod entry;
pub mod key;
pub mod resolution;

pub use artifact::ArtifactStore;
pub use checkout::CheckoutStore;
pub use entry::{format_bytes, CacheEntry, CacheKind};
pub use key::{checkout_key, render_key};
pub use resolution::{ResolutionCache, ResolutionCacheOptions};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Scratch directories are dot-prefixed and never count as cache entries
pub(crate) fn is_staging_name(name: &str) -> bool {
    name.starts_with('.')
}

/// One async mutex per key, dropped once nobody waits on it
#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) async fn get(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Forget the lock for `key` if only the map and the caller still hold it
    pub(crate) async fn release(&self, key: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) <= 2) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_names() {
        assert!(is_staging_name(".staging-abc-123"));
        assert!(is_staging_name(".fetch-abc-123"));
        assert!(!is_staging_name("abc"));
    }

    #[tokio::test]
    async fn keyed_locks_are_shared_and_released() {
        let locks = KeyedLocks::default();
        let a = locks.get("k").await;
        let b = locks.get("k").await;
        assert!(Arc::ptr_eq(&a, &b));

        drop(b);
        locks.release("k").await;
        assert_eq!(locks.len().await, 0);
    }

    #[tokio::test]
    async fn keyed_lock_kept_while_contended() {
        let locks = KeyedLocks::default();
        let _holder = locks.get("k").await;
        let _waiter = locks.get("k").await;

        locks.release("k").await;
        assert_eq!(locks.len().await, 1);
    }
}
