//! Per-key locks so concurrent cache misses share one engine call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Registry of per-key async locks.
///
/// Holding the guard for a key makes other callers of [`KeyedLocks::lock`]
/// with the same key wait. Entries are removed once the last guard for a key
/// is released and nobody else is waiting.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`.
    pub async fn lock(self: &Arc<Self>, key: &str) -> KeyGuard {
        let mutex = self.get_or_create(key).await;
        let guard = mutex.lock_owned().await;

        KeyGuard {
            key: key.to_string(),
            registry: Arc::clone(self),
            guard: Some(guard),
        }
    }

    async fn get_or_create(&self, key: &str) -> Arc<Mutex<()>> {
        // Fast path: check if lock exists
        {
            let read_guard = self.locks.read().await;
            if let Some(lock) = read_guard.get(key) {
                return Arc::clone(lock);
            }
        }

        // Slow path: create lock
        let mut write_guard = self.locks.write().await;
        // Double-check pattern to avoid race condition
        if let Some(lock) = write_guard.get(key) {
            return Arc::clone(lock);
        }

        let lock = Arc::new(Mutex::new(()));
        write_guard.insert(key.to_string(), Arc::clone(&lock));
        lock
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

/// Exclusive hold on one key. Released on drop.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    registry: Arc<KeyedLocks>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Best effort: if the write lock is busy the entry stays and is reused.
        if let Ok(mut locks) = self.registry.locks.try_write() {
            // Only the map itself still references an idle lock.
            if locks
                .get(&self.key)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock("1:ru").await;
        assert_eq!(locks.len().await, 1);
        drop(guard);
        assert!(locks.is_empty().await);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("7:de").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = Arc::new(KeyedLocks::new());
        let _a = locks.lock("1:ru").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("2:ru")).await;
        assert!(b.is_ok());
    }
}
