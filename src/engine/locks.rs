// src/engine/locks.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key async lock registry.
///
/// Locks are created on demand and live only while some task holds or waits
/// on them (the map keeps weak references). Dead entries are swept once the
/// map grows past a watermark, so the registry does not grow with the total
/// number of sessions ever seen.
pub struct SessionLocks {
    inner: Mutex<LockMap>,
}

struct LockMap {
    locks: HashMap<String, Weak<AsyncMutex<()>>>,
    sweep_at: usize,
}

const MIN_SWEEP_AT: usize = 64;

impl SessionLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockMap {
                locks: HashMap::new(),
                sweep_at: MIN_SWEEP_AT,
            }),
        }
    }

    /// Acquires the lock for `key`, waiting if another task holds it.
    /// The returned guard keeps the underlying lock alive until dropped.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        self.handle(key).lock_owned().await
    }

    fn handle(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = map.locks.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(AsyncMutex::new(()));
        map.locks.insert(key.to_string(), Arc::downgrade(&lock));

        if map.locks.len() >= map.sweep_at {
            map.locks.retain(|_, weak| weak.strong_count() > 0);
            map.sweep_at = (map.locks.len() * 2).max(MIN_SWEEP_AT);
        }

        lock
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .locks
            .len()
    }
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self::new()
    }
}
