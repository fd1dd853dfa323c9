use std::{collections::HashMap, sync::Arc};

use log::*;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes work per key (a loan guid or a transaction id) across every task and HTTP worker that shares this value.
///
/// Clones share the same lock table. Entries are dropped once nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Releases the key when dropped.
pub struct KeyedLockGuard {
    key: String,
    table: KeyedLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        // Release the async lock before inspecting the table, so that the strong count only reflects the table entry and
        // any waiters.
        drop(self.guard.take());
        let mut locks = self.table.locks.lock();
        if let Some(entry) = locks.get(&self.key) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&self.key);
                trace!("🔓️ Lock table entry for {} removed", self.key);
            }
        }
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds `key`, then holds it until the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> KeyedLockGuard {
        let mutex = {
            let mut locks = self.locks.lock();
            locks.entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        if mutex.try_lock().is_err() {
            debug!("🔒️ {key} is busy. Waiting for the current holder to finish.");
        }
        let guard = mutex.lock_owned().await;
        trace!("🔒️ Acquired lock for {key}");
        KeyedLockGuard { key: key.to_string(), table: self.clone(), guard: Some(guard) }
    }

    /// The number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.locks.lock().len()
    }
}
