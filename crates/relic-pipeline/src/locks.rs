// crates/relic-pipeline/src/locks.rs
//
// Per-(site, index) async mutexes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use relic_core::IndexKind;

type Key = (Uuid, String);

/// A lazily populated map of async mutexes, one per (site, index).
///
/// Holders of different keys never contend. The map itself is guarded by a
/// short-lived std mutex that is never held across an await.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to (site, index).
    pub async fn lock(&self, site_id: Uuid, index: &IndexKind) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry((site_id, index.tag()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    /// Drop entries for a site nobody is holding (after deactivation).
    pub fn forget_site(&self, site_id: &Uuid) {
        let mut map = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.retain(|(site, _), m| site != site_id || Arc::strong_count(m) > 1);
    }
}
