// Per-user exclusive locks.
//
// Finding a candidate cluster and writing the assignment are separate
// repository calls. Two near-duplicates for the same user processed at the
// same time would both see "no cluster" and each create one, so the whole
// clusterize sequence runs under that user's lock. Different users never
// contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a user's clusters.
    ///
    /// The guard releases the lock when dropped. Entries nobody holds or
    /// waits on are pruned here, so the registry stays as large as the set
    /// of users with work in flight.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let user_lock = {
            let mut locks = self.inner.lock().await;
            // Held and queued locks have a clone outside the map
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user_id).or_default().clone()
        };
        // The registry lock is released before waiting on the user lock
        user_lock.lock_owned().await
    }

    /// Number of users with a lock entry (held, queued, or not yet pruned).
    pub async fn tracked_users(&self) -> usize {
        self.inner.lock().await.len()
    }
}
