//! Per-key async locks.
//!
//! Contention is scoped to a single key (one ticket, one guild config, one
//! user's creation slot for a ticket type). Entries are created on demand and
//! dropped again once nobody holds or waits on them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// A set of independent async mutexes addressed by key.
pub struct KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    inner: LockMap<K>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLocks")
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

fn lock_map<K>(
    map: &Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquire the lock for `key`, waiting for the current holder if any.
    ///
    /// The lock is released when the returned guard is dropped.
    /// Dropping the future before it resolves gives up the wait and prunes
    /// the entry if nobody else is interested in the key.
    pub async fn lock(&self, key: K) -> KeyedGuard<K>
    where
        K: Unpin,
    {
        let mutex = {
            let mut map = lock_map(&self.inner);
            Arc::clone(
                map.entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = PendingLock {
            key: key.clone(),
            map: Arc::clone(&self.inner),
            wait: Some(Box::pin(mutex.lock_owned())),
        }
        .await;

        KeyedGuard {
            key,
            guard: Some(guard),
            map: Arc::clone(&self.inner),
        }
    }

    /// Acquire the lock for `key` only if nobody holds it right now.
    pub fn try_lock(&self, key: K) -> Option<KeyedGuard<K>> {
        let mutex = {
            let mut map = lock_map(&self.inner);
            Arc::clone(
                map.entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        match mutex.try_lock_owned() {
            Ok(guard) => Some(KeyedGuard {
                key,
                guard: Some(guard),
                map: Arc::clone(&self.inner),
            }),
            Err(_) => {
                prune(&self.inner, &key);
                None
            }
        }
    }

    /// Number of keys currently held or awaited.
    pub fn tracked_keys(&self) -> usize {
        lock_map(&self.inner).len()
    }
}

fn prune<K>(map: &LockMap<K>, key: &K)
where
    K: Eq + Hash,
{
    let mut map = lock_map(map);
    if let Some(entry) = map.get(key) {
        // Only the map's own reference left: nobody holds or waits.
        if Arc::strong_count(entry) == 1 {
            map.remove(key);
        }
    }
}

type LockWait = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

/// A `lock()` call that has not acquired its mutex yet.
struct PendingLock<K>
where
    K: Eq + Hash,
{
    key: K,
    map: LockMap<K>,
    wait: Option<LockWait>,
}

impl<K> Future for PendingLock<K>
where
    K: Eq + Hash + Unpin,
{
    type Output = OwnedMutexGuard<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(wait) = this.wait.as_mut() else {
            return Poll::Pending;
        };
        match wait.as_mut().poll(cx) {
            Poll::Ready(guard) => {
                this.wait = None;
                Poll::Ready(guard)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<K> Drop for PendingLock<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // The wait owns a reference to the entry; release it before pruning.
        if self.wait.take().is_some() {
            prune(&self.map, &self.key);
        }
    }
}

/// Guard for one key of a [`KeyedLocks`].
pub struct KeyedGuard<K>
where
    K: Eq + Hash + Clone,
{
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    map: LockMap<K>,
}

impl<K> KeyedGuard<K>
where
    K: Eq + Hash + Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyedGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.map, &self.key);
    }
}
