use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Table<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// One async mutex per key, created on demand and dropped once nobody
/// holds or waits for it.
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    table: Table<K>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let mutex = {
            let mut table = self.table.lock();
            evict_idle(&mut table);
            table
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            key,
            table: self.table.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently locked or awaited.
    pub fn len(&self) -> usize {
        let mut table = self.table.lock();
        evict_idle(&mut table);
        table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops entries only the table still references. A waiter cancelled after
/// the holder released leaves such an entry behind.
fn evict_idle<K: Eq + Hash>(table: &mut HashMap<K, Arc<AsyncMutex<()>>>) {
    table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
}

pub struct KeyedGuard<K: Eq + Hash + Clone> {
    key: K,
    table: Table<K>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.table.lock();
        // Only the table's own reference left: no holder, no waiter.
        if table
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            table.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(1u64).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(1u64).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(2u64)).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_entry() {
        let locks = KeyedLocks::new();
        let holder = locks.lock(1u64).await;
        let mut waiter = Box::pin(locks.lock(1u64));
        assert!(
            tokio::time::timeout(Duration::from_millis(5), &mut waiter)
                .await
                .is_err()
        );

        drop(holder);
        drop(waiter);
        assert!(locks.table.lock().contains_key(&1));

        let other = locks.lock(2u64).await;
        {
            let table = locks.table.lock();
            assert!(!table.contains_key(&1));
            assert_eq!(table.len(), 1);
        }
        drop(other);
        assert!(locks.is_empty());
    }
}
