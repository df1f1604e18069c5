//! Per-consumer serialization: a sharded map of locks keyed by consumerId,
//! with lazy creation and periodic GC of idle entries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A lazily-populated map of per-consumer mutexes. Two events for the same
/// consumer are fully ordered; two for different consumers proceed in
/// parallel.
#[derive(Debug, Default)]
pub struct ConsumerLockRegistry {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConsumerLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `consumer_id`, creating it if this is the first
    /// time it has been seen. Holding the returned guard for the duration of
    /// steps 3–11 of `process_event` is what makes those steps atomic per
    /// consumer.
    pub async fn lock(&self, consumer_id: &str) -> ConsumerLockGuard<'_> {
        let entry = {
            let locks = self.locks.read().unwrap();
            locks.get(consumer_id).cloned()
        };
        let entry = entry.unwrap_or_else(|| {
            let mut locks = self.locks.write().unwrap();
            locks.entry(consumer_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        });

        let guard = entry.clone().lock_owned().await;

        ConsumerLockGuard {
            guard: Some(guard),
            entry,
            consumer_id: consumer_id.to_string(),
            registry: self,
        }
    }

    fn evict_if_idle(&self, consumer_id: &str, entry: &Arc<Mutex<()>>) {
        if Arc::strong_count(entry) == 2 {
            // One ref held by `entry` itself, one by the map; nobody else waiting.
            let mut locks = self.locks.write().unwrap();
            if let Some(current) = locks.get(consumer_id) {
                if Arc::ptr_eq(current, entry) && Arc::strong_count(current) == 2 {
                    locks.remove(consumer_id);
                }
            }
        }
    }
}

/// Held for the duration of steps 3–11 of `process_event`; dropping it
/// releases the per-consumer lock and opportunistically garbage-collects
/// the registry entry if nothing else is waiting on it.
pub struct ConsumerLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    entry: Arc<Mutex<()>>,
    consumer_id: String,
    registry: &'a ConsumerLockRegistry,
}

impl Drop for ConsumerLockGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex itself before inspecting the registry's
        // refcount, or the still-held guard's own Arc clone would make the
        // entry look busy forever.
        self.guard.take();
        self.registry.evict_if_idle(&self.consumer_id, &self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_access_to_the_same_consumer() {
        let registry = ConsumerLockRegistry::new();
        let guard = registry.lock("cons-1").await;
        drop(guard);
        let _guard2 = registry.lock("cons-1").await;
    }

    #[tokio::test]
    async fn different_consumers_do_not_contend() {
        let registry = ConsumerLockRegistry::new();
        let g1 = registry.lock("cons-1").await;
        let g2 = registry.lock("cons-2").await;
        drop(g1);
        drop(g2);
    }

    #[tokio::test]
    async fn idle_entries_are_evicted_after_release() {
        let registry = ConsumerLockRegistry::new();
        {
            let _guard = registry.lock("cons-1").await;
        }
        assert!(registry.locks.read().unwrap().is_empty());
    }
}
