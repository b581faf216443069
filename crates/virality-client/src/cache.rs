//! Keyed query cache with single-flight fetches.
//!
//! Per key, at most one fetch is in flight; concurrent readers await the same
//! shared future and receive the same result. [`QueryCache::invalidate`]
//! marks the entry stale and detaches any in-flight fetch, so the next read
//! starts a new fetch. A detached fetch still resolves for the readers already
//! waiting on it but never populates the cache. Failed fetches leave the
//! previous value in place.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Slot<V, E> {
    value: Option<V>,
    fresh: bool,
    /// Bumped by `invalidate` and `put`; a fetch only stores its result if
    /// the epoch it started under is still current.
    epoch: u64,
    in_flight: Option<(u64, SharedFetch<V, E>)>,
}

impl<V, E> Default for Slot<V, E> {
    fn default() -> Self {
        Self {
            value: None,
            fresh: false,
            epoch: 0,
            in_flight: None,
        }
    }
}

struct Inner<K, V, E> {
    slots: HashMap<K, Slot<V, E>>,
    next_fetch_id: u64,
}

pub struct QueryCache<K, V, E> {
    inner: Arc<Mutex<Inner<K, V, E>>>,
}

impl<K, V, E> Clone for QueryCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> Default for QueryCache<K, V, E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_fetch_id: 0,
            })),
        }
    }
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value for `key` if it is present and not invalidated.
    pub async fn get(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().await;
        inner
            .slots
            .get(key)
            .filter(|slot| slot.fresh)
            .and_then(|slot| slot.value.clone())
    }

    /// The last successfully fetched value for `key`, stale or not.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().await;
        inner.slots.get(key).and_then(|slot| slot.value.clone())
    }

    /// Store `value` as fresh, superseding any fetch currently in flight.
    pub async fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock().await;
        let slot = inner.slots.entry(key).or_default();
        slot.value = Some(value);
        slot.fresh = true;
        slot.epoch += 1;
        slot.in_flight = None;
    }

    /// Mark `key` stale. The next read fetches again.
    pub async fn invalidate(&self, key: &K) {
        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.slots.get_mut(key) {
            slot.fresh = false;
            slot.epoch += 1;
            slot.in_flight = None;
        }
    }

    /// Return the fresh cached value, join the in-flight fetch, or start one
    /// with `fetch`.
    ///
    /// # Errors
    ///
    /// Returns the fetch's error; the previously cached value is kept.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (fetch_id, epoch, shared) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let slot = inner.slots.entry(key.clone()).or_default();

            if slot.fresh {
                if let Some(value) = &slot.value {
                    return Ok(value.clone());
                }
            }

            if let Some((id, shared)) = &slot.in_flight {
                (*id, slot.epoch, shared.clone())
            } else {
                inner.next_fetch_id += 1;
                let id = inner.next_fetch_id;
                let shared = fetch().boxed().shared();
                slot.in_flight = Some((id, shared.clone()));
                (id, slot.epoch, shared)
            }
        };

        let result = shared.await;

        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.slots.get_mut(&key) {
            if slot.in_flight.as_ref().is_some_and(|(id, _)| *id == fetch_id) {
                slot.in_flight = None;
            }
            if slot.epoch == epoch {
                if let Ok(value) = &result {
                    slot.value = Some(value.clone());
                    slot.fresh = true;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    type Cache = QueryCache<&'static str, u32, String>;

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        result: Result<u32, String>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { result }.boxed()
        }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get_or_fetch("k", counting_fetch(&calls, Ok(1))).await, Ok(1));
        assert_eq!(cache.get_or_fetch("k", counting_fetch(&calls, Ok(2))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&"k").await, Some(1));
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<u32>();

        let first = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_fetch("k", move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move { rx.await.map_err(|e| e.to_string()) }
                    })
                    .await
            })
        };
        // Let the first reader register its fetch.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_fetch("k", counting_fetch(&calls, Ok(99)))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tx.send(7).expect("receiver alive");
        assert_eq!(first.await.expect("join"), Ok(7));
        assert_eq!(second.await.expect("join"), Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(1)))
            .await
            .unwrap();
        cache.invalidate(&"k").await;
        assert_eq!(cache.get(&"k").await, None);
        assert_eq!(cache.peek(&"k").await, Some(1));

        let value = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(2)))
            .await;
        assert_eq!(value, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_detached_by_invalidation_does_not_populate_cache() {
        let cache = Cache::new();
        let (tx, rx) = oneshot::channel::<u32>();

        let stale_reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("k", move || async move {
                        rx.await.map_err(|e| e.to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.invalidate(&"k").await;
        tx.send(1).expect("receiver alive");
        // The reader that started before invalidation still gets its result.
        assert_eq!(stale_reader.await.expect("join"), Ok(1));
        assert_eq!(cache.get(&"k").await, None);

        let calls = Arc::new(AtomicUsize::new(0));
        let fresh = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(2)))
            .await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_previous_value() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(5)))
            .await
            .unwrap();
        cache.invalidate(&"k").await;

        let err = cache
            .get_or_fetch("k", counting_fetch(&calls, Err("offline".to_string())))
            .await;
        assert_eq!(err, Err("offline".to_string()));
        assert_eq!(cache.peek(&"k").await, Some(5));
        assert_eq!(cache.get(&"k").await, None);
    }

    #[tokio::test]
    async fn put_supersedes_value() {
        let cache = Cache::new();
        cache.put("k", 3).await;
        assert_eq!(cache.get(&"k").await, Some(3));

        let calls = Arc::new(AtomicUsize::new(0));
        let value = cache
            .get_or_fetch("k", counting_fetch(&calls, Ok(4)))
            .await;
        assert_eq!(value, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_fetch("a", counting_fetch(&calls, Ok(1)))
            .await
            .unwrap();
        cache
            .get_or_fetch("b", counting_fetch(&calls, Ok(2)))
            .await
            .unwrap();
        cache.invalidate(&"a").await;

        assert_eq!(cache.get(&"a").await, None);
        assert_eq!(cache.get(&"b").await, Some(2));
    }
}
