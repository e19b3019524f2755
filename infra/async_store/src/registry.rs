use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

/// A store that can live in a [`StoreRegistry`].
pub trait RegisteredStore: Clone + Send + Sync + 'static {
    /// Called exactly once, when the last subscription to the store is released.
    fn teardown(&self);
}

struct Entry<S> {
    store: S,
    subscribers: usize,
}

/// Lazily constructed, reference-counted stores keyed by identity.
///
/// The first [`subscribe`](Self::subscribe) for a key builds the store with
/// the registry's factory; releasing the last subscription for that key
/// removes the store and tears it down. The next subscription builds a fresh
/// one.
pub struct StoreRegistry<K, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    S: RegisteredStore,
{
    factory: Box<dyn Fn(&K) -> S + Send + Sync>,
    entries: Mutex<HashMap<K, Entry<S>>>,
}

impl<K, S> StoreRegistry<K, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    S: RegisteredStore,
{
    /// `factory` runs while the registry is locked and must not call back
    /// into it.
    pub fn new(factory: impl Fn(&K) -> S + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            factory: Box::new(factory),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn subscribe(self: &Arc<Self>, key: K) -> StoreSubscription<K, S> {
        let store = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_insert_with(|| {
                tracing::debug!(?key, "constructing store");
                Entry {
                    store: (self.factory)(&key),
                    subscribers: 0,
                }
            });
            entry.subscribers += 1;
            entry.store.clone()
        };

        StoreSubscription {
            registry: Arc::clone(self),
            key,
            store,
            released: false,
        }
    }

    /// The live store for `key`, without subscribing to it.
    pub fn get(&self, key: &K) -> Option<S> {
        self.entries.lock().get(key).map(|entry| entry.store.clone())
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.entries
            .lock()
            .get(key)
            .map_or(0, |entry| entry.subscribers)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn release(&self, key: &K) {
        let discarded = {
            let mut entries = self.entries.lock();
            let last_subscriber_left = entries.get_mut(key).is_some_and(|entry| {
                entry.subscribers -= 1;
                entry.subscribers == 0
            });

            if last_subscriber_left {
                entries.remove(key).map(|entry| entry.store)
            } else {
                None
            }
        };

        if let Some(store) = discarded {
            tracing::debug!(?key, "last subscriber left, discarding store");
            store.teardown();
        }
    }
}

/// A counted reference to a registered store. Released by
/// [`unsubscribe`](Self::unsubscribe) or on drop.
pub struct StoreSubscription<K, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    S: RegisteredStore,
{
    registry: Arc<StoreRegistry<K, S>>,
    key: K,
    store: S,
    released: bool,
}

impl<K, S> StoreSubscription<K, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    S: RegisteredStore,
{
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn key(&self) -> &K {
        &self.key
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.key);
        }
    }
}

impl<K, S> Drop for StoreSubscription<K, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    S: RegisteredStore,
{
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use crate::{AsyncStore, StoreOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with(
        provider: &Arc<ScriptedProvider>,
        constructed: &Arc<AtomicUsize>,
    ) -> Arc<StoreRegistry<String, AsyncStore<domain::models::FetchParams>>> {
        let provider = Arc::clone(provider);
        let constructed = Arc::clone(constructed);
        StoreRegistry::new(move |_key: &String| {
            constructed.fetch_add(1, Ordering::SeqCst);
            AsyncStore::new(provider.clone(), StoreOptions::default())
        })
    }

    #[tokio::test]
    async fn subscribers_share_one_instance() {
        let provider = Arc::new(ScriptedProvider::new());
        let constructed = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(&provider, &constructed);

        let first = registry.subscribe("player".to_owned());
        let second = registry.subscribe("player".to_owned());

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.subscriber_count(&"player".to_owned()), 2);
        assert_eq!(first.key(), second.key());

        let _other = registry.subscribe("other".to_owned());
        assert_eq!(constructed.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn last_unsubscribe_discards_store_and_destroys_provider_once() {
        let provider = Arc::new(ScriptedProvider::new());
        let constructed = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(&provider, &constructed);
        let key = "player".to_owned();

        let first = registry.subscribe(key.clone());
        let second = registry.subscribe(key.clone());

        first.unsubscribe();
        assert!(registry.get(&key).is_some());
        assert_eq!(provider.destroyed(), 0);

        drop(second);
        assert!(registry.get(&key).is_none());
        assert!(registry.is_empty());
        assert_eq!(provider.destroyed(), 1);

        let _third = registry.subscribe(key.clone());
        assert_eq!(constructed.load(Ordering::SeqCst), 2);
        assert_eq!(provider.destroyed(), 1);
    }
}
