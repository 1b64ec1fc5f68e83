use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use super::ObjectRef;
use kubegen_client::Event;
use kubegen_core::Resource;

type Cache<K> = Arc<RwLock<AHashMap<ObjectRef, Arc<K>>>>;

/// A writable Store handle
///
/// This is exclusive since it's not safe to share a single `Store` between multiple informers.
/// In particular, [`Writer::replace`] will clobber the state of other connected writers.
#[derive(Debug)]
pub struct Writer<K> {
    store: Cache<K>,
}

impl<K> Default for Writer<K> {
    fn default() -> Self {
        Self {
            store: Arc::default(),
        }
    }
}

impl<K: Resource> Writer<K> {
    /// Return a read handle to the store
    ///
    /// Multiple read handles may be obtained, by either calling `as_reader` multiple times,
    /// or by calling `Store::clone()` afterwards.
    #[must_use]
    pub fn as_reader(&self) -> Store<K> {
        Store {
            store: self.store.clone(),
        }
    }

    /// Applies a single watch event to the store
    pub fn apply(&mut self, event: Event<K>) {
        match event {
            Event::Added(obj) | Event::Modified(obj) => {
                self.store.write().insert(ObjectRef::from_obj(&obj), Arc::new(obj));
            }
            Event::Deleted(obj) => {
                self.store.write().remove(&ObjectRef::from_obj(&obj));
            }
        }
    }

    /// Replace the whole store with a fresh list
    pub fn replace(&mut self, objects: impl IntoIterator<Item = K>) {
        let fresh = objects
            .into_iter()
            .map(|obj| (ObjectRef::from_obj(&obj), Arc::new(obj)))
            .collect::<AHashMap<_, _>>();
        *self.store.write() = fresh;
    }
}

/// A readable cache of objects of kind `K`
///
/// Cloning will produce a new reference to the same backing store.
///
/// Cannot be constructed directly since one writer handle is required,
/// use `Writer::as_reader()` instead.
#[derive(Debug)]
pub struct Store<K> {
    store: Cache<K>,
}

impl<K> Clone for Store<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K> Store<K> {
    /// Retrieve the entry referred to by `key`, if it is in the cache.
    ///
    /// A namespaced `key` also finds a cluster scoped object of the same name.
    ///
    /// Note that this is a cache and may be stale. Deleted objects may still exist in the cache
    /// despite having been deleted in the backend, and new objects may not yet exist in the cache.
    #[must_use]
    pub fn get(&self, key: &ObjectRef) -> Option<Arc<K>> {
        let store = self.store.read();
        store
            .get(key)
            // Try to erase the namespace and try again, in case the object is cluster-scoped
            .or_else(|| {
                key.namespace.as_ref()?;
                store.get(&ObjectRef::new(&key.name))
            })
            .cloned()
    }

    /// Return a full snapshot of the current values
    #[must_use]
    pub fn state(&self) -> Vec<Arc<K>> {
        self.store.read().values().cloned().collect()
    }

    /// Snapshot of the entries matching `filter`, ordered by reference
    pub(crate) fn select(&self, filter: impl Fn(&ObjectRef, &K) -> bool) -> Vec<Arc<K>> {
        let store = self.store.read();
        let mut found = store
            .iter()
            .filter(|(key, obj)| filter(key, obj))
            .collect::<Vec<_>>();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found.into_iter().map(|(_, obj)| obj.clone()).collect()
    }

    /// The number of cached objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}
