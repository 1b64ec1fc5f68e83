//! Read access to an informer cache by label selector
use std::sync::Arc;

use crate::reflector::{ObjectRef, Store};
use kubegen_core::{labels::Selector, Resource, ResourceExt};

/// Lists and gets cached objects
///
/// Results are ordered by namespace, then name. Everything returned is shared with the cache
/// and must be cloned before being changed.
pub trait Lister<K> {
    /// Every cached object matching `selector`
    fn list(&self, selector: &Selector) -> Vec<Arc<K>>;

    /// A cluster scoped object by name
    fn get(&self, name: &str) -> Option<Arc<K>>;

    /// Narrow the lister to one namespace
    fn by_namespace(&self, namespace: &str) -> NamespaceLister<K>;
}

impl<K: Resource> Lister<K> for Store<K> {
    fn list(&self, selector: &Selector) -> Vec<Arc<K>> {
        self.select(|_, obj| selector.matches(obj.labels()))
    }

    fn get(&self, name: &str) -> Option<Arc<K>> {
        Store::get(self, &ObjectRef::new(name))
    }

    fn by_namespace(&self, namespace: &str) -> NamespaceLister<K> {
        NamespaceLister {
            store: self.clone(),
            namespace: namespace.to_string(),
        }
    }
}

/// A [`Lister`] narrowed to one namespace
#[derive(Clone, Debug)]
pub struct NamespaceLister<K> {
    store: Store<K>,
    namespace: String,
}

impl<K: Resource> NamespaceLister<K> {
    /// The namespace listed
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Every cached object in the namespace matching `selector`
    pub fn list(&self, selector: &Selector) -> Vec<Arc<K>> {
        self.store.select(|key, obj| {
            key.namespace.as_deref() == Some(self.namespace.as_str()) && selector.matches(obj.labels())
        })
    }

    /// An object in the namespace by name
    pub fn get(&self, name: &str) -> Option<Arc<K>> {
        let key = ObjectRef::new(name).within(&self.namespace);
        self.store.get(&key).filter(|obj| obj.meta().namespace == key.namespace)
    }
}
