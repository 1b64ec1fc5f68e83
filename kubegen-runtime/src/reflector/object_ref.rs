use std::fmt::{Display, Formatter};

use kubegen_core::Resource;

/// A namespaced (if relevant) reference to an object in a [`Store`](super::Store)
///
/// ```
/// use kubegen_runtime::reflector::ObjectRef;
/// assert_ne!(ObjectRef::new("a"), ObjectRef::new("a").within("ns"));
/// assert_eq!(ObjectRef::new("a").within("ns").to_string(), "ns/a");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// The namespace of the object
    ///
    /// `None` for cluster scoped objects. Ordered first so refs sort by namespace, then name.
    pub namespace: Option<String>,
    /// The name of the object
    pub name: String,
}

impl ObjectRef {
    /// A cluster scoped reference
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Place the reference in `namespace`, an empty namespace means cluster scoped
    #[must_use]
    pub fn within(mut self, namespace: &str) -> Self {
        self.namespace = (!namespace.is_empty()).then(|| namespace.to_string());
        self
    }

    /// The reference to `obj`
    ///
    /// Objects served by a backend always carry a name; one without is keyed by the empty name.
    #[must_use]
    pub fn from_obj<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        Self::new(meta.name.as_deref().unwrap_or_default()).within(meta.namespace.as_deref().unwrap_or_default())
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}
