//! A registry of Rust types to their group, version and kind
use crate::{gvk::GroupVersionKind, resource::Resource};
use std::{any::TypeId, collections::HashMap};
use thiserror::Error;

/// Neither the type nor the scheme knows where the type is served
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("type {0} is not registered in the scheme and does not describe its own resource")]
pub struct UnregisteredTypeError(pub String);

/// Maps Rust types to the [`GroupVersionKind`] they are served as
///
/// Only needed for types that do not describe themselves through
/// [`Resource::api_resource`]; `k8s-openapi` types never need registering.
///
/// ```
/// use kubegen_core::{GroupVersionKind, Scheme};
/// use k8s_openapi::api::core::v1::ConfigMap;
///
/// let mut scheme = Scheme::new();
/// scheme.register::<ConfigMap>(GroupVersionKind::gvk("", "v1", "ConfigMap"));
/// assert!(scheme.is_registered::<ConfigMap>());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Scheme {
    kinds: HashMap<TypeId, GroupVersionKind>,
}

impl Scheme {
    /// An empty scheme
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `K` as being served as `gvk`, replacing any earlier registration
    pub fn register<K: Resource>(&mut self, gvk: GroupVersionKind) -> &mut Self {
        self.kinds.insert(TypeId::of::<K>(), gvk);
        self
    }

    /// Builder variant of [`Scheme::register`]
    #[must_use]
    pub fn with<K: Resource>(mut self, gvk: GroupVersionKind) -> Self {
        self.register::<K>(gvk);
        self
    }

    /// The kind `K` was registered as
    pub fn kind_of<K: Resource>(&self) -> Option<&GroupVersionKind> {
        self.kinds.get(&TypeId::of::<K>())
    }

    /// Whether `K` was registered
    pub fn is_registered<K: Resource>(&self) -> bool {
        self.kind_of::<K>().is_some()
    }
}
