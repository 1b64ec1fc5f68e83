//! API helpers for structured interaction with a Kubernetes style API

mod core_methods;
use std::{fmt::Debug, sync::Arc};

mod ext;
pub use ext::ResourceApiExt;

mod subresource;
pub use subresource::Loggable;

pub mod variants;
pub use variants::{Infallible, Namespaced, NamespacedApi, Optionless, OptionlessApi};

// Re-exports from kubegen-core
pub use kubegen_core::{
    discovery::ApiResource,
    dynamic::DynamicObject,
    gvk::{GroupVersionKind, GroupVersionResource},
    metadata::{ListMeta, ObjectMeta, TypeMeta},
    object::ObjectList,
    params::{DeleteParams, GetParams, ListParams, PostParams, Preconditions},
    request::Request,
    subresource::LogParams,
    watch::WatchEvent,
    Resource, ResourceExt, NAMESPACE_ALL,
};
use kubegen_core::Scheme;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::{watcher::Watcher, Client, Result};

/// The operation set every backend offers for one bound resource type
///
/// Implemented by [`Api`] against a real apiserver and by `FakeApi` from `kubegen-fake`
/// against an in-memory tracker, so calling code can be written once against this trait.
///
/// The namespace argument is the namespace to address; [`NAMESPACE_ALL`] (the empty string)
/// addresses every namespace for `list` and `watch`, and cluster scoped resources.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// The type the api is bound to
    type Resource: Resource + Serialize + DeserializeOwned + Debug;

    /// Get a named resource
    async fn get(&self, name: &str, namespace: &str, gp: &GetParams) -> Result<Self::Resource>;

    /// Create a resource in the namespace recorded in its metadata
    ///
    /// Returns the canonical copy of the object as stored.
    async fn create(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource>;

    /// Replace a resource addressed by the name and namespace recorded in its metadata
    ///
    /// A non-empty `metadata.resourceVersion` that is stale fails with a `Conflict`.
    async fn update(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource>;

    /// Delete a named resource
    async fn delete(&self, name: &str, namespace: &str, dp: &DeleteParams) -> Result<()>;

    /// List resources, in the order the backend returned them
    async fn list(&self, namespace: &str, lp: &ListParams) -> Result<ObjectList<Self::Resource>>;

    /// Watch resources for changes, starting from the version in `lp` if any
    async fn watch(&self, namespace: &str, lp: &ListParams) -> Result<Watcher<Self::Resource>>;
}

#[async_trait]
impl<A> ResourceApi for Arc<A>
where
    A: ResourceApi + ?Sized,
{
    type Resource = A::Resource;

    async fn get(&self, name: &str, namespace: &str, gp: &GetParams) -> Result<Self::Resource> {
        (**self).get(name, namespace, gp).await
    }

    async fn create(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource> {
        (**self).create(obj, pp).await
    }

    async fn update(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource> {
        (**self).update(obj, pp).await
    }

    async fn delete(&self, name: &str, namespace: &str, dp: &DeleteParams) -> Result<()> {
        (**self).delete(name, namespace, dp).await
    }

    async fn list(&self, namespace: &str, lp: &ListParams) -> Result<ObjectList<Self::Resource>> {
        (**self).list(namespace, lp).await
    }

    async fn watch(&self, namespace: &str, lp: &ListParams) -> Result<Watcher<Self::Resource>> {
        (**self).watch(namespace, lp).await
    }
}

/// The generic Api abstraction
///
/// This abstracts over a [`Request`] and a type `K` so that
/// we get automatic serialization/deserialization on the api calls
/// implemented by the [`Resource`].
///
/// The binding of `K` to a resource is resolved once at construction.
/// A type that neither describes itself nor is registered in the given [`Scheme`]
/// fails there, before any request is made.
#[derive(Clone)]
pub struct Api<K> {
    /// The resolved resource every path is built from
    pub(crate) resource: ApiResource,
    /// The client to use (from this library)
    pub(crate) client: Client,
    /// Note: Using `iter::Empty` over `PhantomData`, because we never actually keep any
    /// `K` objects, so `Empty` better models our constraints (in particular, `Empty<K>`
    /// is `Send`, even if `K` may not be).
    pub(crate) _phantom: std::iter::Empty<K>,
}

impl<K: Resource> Api<K> {
    /// Bind `K` using only its own description
    ///
    /// ```no_run
    /// # use kubegen_client::{Api, Client};
    /// # let client: Client = todo!();
    /// use k8s_openapi::api::core::v1::Pod;
    /// let api: Api<Pod> = Api::new(client).unwrap();
    /// ```
    pub fn new(client: Client) -> Result<Self> {
        Self::with_scheme(client, &Scheme::new())
    }

    /// Bind `K`, falling back to the kind registered in `scheme`
    pub fn with_scheme(client: Client, scheme: &Scheme) -> Result<Self> {
        let resource = ApiResource::resolve::<K>(scheme)?;
        Ok(Self::from_resource(client, resource))
    }

    /// Bind `K` to an already resolved resource
    pub fn from_resource(client: Client, resource: ApiResource) -> Self {
        Self {
            resource,
            client,
            _phantom: std::iter::empty(),
        }
    }

    /// The resource `K` is bound to
    pub fn api_resource(&self) -> &ApiResource {
        &self.resource
    }

    /// Consume self and return the [`Client`]
    pub fn into_client(self) -> Client {
        self.into()
    }

    /// Request builder for the collection in `namespace`
    pub(crate) fn request(&self, namespace: &str) -> Request {
        Request::new(self.resource.url_path(namespace))
    }
}

impl<K> From<Api<K>> for Client {
    fn from(api: Api<K>) -> Self {
        api.client
    }
}
