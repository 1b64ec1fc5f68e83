//! Narrower call surfaces layered over a [`ResourceApi`]
//!
//! Each layer only depends on the one beneath it:
//!
//! ```no_run
//! # use kubegen_client::{Api, Client};
//! use kubegen_client::api::{Infallible, Namespaced, Optionless};
//! use k8s_openapi::api::core::v1::Pod;
//!
//! # async fn wrapper(client: Client) {
//! let pods: Api<Pod> = Api::new(client).unwrap();
//! let pods = Infallible::new(Optionless::new(Namespaced::new(pods, "apps")));
//! let blog: Pod = pods.get("blog").await;
//! # }
//! ```
use async_trait::async_trait;

use crate::{api::ResourceApi, watcher::Watcher, Error, Result};
use kubegen_core::{
    object::ObjectList,
    params::{DeleteParams, GetParams, ListParams, PostParams},
    Resource,
};

/// The operation set with the namespace already chosen
#[async_trait]
pub trait NamespacedApi: Send + Sync {
    /// The type the api is bound to
    type Resource: Resource;

    /// The namespace every call is made in
    fn namespace(&self) -> &str;

    /// Get a named resource
    async fn get(&self, name: &str, gp: &GetParams) -> Result<Self::Resource>;
    /// Create a resource in the bound namespace
    async fn create(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource>;
    /// Replace a resource in the bound namespace
    async fn update(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource>;
    /// Delete a named resource
    async fn delete(&self, name: &str, dp: &DeleteParams) -> Result<()>;
    /// List resources
    async fn list(&self, lp: &ListParams) -> Result<ObjectList<Self::Resource>>;
    /// Watch resources
    async fn watch(&self, lp: &ListParams) -> Result<Watcher<Self::Resource>>;
}

/// A [`ResourceApi`] bound to one namespace
///
/// Objects passed to `create` and `update` without a namespace are placed in the bound one.
/// Objects naming a different namespace are rejected with [`Error::NamespaceMismatch`]
/// before anything is sent.
#[derive(Clone, Debug)]
pub struct Namespaced<A> {
    api: A,
    namespace: String,
}

impl<A: ResourceApi> Namespaced<A> {
    /// Bind `api` to `namespace`
    pub fn new(api: A, namespace: &str) -> Self {
        Self {
            api,
            namespace: namespace.to_string(),
        }
    }

    /// The wrapped api
    pub fn inner(&self) -> &A {
        &self.api
    }

    fn scoped(&self, obj: &A::Resource) -> Result<A::Resource> {
        match obj.meta().namespace.as_deref() {
            None | Some("") => {
                let mut obj = obj.clone();
                obj.meta_mut().namespace = Some(self.namespace.clone());
                Ok(obj)
            }
            Some(ns) if ns == self.namespace => Ok(obj.clone()),
            Some(ns) => Err(Error::NamespaceMismatch {
                expected: self.namespace.clone(),
                found: ns.to_string(),
            }),
        }
    }
}

#[async_trait]
impl<A: ResourceApi> NamespacedApi for Namespaced<A> {
    type Resource = A::Resource;

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &str, gp: &GetParams) -> Result<Self::Resource> {
        self.api.get(name, &self.namespace, gp).await
    }

    async fn create(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource> {
        let obj = self.scoped(obj)?;
        self.api.create(&obj, pp).await
    }

    async fn update(&self, obj: &Self::Resource, pp: &PostParams) -> Result<Self::Resource> {
        let obj = self.scoped(obj)?;
        self.api.update(&obj, pp).await
    }

    async fn delete(&self, name: &str, dp: &DeleteParams) -> Result<()> {
        self.api.delete(name, &self.namespace, dp).await
    }

    async fn list(&self, lp: &ListParams) -> Result<ObjectList<Self::Resource>> {
        self.api.list(&self.namespace, lp).await
    }

    async fn watch(&self, lp: &ListParams) -> Result<Watcher<Self::Resource>> {
        self.api.watch(&self.namespace, lp).await
    }
}

/// The namespaced operation set with default parameters
#[async_trait]
pub trait OptionlessApi: Send + Sync {
    /// The type the api is bound to
    type Resource: Resource;

    /// Get a named resource
    async fn get(&self, name: &str) -> Result<Self::Resource>;
    /// Create a resource
    async fn create(&self, obj: &Self::Resource) -> Result<Self::Resource>;
    /// Replace a resource
    async fn update(&self, obj: &Self::Resource) -> Result<Self::Resource>;
    /// Delete a named resource
    async fn delete(&self, name: &str) -> Result<()>;
    /// List resources
    async fn list(&self) -> Result<ObjectList<Self::Resource>>;
    /// Watch resources
    async fn watch(&self) -> Result<Watcher<Self::Resource>>;
}

/// A [`NamespacedApi`] calling with default parameters
#[derive(Clone, Debug)]
pub struct Optionless<A> {
    api: A,
}

impl<A: NamespacedApi> Optionless<A> {
    /// Wrap `api`
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The wrapped api
    pub fn inner(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: NamespacedApi> OptionlessApi for Optionless<A> {
    type Resource = A::Resource;

    async fn get(&self, name: &str) -> Result<Self::Resource> {
        self.api.get(name, &GetParams::default()).await
    }

    async fn create(&self, obj: &Self::Resource) -> Result<Self::Resource> {
        self.api.create(obj, &PostParams::default()).await
    }

    async fn update(&self, obj: &Self::Resource) -> Result<Self::Resource> {
        self.api.update(obj, &PostParams::default()).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.api.delete(name, &DeleteParams::default()).await
    }

    async fn list(&self) -> Result<ObjectList<Self::Resource>> {
        self.api.list(&ListParams::default()).await
    }

    async fn watch(&self) -> Result<Watcher<Self::Resource>> {
        self.api.watch(&ListParams::default()).await
    }
}

/// An [`OptionlessApi`] that panics instead of returning errors
///
/// Removes all partial failure handling. Only for tests and bootstrap code that cannot
/// continue without the result.
///
/// # Panics
///
/// Every method panics with the message of the underlying error.
#[derive(Clone, Debug)]
pub struct Infallible<A> {
    api: A,
}

fn expect_ok<T>(verb: &str, res: Result<T>) -> T {
    match res {
        Ok(val) => val,
        Err(err) => panic!("{verb} failed: {err}"),
    }
}

impl<A: OptionlessApi> Infallible<A> {
    /// Wrap `api`
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The wrapped api
    pub fn inner(&self) -> &A {
        &self.api
    }

    /// Get a named resource
    pub async fn get(&self, name: &str) -> A::Resource {
        expect_ok("get", self.api.get(name).await)
    }

    /// Create a resource
    pub async fn create(&self, obj: &A::Resource) -> A::Resource {
        expect_ok("create", self.api.create(obj).await)
    }

    /// Replace a resource
    pub async fn update(&self, obj: &A::Resource) -> A::Resource {
        expect_ok("update", self.api.update(obj).await)
    }

    /// Delete a named resource
    pub async fn delete(&self, name: &str) {
        expect_ok("delete", self.api.delete(name).await)
    }

    /// List resources
    pub async fn list(&self) -> ObjectList<A::Resource> {
        expect_ok("list", self.api.list().await)
    }

    /// Watch resources
    pub async fn watch(&self) -> Watcher<A::Resource> {
        expect_ok("watch", self.api.watch().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::Body, Api, Client};
    use futures::pin_mut;
    use http::{Request, Response};
    use k8s_openapi::api::core::v1::Secret;
    use kubegen_core::metadata::ObjectMeta;
    use tower_test::mock;

    fn secret(ns: Option<&str>) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("s".into()),
                namespace: ns.map(String::from),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn namespaced_rejects_foreign_namespaces_before_sending() {
        let (mock_service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let secrets: Api<Secret> = Api::new(Client::new(mock_service)).unwrap();
        let secrets = Namespaced::new(secrets, "mine");
        let err = secrets
            .create(&secret(Some("theirs")), &PostParams::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NamespaceMismatch { ref expected, ref found } if expected == "mine" && found == "theirs"
        ));
    }

    #[tokio::test]
    async fn namespaced_fills_in_missing_namespaces() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/mine/secrets?");
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&secret(Some("mine"))).unwrap()))
                    .unwrap(),
            );
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/mine/secrets/s");
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&secret(Some("mine"))).unwrap()))
                    .unwrap(),
            );
        });

        let secrets: Api<Secret> = Api::new(Client::new(mock_service)).unwrap();
        let secrets = Infallible::new(Optionless::new(Namespaced::new(secrets, "mine")));
        let created = secrets.create(&secret(None)).await;
        assert_eq!(created.metadata.namespace.as_deref(), Some("mine"));
        let fetched = secrets.get("s").await;
        assert_eq!(fetched.metadata.name.as_deref(), Some("s"));
        assert_eq!(secrets.inner().inner().namespace(), "mine");
        spawned.await.unwrap();
    }

    #[tokio::test]
    #[should_panic(expected = "create failed")]
    async fn infallible_panics_with_the_error() {
        let (mock_service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let secrets: Api<Secret> = Api::new(Client::new(mock_service)).unwrap();
        let secrets = Infallible::new(Optionless::new(Namespaced::new(secrets, "mine")));
        secrets.create(&secret(Some("theirs"))).await;
    }
}
