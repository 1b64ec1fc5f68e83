use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::{
    api::{Api, ResourceApi},
    watcher::Watcher,
    Error, Result,
};
use kubegen_core::{object::ObjectList, params::*, DynamicObject, Resource};

/// PUT/POST/GET/DELETE abstractions
#[async_trait]
impl<K> ResourceApi for Api<K>
where
    K: Resource + Serialize + DeserializeOwned + Debug,
{
    type Resource = K;

    /// Get a named resource
    ///
    /// ```no_run
    /// # use kubegen_client::{Api, ResourceApi};
    /// use kubegen_client::api::GetParams;
    /// use k8s_openapi::api::core::v1::Pod;
    ///
    /// # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client: kubegen_client::Client = todo!();
    /// let pods: Api<Pod> = Api::new(client)?;
    /// let p: Pod = pods.get("blog", "apps", &GetParams::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn get(&self, name: &str, namespace: &str, gp: &GetParams) -> Result<K> {
        let mut req = self.request(namespace).get(name, gp).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("get");
        self.client.request::<K>(req).await
    }

    /// Create a resource
    ///
    /// The object is posted to the collection of the namespace in its metadata.
    /// Type information is stamped on the payload when the type does not serialize its own.
    async fn create(&self, obj: &K, pp: &PostParams) -> Result<K> {
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let bytes = self.payload(obj)?;
        let mut req = self
            .request(&namespace)
            .create(pp, bytes)
            .map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("create");
        self.client.request::<K>(req).await
    }

    /// Replace a resource entirely with a new one
    ///
    /// The object needs a name. Any `metadata.resourceVersion` it carries is checked by the server.
    async fn update(&self, obj: &K, pp: &PostParams) -> Result<K> {
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let name = obj.meta().name.clone().unwrap_or_default();
        let bytes = self.payload(obj)?;
        let mut req = self
            .request(&namespace)
            .replace(&name, pp, bytes)
            .map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("replace");
        self.client.request::<K>(req).await
    }

    async fn delete(&self, name: &str, namespace: &str, dp: &DeleteParams) -> Result<()> {
        let mut req = self
            .request(namespace)
            .delete(name, dp)
            .map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("delete");
        // The server answers with either the deleted object or a Status
        self.client.request_text(req).await?;
        Ok(())
    }

    /// Get a list of resources
    ///
    /// A `timeout` in `lp` is sent to the server and also bounds the call locally.
    async fn list(&self, namespace: &str, lp: &ListParams) -> Result<ObjectList<K>> {
        let mut req = self.request(namespace).list(lp).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("list");
        let fut = self.client.request::<ObjectList<K>>(req);
        match lp.timeout_duration() {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::RequestTimeout(limit))?,
            None => fut.await,
        }
    }

    /// Watch a list of resources
    ///
    /// The returned [`Watcher`] only yields objects of the bound kind.
    /// See [`Termination`](crate::Termination) for how it ends.
    async fn watch(&self, namespace: &str, lp: &ListParams) -> Result<Watcher<K>> {
        let mut req = self.request(namespace).watch(lp).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("watch");
        let events = self.client.request_events::<DynamicObject>(req).await?;
        Ok(Watcher::new(self.resource.clone(), events))
    }
}

impl<K> Api<K>
where
    K: Resource + Serialize,
{
    fn payload(&self, obj: &K) -> Result<Vec<u8>> {
        let erased = DynamicObject::from_resource(obj, &self.resource).map_err(Error::ParseObject)?;
        serde_json::to_vec(&erased).map_err(Error::SerdeError)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::{Api, DeleteParams, ListParams, PostParams, ResourceApi},
        client::Body,
        Client, Error,
    };
    use futures::pin_mut;
    use http::{Request, Response};
    use http_body_util::BodyExt;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kubegen_core::{metadata::ObjectMeta, GroupVersionKind, Resource, Scheme};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tower_test::mock;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Party {
        metadata: ObjectMeta,
        guests: u32,
    }

    impl Resource for Party {
        fn meta(&self) -> &ObjectMeta {
            &self.metadata
        }

        fn meta_mut(&mut self) -> &mut ObjectMeta {
            &mut self.metadata
        }
    }

    fn party(name: &str, ns: &str) -> Party {
        Party {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(ns.into()),
                ..ObjectMeta::default()
            },
            guests: 3,
        }
    }

    fn scheme() -> Scheme {
        Scheme::new().with::<Party>(GroupVersionKind::gvk("events.example.com", "v1", "Party"))
    }

    #[tokio::test]
    async fn unregistered_types_fail_before_any_request() {
        let (mock_service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let err = Api::<Party>::new(Client::new(mock_service)).err().unwrap();
        assert!(matches!(err, Error::UnregisteredType(_)));
    }

    #[tokio::test]
    async fn create_posts_to_the_collection_with_type_information() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::POST);
            assert_eq!(
                request.uri().to_string(),
                "/apis/events.example.com/v1/namespaces/ns/parties?"
            );
            let body = request.into_body().collect().await.unwrap().to_bytes();
            let sent: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(sent["apiVersion"], "events.example.com/v1");
            assert_eq!(sent["kind"], "Party");
            assert_eq!(sent["guests"], 3);
            send.send_response(Response::builder().body(Body::from(body.to_vec())).unwrap());
        });

        let parties = Api::<Party>::with_scheme(Client::new(mock_service), &scheme()).unwrap();
        let created = parties.create(&party("p1", "ns"), &PostParams::default()).await.unwrap();
        assert_eq!(created.metadata.name.as_deref(), Some("p1"));
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn update_requires_a_name() {
        let (mock_service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let parties = Api::<Party>::with_scheme(Client::new(mock_service), &scheme()).unwrap();
        let err = parties.update(&party("", "ns"), &PostParams::default()).await.unwrap_err();
        assert!(matches!(err, Error::BuildRequest(_)));
    }

    #[tokio::test]
    async fn update_and_delete_address_the_item() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::PUT);
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/ns/configmaps/cm?");
            let body = request.into_body().collect().await.unwrap().to_bytes();
            send.send_response(Response::builder().body(Body::from(body.to_vec())).unwrap());

            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::DELETE);
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/ns/configmaps/cm?");
            send.send_response(
                Response::builder()
                    .body(Body::from(r#"{"kind":"Status","status":"Success"}"#))
                    .unwrap(),
            );
        });

        let cms: Api<ConfigMap> = Api::new(Client::new(mock_service)).unwrap();
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("cm".into()),
                namespace: Some("ns".into()),
                ..ObjectMeta::default()
            },
            ..ConfigMap::default()
        };
        cms.update(&cm, &PostParams::default()).await.unwrap();
        cms.delete("cm", "ns", &DeleteParams::default()).await.unwrap();
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn list_across_namespaces_with_selector() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.uri().to_string(), "/api/v1/configmaps?&labelSelector=a%3Db");
            let list = serde_json::json!({
                "apiVersion": "v1",
                "kind": "ConfigMapList",
                "metadata": { "resourceVersion": "7" },
                "items": [
                    { "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "x", "namespace": "one" } },
                    { "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "y", "namespace": "two" } },
                ]
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&list).unwrap()))
                    .unwrap(),
            );
        });

        let cms: Api<ConfigMap> = Api::new(Client::new(mock_service)).unwrap();
        let list = cms.list("", &ListParams::default().labels("a=b")).await.unwrap();
        let names: Vec<_> = list.iter().filter_map(|cm| cm.metadata.name.clone()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(list.metadata.resource_version.as_deref(), Some("7"));
        spawned.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn list_is_bounded_by_its_timeout() {
        // the handle is kept but never answers
        let (mock_service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let cms: Api<ConfigMap> = Api::new(Client::new(mock_service)).unwrap();
        let err = cms
            .list("ns", &ListParams::default().timeout(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestTimeout(d) if d == Duration::from_secs(2)));
    }
}
