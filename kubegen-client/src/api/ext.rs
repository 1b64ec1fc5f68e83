use async_trait::async_trait;

use crate::{
    api::{variants::Namespaced, ResourceApi},
    Error, Result,
};
use kubegen_core::{object::ObjectList, params::{ListParams, PostParams}};

/// Conveniences available on every [`ResourceApi`]
#[async_trait]
pub trait ResourceApiExt: ResourceApi {
    /// Create the object, replacing it instead when it already exists
    ///
    /// Only an `AlreadyExists` failure of the create falls back to an update,
    /// every other error is returned as is. The two steps are not atomic: the object can
    /// change or disappear between them, in which case the update fails normally.
    async fn create_or_update(
        &self,
        obj: &Self::Resource,
        pp: &PostParams,
    ) -> Result<Self::Resource> {
        match self.create(obj, pp).await {
            Err(Error::Api(ae)) if ae.is_already_exists() => {
                tracing::debug!("{}, updating instead", ae.message);
                self.update(obj, pp).await
            }
            res => res,
        }
    }

    /// List resources, panicking when that fails
    ///
    /// # Panics
    ///
    /// Panics with the message of the error when the list fails.
    /// Meant for tests and bootstrap code without a way to recover.
    async fn must_list(&self, namespace: &str, lp: &ListParams) -> ObjectList<Self::Resource> {
        match self.list(namespace, lp).await {
            Ok(list) => list,
            Err(err) => panic!("list failed: {err}"),
        }
    }

    /// Bind this api to a single namespace
    fn namespaced(self, namespace: &str) -> Namespaced<Self>
    where
        Self: Sized,
    {
        Namespaced::new(self, namespace)
    }
}

impl<A> ResourceApiExt for A where A: ResourceApi + ?Sized {}

#[cfg(test)]
mod tests {
    use super::ResourceApiExt;
    use crate::{
        api::{Api, PostParams},
        client::Body,
        Client,
    };
    use futures::pin_mut;
    use http::{Request, Response, StatusCode};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kubegen_core::{metadata::ObjectMeta, ErrorResponse, GroupVersionResource};
    use tower_test::mock;

    fn status(code: StatusCode, err: ErrorResponse) -> Response<Body> {
        Response::builder()
            .status(code)
            .body(Body::from(serde_json::to_vec(&err).unwrap()))
            .unwrap()
    }

    fn cm() -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("cm".into()),
                namespace: Some("ns".into()),
                ..ObjectMeta::default()
            },
            ..ConfigMap::default()
        }
    }

    #[tokio::test]
    async fn create_or_update_falls_back_on_already_exists() {
        let gvr = GroupVersionResource::gvr("", "v1", "configmaps");
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::POST);
            send.send_response(status(StatusCode::CONFLICT, ErrorResponse::already_exists(&gvr, "cm")));
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::PUT);
            send.send_response(Response::builder().body(Body::from(serde_json::to_vec(&cm()).unwrap())).unwrap());
        });
        let cms: Api<ConfigMap> = Api::new(Client::new(mock_service)).unwrap();
        let res = cms.create_or_update(&cm(), &PostParams::default()).await.unwrap();
        assert_eq!(res.metadata.name.as_deref(), Some("cm"));
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn create_or_update_passes_other_errors_through() {
        let gvr = GroupVersionResource::gvr("", "v1", "configmaps");
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_, send) = handle.next_request().await.expect("service not called");
            send.send_response(status(
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::invalid(&gvr, "cm", "data: too large"),
            ));
        });
        let cms: Api<ConfigMap> = Api::new(Client::new(mock_service)).unwrap();
        let err = cms.create_or_update(&cm(), &PostParams::default()).await.unwrap_err();
        assert!(err.is_invalid());
        spawned.await.unwrap();
    }
}
