//! A basic API client for interacting with a Kubernetes style API
//!
//! The [`Client`] turns any tower `Service` speaking http into the transport used by
//! [`Api`](crate::Api). Connectors, TLS and authentication are layered into that service by the caller.
use bytes::Bytes;
use futures::{future::BoxFuture, Stream, StreamExt, TryStreamExt};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tower::{buffer::Buffer, util::BoxService, BoxError, Service, ServiceExt};

use crate::{error::ErrorResponse, Error, Result};
use kubegen_core::{response::reason, WatchEvent};

mod body;
pub use body::Body;

// Requests queued in front of the transport before callers wait for capacity
const BUFFER_CAPACITY: usize = 1024;

/// Client for talking to an apiserver through an arbitrary `Service` stack.
///
/// Cloning is cheap: clones queue onto the same buffered service.
#[derive(Clone)]
pub struct Client {
    inner: Buffer<Request<Body>, BoxFuture<'static, Result<Response<Body>, BoxError>>>,
}

impl Client {
    /// Create a [`Client`] using a custom `Service` stack.
    ///
    /// The service receives requests with paths relative to the apiserver root, so a base uri
    /// has to be set by one of its layers.
    ///
    /// # Example
    ///
    /// ```rust
    /// # async fn doc() {
    /// use http::{Request, Response};
    /// use kubegen_client::{client::Body, Client};
    ///
    /// let (service, _handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    /// let client = Client::new(service);
    /// # }
    /// ```
    pub fn new<S, B>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let service = service
            .map_response(|res: Response<B>| res.map(Body::wrap))
            .map_err(Into::into);
        Self {
            inner: Buffer::new(BoxService::new(service), BUFFER_CAPACITY),
        }
    }

    /// Send a request as is and hand back the response, whatever its status
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        tracing::trace!(method = %request.method(), uri = %request.uri(), "sending request");
        let mut svc = self.inner.clone();
        let ready = svc.ready().await.map_err(Error::Service)?;
        // layers of the service stack may fail with one of our own errors
        ready.call(request).await.map_err(|err| match err.downcast::<Error>() {
            Ok(ours) => *ours,
            Err(other) => Error::Service(other),
        })
    }

    /// Send a request and decode the JSON response as `T`
    pub async fn request<T>(&self, request: Request<Vec<u8>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let text = self.request_text(request).await?;
        serde_json::from_str(&text).map_err(|err| {
            tracing::warn!(error = %err, body = %text, "undecodable response");
            Error::SerdeError(err)
        })
    }

    /// Send a request and return the response body as text
    ///
    /// Failed statuses become [`Error::Api`].
    pub async fn request_text(&self, request: Request<Vec<u8>>) -> Result<String> {
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        let text = read_text(res.into_body()).await?;
        check_status(&text, status)?;
        Ok(text)
    }

    /// Send a watch request and decode its newline delimited [`WatchEvent`]s
    ///
    /// A failed status is returned as an error before any event is read.
    /// A line holding a bare `Status` object becomes an [`Error::Api`] item.
    pub async fn request_events<T>(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<impl Stream<Item = Result<WatchEvent<T>>> + Send + 'static>
    where
        T: Clone + DeserializeOwned + Send + 'static,
    {
        let res = self.send(request.map(Body::from)).await?;
        let (parts, body) = res.into_parts();
        if !parts.status.is_success() {
            let text = read_text(body).await?;
            check_status(&text, parts.status)?;
            // informational and redirect statuses carry no events either
            return Err(Error::Api(ErrorResponse {
                status: "Failure".into(),
                message: text,
                reason: reason::UNKNOWN.into(),
                code: parts.status.as_u16(),
                details: None,
            }));
        }

        let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
        let lines = FramedRead::new(reader, LinesCodec::new());
        Ok(lines.filter_map(|line| async move { decode_event(line) }))
    }
}

fn decode_event<T: DeserializeOwned>(line: Result<String, LinesCodecError>) -> Option<Result<WatchEvent<T>>> {
    let line = match line {
        Ok(line) => line,
        // chunked streams may be cut mid line when the server ends a long watch
        Err(LinesCodecError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            tracing::warn!(error = %err, "watch stream ended mid line");
            return None;
        }
        Err(LinesCodecError::Io(err)) => return Some(Err(Error::ReadEvents(err))),
        Err(LinesCodecError::MaxLineLengthExceeded) => return Some(Err(Error::LinesCodecMaxLineLengthExceeded)),
    };
    match serde_json::from_str::<WatchEvent<T>>(&line) {
        Ok(event) => Some(Ok(event)),
        // a partial trailing line
        Err(err) if err.is_eof() => None,
        Err(err) => match serde_json::from_str::<ErrorResponse>(&line) {
            Ok(status) => Some(Err(Error::Api(status))),
            Err(_) => Some(Err(Error::SerdeError(err))),
        },
    }
}

async fn read_text(body: Body) -> Result<String> {
    let bytes = body.collect().await?.to_bytes();
    String::from_utf8(bytes.to_vec()).map_err(Error::FromUtf8)
}

/// Turn a failed status into [`Error::Api`]
///
/// Servers answer failures with a `Status` object. When the body is something else,
/// a status is synthesized from the http code.
fn check_status(text: &str, status: StatusCode) -> Result<()> {
    if !(status.is_client_error() || status.is_server_error()) {
        return Ok(());
    }
    let err = serde_json::from_str::<ErrorResponse>(text).unwrap_or_else(|_| {
        tracing::warn!(%status, body = %text, "failure without a Status body");
        ErrorResponse {
            status: "Failure".into(),
            code: status.as_u16(),
            message: text.to_string(),
            reason: fallback_reason(status).into(),
            details: None,
        }
    });
    tracing::debug!(?err, "request failed");
    Err(Error::Api(err))
}

// Reason for a failure the server did not describe with a Status body
fn fallback_reason(s: StatusCode) -> &'static str {
    match s {
        StatusCode::NOT_FOUND => reason::NOT_FOUND,
        StatusCode::CONFLICT => reason::CONFLICT,
        StatusCode::GONE => reason::GONE,
        StatusCode::UNPROCESSABLE_ENTITY => reason::INVALID,
        StatusCode::BAD_REQUEST => reason::BAD_REQUEST,
        StatusCode::METHOD_NOT_ALLOWED => reason::METHOD_NOT_ALLOWED,
        StatusCode::GATEWAY_TIMEOUT => reason::TIMEOUT,
        StatusCode::INTERNAL_SERVER_ERROR => reason::INTERNAL_ERROR,
        _ => reason::UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::{Body, Client};
    use crate::{api::ListParams, Api, ResourceApi};

    use futures::{pin_mut, StreamExt};
    use http::{Request, Response, StatusCode};
    use k8s_openapi::api::core::v1::Pod;
    use kubegen_core::{params::GetParams, DynamicObject, WatchEvent};
    use tower_test::mock;

    #[tokio::test]
    async fn test_mock() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            // Receive a request for pod and respond with some data
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::GET);
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/default/pods/test");
            let pod: Pod = serde_json::from_value(serde_json::json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {
                    "name": "test",
                    "annotations": { "kubegen": "test" },
                },
                "spec": {
                    "containers": [{ "name": "test", "image": "test-image" }],
                }
            }))
            .unwrap();
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&pod).unwrap()))
                    .unwrap(),
            );
        });

        let pods: Api<Pod> = Api::new(Client::new(mock_service)).unwrap();
        let pod = pods.get("test", "default", &GetParams::default()).await.unwrap();
        assert_eq!(pod.metadata.annotations.unwrap().get("kubegen").unwrap(), "test");
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn status_bodies_become_api_errors() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_, send) = handle.next_request().await.expect("service not called");
            let status = serde_json::json!({
                "kind": "Status",
                "apiVersion": "v1",
                "status": "Failure",
                "message": "pods \"gone\" not found",
                "reason": "NotFound",
                "code": 404
            });
            send.send_response(
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Body::from(serde_json::to_vec(&status).unwrap()))
                    .unwrap(),
            );
            let (_, send) = handle.next_request().await.expect("service not called");
            send.send_response(
                Response::builder()
                    .status(StatusCode::CONFLICT)
                    .body(Body::from("not json"))
                    .unwrap(),
            );
        });

        let pods: Api<Pod> = Api::new(Client::new(mock_service)).unwrap();
        let err = pods.get("gone", "ns", &GetParams::default()).await.unwrap_err();
        assert!(err.is_not_found());
        let err = pods.get("other", "ns", &GetParams::default()).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.api_error().unwrap().code, 409);
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn decodes_newline_delimited_events() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.uri().to_string(), "/api/v1/pods?&watch=true");
            let lines = concat!(
                r#"{"type":"ADDED","object":{"apiVersion":"v1","kind":"Pod","metadata":{"name":"a"}}}"#,
                "\n",
                r#"{"type":"DELETED","object":{"apiVersion":"v1","kind":"Pod","metadata":{"name":"a"}}}"#,
                "\n",
            );
            send.send_response(Response::builder().body(Body::from(lines)).unwrap());
        });

        let client = Client::new(mock_service);
        let req = kubegen_core::Request::new("/api/v1/pods")
            .watch(&ListParams::default())
            .unwrap();
        let events: Vec<_> = client
            .request_events::<DynamicObject>(req)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(WatchEvent::Added(_))));
        assert!(matches!(events[1], Ok(WatchEvent::Deleted(_))));
        spawned.await.unwrap();
    }
}
