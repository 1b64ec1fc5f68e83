//! Typed, cancelable watch streams
//!
//! A [`Watcher`] owns one forwarding task that reads untyped [`WatchEvent`]s from the
//! apiserver or the fake tracker, narrows them to the bound type and hands them over a
//! channel holding a single event. A slow consumer therefore stalls the upstream stream.
use std::{
    pin::Pin,
    sync::{Arc, OnceLock},
    task::{ready, Context, Poll},
};

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};
use kubegen_core::{discovery::ApiResource, DynamicObject, ErrorResponse, Resource, WatchEvent};

/// A change to an object of the watched type
#[derive(Debug, Clone, PartialEq)]
pub enum Event<K> {
    /// The object was created
    Added(K),
    /// The object was changed
    Modified(K),
    /// The object was removed, carrying its last known state
    Deleted(K),
}

impl<K> Event<K> {
    /// The object carried by the event
    pub fn object(&self) -> &K {
        match self {
            Event::Added(obj) | Event::Modified(obj) | Event::Deleted(obj) => obj,
        }
    }

    /// Consume the event, returning the object it carried
    pub fn into_object(self) -> K {
        match self {
            Event::Added(obj) | Event::Modified(obj) | Event::Deleted(obj) => obj,
        }
    }
}

/// Why a [`Watcher`] stopped delivering events
///
/// Recorded once, before the channel closes, so a consumer that sees the end of the stream
/// can tell a clean end from a dropped event.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// The upstream stream ended
    Closed,
    /// The watcher was stopped or dropped by its owner
    Stopped,
    /// An event carried an object of another kind
    Mismatch {
        /// The kind found in the payload
        kind: String,
    },
    /// An event payload could not be decoded into the bound type
    Narrowing(String),
    /// The server sent an `ERROR` event, such as `410 Gone` for an expired resourceVersion
    Api(ErrorResponse),
    /// Reading the upstream stream failed
    Stream(String),
}

/// A cloneable handle that stops a [`Watcher`] from anywhere
///
/// Stopping is idempotent and may race with the forwarding task ending on its own;
/// the first recorded [`Termination`] wins. Once stopped, the watcher yields nothing more,
/// including events it had already buffered.
#[derive(Clone, Debug)]
pub struct StopHandle {
    token: CancellationToken,
    termination: Arc<OnceLock<Termination>>,
}

impl StopHandle {
    /// Stop the watcher, dropping the upstream stream
    pub fn stop(&self) {
        let _ = self.termination.set(Termination::Stopped);
        self.token.cancel();
    }

    /// Whether the watcher has been stopped
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A typed watch over one resource type
///
/// Created by [`ResourceApi::watch`](crate::ResourceApi::watch). Yields [`Event`]s in the order
/// the upstream produced them, either through [`Watcher::recv`] or as a [`Stream`].
/// Bookmarks are skipped. Dropping the watcher stops it.
#[derive(Debug)]
pub struct Watcher<K> {
    rx: mpsc::Receiver<Event<K>>,
    handle: StopHandle,
}

impl<K> Watcher<K>
where
    K: Resource + DeserializeOwned,
{
    /// Bridge a raw event stream for `resource` into a typed watcher
    ///
    /// Must be called within a tokio runtime, the forwarding task is spawned immediately.
    pub fn new<S>(resource: ApiResource, raw: S) -> Self
    where
        S: Stream<Item = Result<WatchEvent<DynamicObject>>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let handle = StopHandle {
            token: CancellationToken::new(),
            termination: Arc::default(),
        };
        let (token, termination) = (handle.token.clone(), handle.termination.clone());
        tokio::spawn(async move {
            let cause = tokio::select! {
                biased;
                _ = token.cancelled() => Termination::Stopped,
                cause = forward(&resource, raw, &tx) => cause,
            };
            tracing::debug!(kind = %resource.kind, ?cause, "watch ended");
            // recorded while the sender is still alive
            let _ = termination.set(cause);
        });
        Self { rx, handle }
    }
}

impl<K> Watcher<K> {
    /// Receive the next event, `None` once the watch has ended or was stopped
    pub async fn recv(&mut self) -> Option<Event<K>> {
        if self.discard_if_stopped() {
            return None;
        }
        let event = self.rx.recv().await;
        // a stop may have landed while waiting
        if self.discard_if_stopped() {
            return None;
        }
        event
    }

    /// The objects carried by the remaining events, as a stream borrowing the watcher
    pub fn results(&mut self) -> impl Stream<Item = K> + '_ {
        StreamExt::map(self, Event::into_object)
    }

    /// Why the watch ended, `None` while it is still running
    pub fn termination(&self) -> Option<Termination> {
        self.handle.termination.get().cloned()
    }

    /// Stop the watch
    ///
    /// Drops the upstream stream and closes the channel. Events that were already
    /// buffered are discarded, so no event is yielded after this returns.
    /// Calling it again has no effect.
    pub fn stop(&mut self) {
        self.handle.stop();
        self.discard_if_stopped();
    }

    /// A handle that can stop this watcher from another task
    ///
    /// Stopping through the handle has the same effect as [`Watcher::stop`].
    pub fn stop_handle(&self) -> StopHandle {
        self.handle.clone()
    }

    // Stops may come from any StopHandle, so every read checks the shared token
    fn discard_if_stopped(&mut self) -> bool {
        if !self.handle.is_stopped() {
            return false;
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        true
    }
}

impl<K> Stream for Watcher<K> {
    type Item = Event<K>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.discard_if_stopped() {
            return Poll::Ready(None);
        }
        let event = ready!(this.rx.poll_recv(cx));
        if this.discard_if_stopped() {
            return Poll::Ready(None);
        }
        Poll::Ready(event)
    }
}

impl<K> Drop for Watcher<K> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

async fn forward<K, S>(resource: &ApiResource, raw: S, tx: &mpsc::Sender<Event<K>>) -> Termination
where
    K: Resource + DeserializeOwned,
    S: Stream<Item = Result<WatchEvent<DynamicObject>>>,
{
    let mut raw = std::pin::pin!(raw);
    while let Some(item) = raw.next().await {
        let event = match item {
            Ok(WatchEvent::Added(obj)) => narrow(resource, obj).map(Event::Added),
            Ok(WatchEvent::Modified(obj)) => narrow(resource, obj).map(Event::Modified),
            Ok(WatchEvent::Deleted(obj)) => narrow(resource, obj).map(Event::Deleted),
            Ok(WatchEvent::Bookmark(_)) => continue,
            Ok(WatchEvent::Error(e)) | Err(Error::Api(e)) => return Termination::Api(e),
            Err(e) => return Termination::Stream(e.to_string()),
        };
        let event = match event {
            Ok(event) => event,
            Err(cause) => return cause,
        };
        if tx.send(event).await.is_err() {
            return Termination::Stopped;
        }
    }
    Termination::Closed
}

fn narrow<K>(resource: &ApiResource, obj: DynamicObject) -> Result<K, Termination>
where
    K: Resource + DeserializeOwned,
{
    if let Some(types) = &obj.types {
        let other_version = !types.api_version.is_empty() && types.api_version != resource.api_version;
        if types.kind != resource.kind || other_version {
            return Err(Termination::Mismatch {
                kind: types.kind.clone(),
            });
        }
    }
    obj.try_parse::<K>()
        .map_err(|e| Termination::Narrowing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{channel::mpsc as fmpsc, stream};
    use k8s_openapi::api::core::v1::{ConfigMap, Pod};
    use std::time::Duration;

    fn pods() -> ApiResource {
        <Pod as Resource>::api_resource().unwrap()
    }

    fn pod(name: &str) -> DynamicObject {
        DynamicObject::new(name, &pods()).within("ns")
    }

    fn names(events: &[Event<Pod>]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.object().metadata.name.clone().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn forwards_in_order_and_records_close() {
        let raw = stream::iter(vec![
            Ok(WatchEvent::Added(pod("a"))),
            Ok(WatchEvent::Modified(pod("a"))),
            Ok(WatchEvent::Deleted(pod("a"))),
        ]);
        let mut watcher = Watcher::<Pod>::new(pods(), raw);
        let events: Vec<_> = (&mut watcher).collect().await;
        assert!(matches!(
            events.as_slice(),
            [Event::Added(_), Event::Modified(_), Event::Deleted(_)]
        ));
        assert_eq!(watcher.termination(), Some(Termination::Closed));
    }

    #[tokio::test]
    async fn bookmarks_are_skipped() {
        let bookmark: WatchEvent<DynamicObject> = serde_json::from_value(serde_json::json!({
            "type": "BOOKMARK",
            "object": { "apiVersion": "v1", "kind": "Pod", "metadata": { "resourceVersion": "3" } }
        }))
        .unwrap();
        let raw = stream::iter(vec![Ok(bookmark), Ok(WatchEvent::Added(pod("b")))]);
        let mut watcher = Watcher::<Pod>::new(pods(), raw);
        let events: Vec<_> = (&mut watcher).collect().await;
        assert_eq!(names(&events), vec!["b"]);
    }

    #[tokio::test]
    async fn foreign_kinds_end_the_watch_with_a_cause() {
        let cm = DynamicObject::new("cm", &<ConfigMap as Resource>::api_resource().unwrap());
        let raw = stream::iter(vec![
            Ok(WatchEvent::Added(pod("a"))),
            Ok(WatchEvent::Added(cm)),
            Ok(WatchEvent::Added(pod("never"))),
        ]);
        let mut watcher = Watcher::<Pod>::new(pods(), raw);
        let events: Vec<_> = (&mut watcher).collect().await;
        assert_eq!(names(&events), vec!["a"]);
        assert_eq!(
            watcher.termination(),
            Some(Termination::Mismatch {
                kind: "ConfigMap".into()
            })
        );
    }

    #[tokio::test]
    async fn undecodable_payloads_end_the_watch_with_a_cause() {
        let broken = pod("x").data(serde_json::json!({ "spec": { "containers": "nope" } }));
        let raw = stream::iter(vec![Ok(WatchEvent::Added(broken))]);
        let mut watcher = Watcher::<Pod>::new(pods(), raw);
        assert!(watcher.recv().await.is_none());
        assert!(matches!(watcher.termination(), Some(Termination::Narrowing(_))));
    }

    #[tokio::test]
    async fn server_errors_are_recorded() {
        let gone = ErrorResponse {
            status: "Failure".into(),
            message: "too old resource version".into(),
            reason: "Gone".into(),
            code: 410,
            details: None,
        };
        let raw = stream::iter(vec![Ok(WatchEvent::Error(gone.clone()))]);
        let mut watcher = Watcher::<Pod>::new(pods(), raw);
        assert!(watcher.recv().await.is_none());
        assert_eq!(watcher.termination(), Some(Termination::Api(gone)));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_final() {
        let (tx, rx) = fmpsc::unbounded();
        let mut watcher = Watcher::<Pod>::new(pods(), rx);
        tx.unbounded_send(Ok(WatchEvent::Added(pod("a")))).unwrap();
        assert!(matches!(watcher.recv().await, Some(Event::Added(_))));
        tx.unbounded_send(Ok(WatchEvent::Added(pod("b")))).unwrap();

        watcher.stop();
        watcher.stop();
        assert!(watcher.recv().await.is_none());
        assert!(watcher.results().next().await.is_none());
        assert_eq!(watcher.termination(), Some(Termination::Stopped));

        // the forwarding task drops the upstream once it sees the cancellation
        tokio::time::timeout(Duration::from_secs(5), async {
            while !tx.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stopping_through_a_handle_discards_buffered_events() {
        let (tx, rx) = fmpsc::unbounded();
        let mut watcher = Watcher::<Pod>::new(pods(), rx);
        tx.unbounded_send(Ok(WatchEvent::Added(pod("a")))).unwrap();
        // let the forwarding task park the event in the channel
        tokio::time::sleep(Duration::from_millis(50)).await;

        watcher.stop_handle().stop();
        assert!(watcher.recv().await.is_none());
        assert!(watcher.next().await.is_none());
        assert_eq!(watcher.termination(), Some(Termination::Stopped));
    }

    #[tokio::test]
    async fn stop_handles_work_across_tasks() {
        let (tx, rx) = fmpsc::unbounded::<Result<WatchEvent<DynamicObject>>>();
        let mut watcher = Watcher::<Pod>::new(pods(), rx);
        let handle = watcher.stop_handle();
        tokio::spawn(async move { handle.stop() }).await.unwrap();
        assert!(watcher.stop_handle().is_stopped());
        // the task exits, dropping its sender, which ends the channel
        assert!(tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .unwrap()
            .is_none());
        assert_eq!(watcher.termination(), Some(Termination::Stopped));
        drop(tx);
    }
}
