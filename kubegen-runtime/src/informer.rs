//! Keeps a [`Store`] in sync with a backend through list and watch
//!
//! An [`Informer`] is built from a [`ListWatch`], a pair of functions listing and watching one
//! collection. Building it does nothing; [`Informer::start`] spawns the sync loop and returns the
//! [`InformerHandle`] that owns it. The loop stops on [`InformerHandle::shutdown`] or when the
//! handle is dropped.
use std::{future::Future, sync::Arc, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::reflector::{self, Store, Writer};
use kubegen_client::{api::ResourceApi, Result, Termination, Watcher};
use kubegen_core::{params::ListParams, ObjectList, Resource};

/// Why one round of the sync loop ended
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The list call failed
    #[error("failed to list: {0}")]
    List(#[source] kubegen_client::Error),
    /// The watch could not be opened
    #[error("failed to watch: {0}")]
    Watch(#[source] kubegen_client::Error),
    /// The watch ended for another reason than the upstream closing
    #[error("watch ended: {0:?}")]
    WatchEnded(Termination),
}

type ListFn<K> = Box<dyn Fn(ListParams) -> BoxFuture<'static, Result<ObjectList<K>>> + Send + Sync>;
type WatchFn<K> = Box<dyn Fn(ListParams) -> BoxFuture<'static, Result<Watcher<K>>> + Send + Sync>;

/// The list and watch functions an [`Informer`] is fed with
pub struct ListWatch<K: Clone> {
    list: ListFn<K>,
    watch: WatchFn<K>,
}

impl<K: Resource> ListWatch<K> {
    /// Wrap a list and a watch function
    pub fn new<L, LF, W, WF>(list: L, watch: W) -> Self
    where
        L: Fn(ListParams) -> LF + Send + Sync + 'static,
        LF: Future<Output = Result<ObjectList<K>>> + Send + 'static,
        W: Fn(ListParams) -> WF + Send + Sync + 'static,
        WF: Future<Output = Result<Watcher<K>>> + Send + 'static,
    {
        Self {
            list: Box::new(move |lp| list(lp).boxed()),
            watch: Box::new(move |lp| watch(lp).boxed()),
        }
    }

    /// List and watch `namespace` through `api`, which may be a real or a fake backend
    pub fn from_api<A>(api: A, namespace: &str) -> Self
    where
        A: ResourceApi<Resource = K> + 'static,
    {
        let api = Arc::new(api);
        let namespace = namespace.to_string();
        let (lister, ns) = (api.clone(), namespace.clone());
        Self::new(
            move |lp| {
                let (api, ns) = (lister.clone(), ns.clone());
                async move { api.list(&ns, &lp).await }
            },
            move |lp| {
                let (api, ns) = (api.clone(), namespace.clone());
                async move { api.watch(&ns, &lp).await }
            },
        )
    }
}

/// Settings of the informer sync loop
#[derive(Clone, Debug)]
pub struct Config {
    /// Parameters passed to both the list and the watch call
    pub list_params: ListParams,
    /// How long to wait before listing again, after a failure or after the watch closed
    pub retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_params: ListParams::default(),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// A not yet started cache of one collection
///
/// ```no_run
/// # async fn wrapper() -> kubegen_client::Result<()> {
/// use kubegen_runtime::{Informer, Lister};
/// use kubegen_fake::FakeApi;
/// use kubegen_core::Selector;
/// use k8s_openapi::api::core::v1::Pod;
///
/// let pods: FakeApi<Pod> = FakeApi::new([])?;
/// let informer = Informer::from_api(pods, "default").start();
/// informer.wait_until_synced().await;
/// for pod in informer.store().list(&Selector::everything()) {
///     println!("{:?}", pod.metadata.name);
/// }
/// informer.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Informer<K: Clone> {
    list_watch: ListWatch<K>,
    config: Config,
}

impl<K> Informer<K>
where
    K: Resource + std::fmt::Debug,
{
    /// Build an informer over `list_watch` with the default [`Config`]
    pub fn new(list_watch: ListWatch<K>) -> Self {
        Self {
            list_watch,
            config: Config::default(),
        }
    }

    /// Build an informer over `namespace` of `api`, see [`ListWatch::from_api`]
    pub fn from_api<A>(api: A, namespace: &str) -> Self
    where
        A: ResourceApi<Resource = K> + 'static,
    {
        Self::new(ListWatch::from_api(api, namespace))
    }

    /// Replace the [`Config`]
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Spawn the sync loop
    ///
    /// Must be called within a tokio runtime.
    pub fn start(self) -> InformerHandle<K> {
        let (store, writer) = reflector::store();
        let (synced_tx, synced) = watch::channel(false);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = run(self, writer, synced_tx) => {}
            }
            tracing::debug!("informer stopped");
        });
        InformerHandle {
            store,
            synced,
            token,
            task: Some(task),
        }
    }
}

async fn run<K>(informer: Informer<K>, mut writer: Writer<K>, synced: watch::Sender<bool>)
where
    K: Resource + std::fmt::Debug,
{
    let Informer { list_watch, config } = informer;
    loop {
        match sync(&list_watch, &config.list_params, &mut writer, &synced).await {
            Ok(()) => tracing::debug!("watch closed, relisting in {:?}", config.retry_delay),
            Err(err) => {
                tracing::warn!(error = %err, "informer sync failed, retrying in {:?}", config.retry_delay)
            }
        }
        // a watch that closes at once must not turn into a busy list loop
        tokio::time::sleep(config.retry_delay).await;
    }
}

/// One round: watch, list, replace, then apply events until the watch ends
///
/// The watch is opened first so nothing changing between the two calls is missed.
/// Events that raced the list are applied on top of it and the store converges.
async fn sync<K>(
    list_watch: &ListWatch<K>,
    lp: &ListParams,
    writer: &mut Writer<K>,
    synced: &watch::Sender<bool>,
) -> Result<(), SyncError>
where
    K: Resource + std::fmt::Debug,
{
    let mut watcher = (list_watch.watch)(lp.clone()).await.map_err(SyncError::Watch)?;
    let list = (list_watch.list)(lp.clone()).await.map_err(SyncError::List)?;
    tracing::debug!(count = list.items.len(), "listed");
    writer.replace(list.items);
    synced.send_replace(true);
    while let Some(event) = watcher.recv().await {
        tracing::trace!(?event, "applying");
        writer.apply(event);
    }
    match watcher.termination() {
        None | Some(Termination::Closed) => Ok(()),
        Some(cause) => Err(SyncError::WatchEnded(cause)),
    }
}

/// Owns a running informer
///
/// Dropping the handle cancels the sync loop without waiting for it.
pub struct InformerHandle<K> {
    store: Store<K>,
    synced: watch::Receiver<bool>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<K> InformerHandle<K> {
    /// A read handle on the cache
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// Whether the cache holds at least one full list
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Wait for the first full list to land in the cache
    ///
    /// Returns `false` when the informer stopped before ever syncing.
    pub async fn wait_until_synced(&self) -> bool {
        let mut synced = self.synced.clone();
        loop {
            if *synced.borrow_and_update() {
                return true;
            }
            if synced.changed().await.is_err() {
                return *synced.borrow();
            }
        }
    }

    /// Stop the sync loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "informer task failed");
            }
        }
    }
}

impl<K> Drop for InformerHandle<K> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lister::Lister, reflector::ObjectRef};
    use futures::stream;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kubegen_client::{api::PostParams, core::{metadata::ObjectMeta, ApiResource, DynamicObject, WatchEvent}};
    use kubegen_client::Error;
    use kubegen_core::{ErrorResponse, GroupVersionResource, Scheme, Selector};
    use kubegen_fake::FakeApi;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cm(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("ns".into()),
                ..ObjectMeta::default()
            },
            ..ConfigMap::default()
        }
    }

    fn configmaps() -> ApiResource {
        ApiResource::resolve::<ConfigMap>(&Scheme::new()).unwrap()
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn syncs_and_follows_the_fake() {
        let cms = FakeApi::new([cm("a")]).unwrap();
        let writes = cms.clone();
        let informer = Informer::from_api(cms, "ns").start();
        assert!(informer.wait_until_synced().await);
        assert!(informer.has_synced());
        let store = informer.store();
        assert!(store.get(&ObjectRef::new("a").within("ns")).is_some());

        writes.create(&cm("b"), &PostParams::default()).await.unwrap();
        eventually(|| store.len() == 2).await;
        writes.delete("a", "ns", &Default::default()).await.unwrap();
        eventually(|| store.get(&ObjectRef::new("a").within("ns")).is_none()).await;

        let names: Vec<_> = store
            .by_namespace("ns")
            .list(&Selector::everything())
            .iter()
            .filter_map(|cm| cm.metadata.name.clone())
            .collect();
        assert_eq!(names, vec!["b"]);
        informer.shutdown().await;
    }

    #[tokio::test]
    async fn nothing_runs_before_start() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let informer: Informer<ConfigMap> = Informer::new(ListWatch::new(
            move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Ok(ObjectList { metadata: Default::default(), items: vec![] }) }
            },
            |_| async { Err(Error::Unhandled { verb: "watch".into(), resource: "configmaps".into() }) },
        ));
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(informer);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_retried_after_the_delay() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counted = attempts.clone();
        let ar = configmaps();
        let list_watch = ListWatch::new(
            |_| async { Ok(ObjectList { metadata: Default::default(), items: vec![cm("a")] }) },
            move |_| {
                let ar = ar.clone();
                let attempt = counted.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        let gvr = GroupVersionResource::gvr("", "v1", "configmaps");
                        return Err(Error::Api(ErrorResponse::not_found(&gvr, "")));
                    }
                    // a watch that never yields
                    let pending = stream::pending::<Result<WatchEvent<DynamicObject>>>();
                    Ok(Watcher::new(ar, pending))
                }
            },
        );
        let informer = Informer::new(list_watch)
            .with_config(Config {
                retry_delay: Duration::from_secs(30),
                ..Config::default()
            })
            .start();
        tokio::task::yield_now().await;
        assert!(!informer.has_synced());
        assert!(informer.wait_until_synced().await);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(informer.store().len(), 1);
        informer.shutdown().await;
    }

    #[tokio::test]
    async fn closed_watches_are_reopened_after_the_delay() {
        let lists = Arc::new(AtomicUsize::new(0));
        let counted = lists.clone();
        let ar = configmaps();
        let list_watch = ListWatch::new(
            move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Ok(ObjectList { metadata: Default::default(), items: vec![cm("a")] }) }
            },
            move |_| {
                // a watch that ends right away
                let closed = stream::empty::<Result<WatchEvent<DynamicObject>>>();
                let watcher = Watcher::new(ar.clone(), closed);
                async move { Ok(watcher) }
            },
        );
        let informer = Informer::new(list_watch)
            .with_config(Config {
                retry_delay: Duration::from_millis(50),
                ..Config::default()
            })
            .start();
        assert!(informer.wait_until_synced().await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let calls = lists.load(Ordering::SeqCst);
        assert!((2..=10).contains(&calls), "listed {calls} times");
        assert_eq!(informer.store().len(), 1);
        informer.shutdown().await;
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_watch() {
        let cms: FakeApi<ConfigMap> = FakeApi::new([]).unwrap();
        let gvr = cms.api_resource().gvr();
        let tracker = cms.to_client_set().tracker().clone();
        let informer = Informer::from_api(cms, "ns").start();
        assert!(informer.wait_until_synced().await);
        assert_eq!(tracker.watcher_count(&gvr), 1);
        drop(informer);
        // the cancelled task drops its watcher, closing the subscription
        eventually(|| tracker.watcher_count(&gvr) == 0).await;
    }
}
