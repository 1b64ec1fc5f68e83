use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    reactor::{self, Action, RawEvents, Reaction, ReactorChain, Reply},
    tracker::ObjectTracker,
};
use kubegen_client::{api::ResourceApi, Error, Result, Watcher};
use kubegen_core::{
    params::{DeleteParams, GetParams, ListParams, PostParams},
    response::reason,
    ApiResource, DynamicObject, ErrorResponse, ObjectList, Resource, Scheme,
};

/// A fake clientset: one tracker and one reactor chain shared by every [`FakeApi`] made from it
///
/// Clones share all state. Reactors run while the chain is locked, so a reactor must not call
/// back into the clientset it is registered on.
#[derive(Clone)]
pub struct FakeClientset {
    tracker: ObjectTracker,
    chain: Arc<Mutex<ReactorChain>>,
    scheme: Arc<Scheme>,
}

impl Debug for FakeClientset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeClientset")
            .field("tracker", &self.tracker)
            .field("actions", &self.chain.lock().actions().len())
            .finish()
    }
}

impl Default for FakeClientset {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClientset {
    /// An empty clientset resolving only self-describing types
    pub fn new() -> Self {
        Self::with_scheme(Scheme::new())
    }

    /// An empty clientset resolving types through `scheme`
    ///
    /// Both chains start with a single catch-all reactor answering from the tracker.
    pub fn with_scheme(scheme: Scheme) -> Self {
        let tracker = ObjectTracker::new();
        let mut chain = ReactorChain::default();
        chain.add("*", "*", reactor::object_reaction(tracker.clone()));
        chain.add_watch("*", reactor::watch_reaction(tracker.clone()));
        Self {
            tracker,
            chain: Arc::new(Mutex::new(chain)),
            scheme: Arc::new(scheme),
        }
    }

    /// A typed api over this clientset
    pub fn api<K: Resource>(&self) -> Result<FakeApi<K>> {
        let resource = ApiResource::resolve::<K>(&self.scheme)?;
        Ok(FakeApi {
            resource,
            clientset: self.clone(),
            _phantom: std::iter::empty(),
        })
    }

    /// The object store behind the default reactors
    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }

    /// Every action invoked so far, in invocation order
    pub fn actions(&self) -> Vec<Action> {
        self.chain.lock().actions().to_vec()
    }

    /// Forget the recorded actions
    pub fn clear_actions(&self) {
        self.chain.lock().clear_actions();
    }

    /// Append an object reactor for `(verb, resource)`, behind the default one
    ///
    /// # Panics
    ///
    /// Panics when `verb` is neither `*` nor one of [`VERBS`](crate::reactor::VERBS).
    pub fn add_reactor<F>(&self, verb: &str, resource: &str, reactor: F)
    where
        F: Fn(&Action) -> Reaction<Reply> + Send + Sync + 'static,
    {
        self.chain.lock().add(verb, resource, Box::new(reactor));
    }

    /// Put an object reactor for `(verb, resource)` in front of the chain
    ///
    /// # Panics
    ///
    /// Panics when `verb` is neither `*` nor one of [`VERBS`](crate::reactor::VERBS).
    pub fn prepend_reactor<F>(&self, verb: &str, resource: &str, reactor: F)
    where
        F: Fn(&Action) -> Reaction<Reply> + Send + Sync + 'static,
    {
        self.chain.lock().prepend(verb, resource, Box::new(reactor));
    }

    /// Append a watch reactor for `resource`, behind the default one
    pub fn add_watch_reactor<F>(&self, resource: &str, reactor: F)
    where
        F: Fn(&Action) -> Reaction<RawEvents> + Send + Sync + 'static,
    {
        self.chain.lock().add_watch(resource, Box::new(reactor));
    }

    /// Put a watch reactor for `resource` in front of the chain
    pub fn prepend_watch_reactor<F>(&self, resource: &str, reactor: F)
    where
        F: Fn(&Action) -> Reaction<RawEvents> + Send + Sync + 'static,
    {
        self.chain.lock().prepend_watch(resource, Box::new(reactor));
    }

    fn invoke(&self, action: Action) -> Result<Reply> {
        self.chain.lock().invoke(action)
    }

    fn invoke_watch(&self, action: Action) -> Result<RawEvents> {
        self.chain.lock().invoke_watch(action)
    }
}

/// A [`ResourceApi`] answered by the reactor chain of a [`FakeClientset`]
///
/// ```
/// # async fn wrapper() -> kubegen_client::Result<()> {
/// use kubegen_client::{api::GetParams, ResourceApi};
/// use kubegen_fake::FakeApi;
/// use k8s_openapi::api::core::v1::Pod;
///
/// let mut seed = Pod::default();
/// seed.metadata.name = Some("web".into());
/// seed.metadata.namespace = Some("apps".into());
/// let pods: FakeApi<Pod> = FakeApi::new([seed])?;
/// let web = pods.get("web", "apps", &GetParams::default()).await?;
/// assert_eq!(web.metadata.resource_version.as_deref(), Some("1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FakeApi<K> {
    resource: ApiResource,
    clientset: FakeClientset,
    _phantom: std::iter::Empty<K>,
}

impl<K> Debug for FakeApi<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeApi")
            .field("resource", &self.resource)
            .field("clientset", &self.clientset)
            .finish()
    }
}

impl<K> FakeApi<K>
where
    K: Resource + Serialize,
{
    /// A fake api over a new clientset whose tracker holds `seed`
    pub fn new(seed: impl IntoIterator<Item = K>) -> Result<Self> {
        Self::with_scheme(Scheme::new(), seed)
    }

    /// Like [`FakeApi::new`], resolving types through `scheme`
    ///
    /// Fails when `K` cannot be resolved or a seed object has no name.
    pub fn with_scheme(scheme: Scheme, seed: impl IntoIterator<Item = K>) -> Result<Self> {
        let api = FakeClientset::with_scheme(scheme).api::<K>()?;
        let gvr = api.resource.gvr();
        for obj in seed {
            let obj = DynamicObject::from_resource(&obj, &api.resource).map_err(Error::ParseObject)?;
            api.clientset.tracker.add(&gvr, obj).map_err(Error::Api)?;
        }
        Ok(api)
    }
}

impl<K> FakeApi<K> {
    /// The clientset behind this api, for seeding other types or registering reactors
    pub fn to_client_set(&self) -> FakeClientset {
        self.clientset.clone()
    }

    /// The resource `K` is bound to
    pub fn api_resource(&self) -> &ApiResource {
        &self.resource
    }
}

fn unexpected(verb: &str, reply: &Reply) -> Error {
    let found = match reply {
        Reply::Object(_) => "an object",
        Reply::List(_) => "a list",
        Reply::Empty => "nothing",
    };
    Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: format!("reactor answered {verb} with {found}"),
        reason: reason::INTERNAL_ERROR.into(),
        code: 500,
        details: None,
    })
}

fn typed<K: Resource + DeserializeOwned>(verb: &str, reply: Reply) -> Result<K> {
    match reply {
        Reply::Object(obj) => obj.try_parse().map_err(Error::ParseObject),
        other => Err(unexpected(verb, &other)),
    }
}

impl<K> FakeApi<K>
where
    K: Resource + Serialize,
{
    fn erase(&self, obj: &K) -> Result<(String, DynamicObject)> {
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let obj = DynamicObject::from_resource(obj, &self.resource).map_err(Error::ParseObject)?;
        Ok((namespace, obj))
    }
}

#[async_trait]
impl<K> ResourceApi for FakeApi<K>
where
    K: Resource + Serialize + DeserializeOwned + Debug,
{
    type Resource = K;

    async fn get(&self, name: &str, namespace: &str, _gp: &GetParams) -> Result<K> {
        let reply = self.clientset.invoke(Action::Get {
            resource: self.resource.gvr(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;
        typed("get", reply)
    }

    async fn create(&self, obj: &K, pp: &PostParams) -> Result<K> {
        let (namespace, object) = self.erase(obj)?;
        let reply = self.clientset.invoke(Action::Create {
            resource: self.resource.gvr(),
            namespace,
            object,
            params: pp.clone(),
        })?;
        typed("create", reply)
    }

    async fn update(&self, obj: &K, pp: &PostParams) -> Result<K> {
        let (namespace, object) = self.erase(obj)?;
        let reply = self.clientset.invoke(Action::Update {
            resource: self.resource.gvr(),
            namespace,
            object,
            params: pp.clone(),
        })?;
        typed("update", reply)
    }

    async fn delete(&self, name: &str, namespace: &str, dp: &DeleteParams) -> Result<()> {
        let reply = self.clientset.invoke(Action::Delete {
            resource: self.resource.gvr(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            params: dp.clone(),
        })?;
        match reply {
            Reply::List(_) => Err(unexpected("delete", &reply)),
            Reply::Object(_) | Reply::Empty => Ok(()),
        }
    }

    async fn list(&self, namespace: &str, lp: &ListParams) -> Result<ObjectList<K>> {
        let reply = self.clientset.invoke(Action::List {
            resource: self.resource.gvr(),
            namespace: namespace.to_string(),
            params: lp.clone(),
        })?;
        let list = match reply {
            Reply::List(list) => list,
            other => return Err(unexpected("list", &other)),
        };
        let items = list
            .items
            .into_iter()
            .map(|obj| obj.try_parse().map_err(Error::ParseObject))
            .collect::<Result<Vec<K>>>()?;
        Ok(ObjectList {
            metadata: list.metadata,
            items,
        })
    }

    async fn watch(&self, namespace: &str, lp: &ListParams) -> Result<Watcher<K>> {
        let events = self.clientset.invoke_watch(Action::Watch {
            resource: self.resource.gvr(),
            namespace: namespace.to_string(),
            params: lp.clone(),
        })?;
        Ok(Watcher::new(self.resource.clone(), events))
    }
}
