//! Recorded actions and the reactor chains that answer them
//!
//! Every call on a [`FakeApi`](crate::FakeApi) becomes an [`Action`]. The action is recorded,
//! then offered to each reactor whose `(verb, resource)` pattern matches, in chain order.
//! The first reactor returning [`Reaction::Handled`] decides the outcome. A freshly built
//! [`FakeClientset`](crate::FakeClientset) ends both chains with a catch-all reactor backed by
//! its [`ObjectTracker`].
use futures::{stream::BoxStream, StreamExt};

use crate::tracker::ObjectTracker;
use kubegen_client::{Error, Result};
use kubegen_core::{
    labels::Selector,
    params::{DeleteParams, ListParams, PostParams}, DynamicObject, ErrorResponse, GroupVersionResource, ObjectList,
    ResourceExt, WatchEvent,
};

/// The verbs an [`Action`] can carry
pub const VERBS: [&str; 6] = ["get", "list", "create", "update", "delete", "watch"];

/// A call made against the fake backend
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Get a named object
    Get {
        /// The collection
        resource: GroupVersionResource,
        /// The namespace
        namespace: String,
        /// The object name
        name: String,
    },
    /// List a collection
    List {
        /// The collection
        resource: GroupVersionResource,
        /// The namespace, empty for all namespaces
        namespace: String,
        /// Parameters of the call
        params: ListParams,
    },
    /// Create an object
    Create {
        /// The collection
        resource: GroupVersionResource,
        /// The namespace
        namespace: String,
        /// The erased object
        object: DynamicObject,        /// Parameters of the call
        params: PostParams,
    },
    /// Replace an object
    Update {
        /// The collection
        resource: GroupVersionResource,
        /// The namespace
        namespace: String,
        /// The erased object
        object: DynamicObject,        /// Parameters of the call
        params: PostParams,
    },
    /// Delete a named object
    Delete {
        /// The collection
        resource: GroupVersionResource,
        /// The namespace
        namespace: String,
        /// The object name
        name: String,        /// Parameters of the call
        params: DeleteParams,
    },
    /// Watch a collection
    Watch {
        /// The collection
        resource: GroupVersionResource,
        /// The namespace, empty for all namespaces
        namespace: String,
        /// Parameters of the call
        params: ListParams,
    },
}

impl Action {
    /// The lowercase verb, one of [`VERBS`]
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Get { .. } => "get",
            Action::List { .. } => "list",
            Action::Create { .. } => "create",
            Action::Update { .. } => "update",
            Action::Delete { .. } => "delete",
            Action::Watch { .. } => "watch",
        }
    }

    /// The collection acted on
    pub fn resource(&self) -> &GroupVersionResource {
        match self {
            Action::Get { resource, .. }
            | Action::List { resource, .. }
            | Action::Create { resource, .. }
            | Action::Update { resource, .. }
            | Action::Delete { resource, .. }
            | Action::Watch { resource, .. } => resource,
        }
    }

    /// The namespace acted in
    pub fn namespace(&self) -> &str {
        match self {
            Action::Get { namespace, .. }
            | Action::List { namespace, .. }
            | Action::Create { namespace, .. }
            | Action::Update { namespace, .. }
            | Action::Delete { namespace, .. }
            | Action::Watch { namespace, .. } => namespace,
        }
    }

    /// Whether the action matches a `(verb, resource)` pattern, where `*` matches anything
    pub fn matches(&self, verb: &str, resource: &str) -> bool {
        (verb == "*" || verb == self.verb()) && (resource == "*" || resource == self.resource().resource)
    }
}

/// What an object reactor produced
#[derive(Clone, Debug)]
pub enum Reply {
    /// A single object, for `get`, `create` and `update`
    Object(DynamicObject),
    /// A list, for `list`
    List(ObjectList<DynamicObject>),
    /// Nothing, for `delete`
    Empty,
}

/// The untyped event stream a watch reactor produces
pub type RawEvents = BoxStream<'static, Result<WatchEvent<DynamicObject>>>;

/// The outcome of offering an action to a reactor
pub enum Reaction<T> {
    /// The reactor decided the outcome of the call
    Handled(Result<T>),
    /// The reactor passes, the next matching one is asked
    Unhandled,
}

impl<T> Reaction<T> {
    /// Handle the call by failing with an api error
    pub fn fail(err: ErrorResponse) -> Self {
        Reaction::Handled(Err(Error::Api(err)))
    }
}

/// A reactor answering `get`, `list`, `create`, `update` and `delete`
pub type ObjectReactor = Box<dyn Fn(&Action) -> Reaction<Reply> + Send + Sync>;
/// A reactor answering `watch`
pub type WatchReactor = Box<dyn Fn(&Action) -> Reaction<RawEvents> + Send + Sync>;

struct Pattern {
    verb: String,
    resource: String,
}

impl Pattern {
    /// # Panics
    ///
    /// Panics on a verb outside [`VERBS`] and `*`.
    fn new(verb: &str, resource: &str) -> Self {
        assert!(
            verb == "*" || VERBS.contains(&verb),
            "unknown verb {verb:?} in reactor pattern"
        );
        Self {
            verb: verb.to_string(),
            resource: resource.to_string(),
        }
    }
}

/// The recorded actions and both reactor chains of one fake clientset
#[derive(Default)]
pub(crate) struct ReactorChain {
    actions: Vec<Action>,
    objects: Vec<(Pattern, ObjectReactor)>,
    watches: Vec<(Pattern, WatchReactor)>,
}

impl ReactorChain {
    pub(crate) fn add(&mut self, verb: &str, resource: &str, reactor: ObjectReactor) {
        self.objects.push((Pattern::new(verb, resource), reactor));
    }

    pub(crate) fn prepend(&mut self, verb: &str, resource: &str, reactor: ObjectReactor) {
        self.objects.insert(0, (Pattern::new(verb, resource), reactor));
    }

    pub(crate) fn add_watch(&mut self, resource: &str, reactor: WatchReactor) {
        self.watches.push((Pattern::new("watch", resource), reactor));
    }

    pub(crate) fn prepend_watch(&mut self, resource: &str, reactor: WatchReactor) {
        self.watches.insert(0, (Pattern::new("watch", resource), reactor));
    }

    pub(crate) fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub(crate) fn clear_actions(&mut self) {
        self.actions.clear();
    }

    pub(crate) fn invoke(&mut self, action: Action) -> Result<Reply> {
        let reaction = offer(&self.objects, &action);
        self.actions.push(action);
        reaction
    }

    pub(crate) fn invoke_watch(&mut self, action: Action) -> Result<RawEvents> {
        let reaction = offer(&self.watches, &action);
        self.actions.push(action);
        reaction
    }
}

fn offer<T>(chain: &[(Pattern, Box<dyn Fn(&Action) -> Reaction<T> + Send + Sync>)], action: &Action) -> Result<T> {
    for (pattern, react) in chain {
        if !action.matches(&pattern.verb, &pattern.resource) {
            continue;
        }
        if let Reaction::Handled(res) = react(action) {
            return res;
        }
    }
    tracing::debug!(verb = action.verb(), resource = %action.resource().resource, "no reactor handled the action");
    Err(Error::Unhandled {
        verb: action.verb().to_string(),
        resource: action.resource().resource.clone(),
    })
}

fn selector(resource: &GroupVersionResource, params: &ListParams) -> Result<Selector> {
    Selector::parse_optional(params.label_selector.as_deref())
        .map_err(|err| Error::Api(ErrorResponse::invalid(resource, "", &err.to_string())))
}

/// Answer object actions from `tracker`, applying label selectors to lists
///
/// Passes on `watch`, see [`watch_reaction`].
pub fn object_reaction(tracker: ObjectTracker) -> ObjectReactor {
    Box::new(move |action| {
        let res = match action {
            Action::Get {
                resource,
                namespace,
                name,
            } => tracker.get(resource, namespace, name).map(Reply::Object),
            Action::List {
                resource,
                namespace,
                params,
            } => {
                let selector = match selector(resource, params) {
                    Ok(selector) => selector,
                    Err(err) => return Reaction::Handled(Err(err)),
                };
                let mut list = tracker.list(resource, namespace);
                list.items.retain(|obj| selector.matches(obj.labels()));
                Ok(Reply::List(list))
            }
            Action::Create {
                resource,
                namespace,
                object,
                params,
            } => tracker.create(resource, namespace, object.clone(), params).map(Reply::Object),
            Action::Update {
                resource,
                namespace,
                object,
                params,
            } => tracker.update(resource, namespace, object.clone(), params).map(Reply::Object),
            Action::Delete {
                resource,
                namespace,
                name,
                params,
            } => tracker.delete(resource, namespace, name, params).map(|_| Reply::Empty),
            Action::Watch { .. } => return Reaction::Unhandled,
        };
        Reaction::Handled(res.map_err(Error::Api))
    })
}

/// Answer `watch` from `tracker`, passing only objects matching the label selector
pub fn watch_reaction(tracker: ObjectTracker) -> WatchReactor {
    Box::new(move |action| {
        let Action::Watch {
            resource,
            namespace,
            params,
        } = action
        else {
            return Reaction::Unhandled;
        };
        let selector = match selector(resource, params) {
            Ok(selector) => selector,
            Err(err) => return Reaction::Handled(Err(err)),
        };
        let events = tracker
            .watch(resource, namespace)
            .filter(move |event| {
                let keep = event.object().map_or(true, |obj| selector.matches(obj.labels()));
                futures::future::ready(keep)
            })
            .map(Ok)
            .boxed();
        Reaction::Handled(Ok(events))
    })
}
