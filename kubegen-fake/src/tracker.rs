//! The in-memory object store behind the fake backend
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use futures::channel::mpsc;
use parking_lot::Mutex;

use kubegen_core::{
    metadata::ListMeta,
    params::{DeleteParams, PostParams, Preconditions},
    DynamicObject, ErrorResponse, GroupVersionResource, ObjectList, WatchEvent, NAMESPACE_ALL,
};

// (namespace, name)
type Key = (String, String);

struct Subscription {
    namespace: String,
    tx: mpsc::UnboundedSender<WatchEvent<DynamicObject>>,
}

#[derive(Default)]
struct State {
    objects: HashMap<GroupVersionResource, BTreeMap<Key, DynamicObject>>,
    watchers: HashMap<GroupVersionResource, Vec<Subscription>>,
    resource_version: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    // Fan out while the lock is held so events follow mutation order
    fn notify(&mut self, gvr: &GroupVersionResource, event: WatchEvent<DynamicObject>) {
        let Some(subs) = self.watchers.get_mut(gvr) else {
            return;
        };
        subs.retain(|sub| !sub.tx.is_closed());
        let namespace = event
            .object()
            .and_then(|obj| obj.metadata.namespace.clone())
            .unwrap_or_default();
        for sub in subs.iter() {
            if sub.namespace == NAMESPACE_ALL || sub.namespace == namespace {
                // a receiver dropped since the retain above is pruned next time
                let _ = sub.tx.unbounded_send(event.clone());
            }
        }
    }
}

/// Stores objects by resource, namespace and name, and fans changes out to watchers
///
/// Cloning gives another handle on the same store. Every stored object gets a fresh
/// `metadata.resourceVersion` from a counter shared by all resources.
#[derive(Clone, Default)]
pub struct ObjectTracker {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for ObjectTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ObjectTracker")
            .field("resources", &state.objects.len())
            .field("resource_version", &state.resource_version)
            .finish()
    }
}

fn key_of(
    gvr: &GroupVersionResource,
    namespace: &str,
    obj: &mut DynamicObject,
) -> Result<Key, ErrorResponse> {
    let name = obj.metadata.name.clone().unwrap_or_default();
    if name.is_empty() {
        return Err(ErrorResponse::invalid(gvr, "", "metadata.name: Required value: name is required"));
    }
    match obj.metadata.namespace.as_deref() {
        None | Some("") => obj.metadata.namespace = (!namespace.is_empty()).then(|| namespace.to_string()),
        Some(ns) if namespace.is_empty() || ns == namespace => {}
        Some(_) => {
            return Err(ErrorResponse::invalid(
                gvr,
                &name,
                "metadata.namespace: the namespace of the object does not match the namespace of the request",
            ))
        }
    }
    Ok((obj.metadata.namespace.clone().unwrap_or_default(), name))
}

fn check_preconditions(
    gvr: &GroupVersionResource,
    stored: &DynamicObject,
    pre: &Preconditions,
) -> Result<(), ErrorResponse> {
    let name = stored.metadata.name.as_deref().unwrap_or_default();
    if let Some(uid) = &pre.uid {
        if stored.metadata.uid.as_ref() != Some(uid) {
            let cause = format!(
                "Precondition failed: UID in precondition: {uid}, UID in object meta: {}",
                stored.metadata.uid.as_deref().unwrap_or_default()
            );
            return Err(ErrorResponse::conflict(gvr, name, &cause));
        }
    }
    if let Some(rv) = &pre.resource_version {
        if stored.metadata.resource_version.as_ref() != Some(rv) {
            let cause = format!(
                "Precondition failed: ResourceVersion in precondition: {rv}, ResourceVersion in object meta: {}",
                stored.metadata.resource_version.as_deref().unwrap_or_default()
            );
            return Err(ErrorResponse::conflict(gvr, name, &cause));
        }
    }
    Ok(())
}

impl ObjectTracker {
    /// An empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing one with the same namespace and name
    pub fn add(&self, gvr: &GroupVersionResource, mut obj: DynamicObject) -> Result<(), ErrorResponse> {
        let key = key_of(gvr, "", &mut obj)?;
        let mut state = self.state.lock();
        obj.metadata.resource_version = Some(state.next_version());
        let previous = state
            .objects
            .entry(gvr.clone())
            .or_default()
            .insert(key, obj.clone());
        let event = match previous {
            Some(_) => WatchEvent::Modified(obj),
            None => WatchEvent::Added(obj),
        };
        state.notify(gvr, event);
        Ok(())
    }

    /// Get an object
    pub fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ErrorResponse> {
        let state = self.state.lock();
        state
            .objects
            .get(gvr)
            .and_then(|objects| objects.get(&(namespace.to_string(), name.to_string())))
            .cloned()
            .ok_or_else(|| ErrorResponse::not_found(gvr, name))
    }

    /// List the objects of a namespace, or of every namespace for [`NAMESPACE_ALL`]
    ///
    /// Items are ordered by namespace, then name.
    pub fn list(&self, gvr: &GroupVersionResource, namespace: &str) -> ObjectList<DynamicObject> {
        let state = self.state.lock();
        let items = state
            .objects
            .get(gvr)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|((ns, _), _)| namespace == NAMESPACE_ALL || ns == namespace)
                    .map(|(_, obj)| obj.clone())
                    .collect()
            })
            .unwrap_or_default();
        ObjectList {
            metadata: ListMeta {
                resource_version: Some(state.resource_version.to_string()),
                ..ListMeta::default()
            },
            items,
        }
    }

    /// Create an object, failing when it already exists
    ///
    /// A dry run answers with the object as it would be stored, without a resourceVersion,
    /// and stores nothing.
    pub fn create(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        mut obj: DynamicObject,
        pp: &PostParams,
    ) -> Result<DynamicObject, ErrorResponse> {
        let key = key_of(gvr, namespace, &mut obj)?;
        let mut state = self.state.lock();
        if state.objects.get(gvr).is_some_and(|objects| objects.contains_key(&key)) {
            return Err(ErrorResponse::already_exists(gvr, &key.1));
        }
        if pp.dry_run {
            obj.metadata.resource_version = None;
            return Ok(obj);
        }
        obj.metadata.resource_version = Some(state.next_version());
        state.objects.entry(gvr.clone()).or_default().insert(key, obj.clone());
        state.notify(gvr, WatchEvent::Added(obj.clone()));
        Ok(obj)
    }

    /// Replace an existing object
    ///
    /// An object carrying a resourceVersion other than the stored one is rejected with a conflict,
    /// one carrying none replaces unconditionally. A dry run answers with the replacement at the
    /// stored resourceVersion and changes nothing.
    pub fn update(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        mut obj: DynamicObject,
        pp: &PostParams,
    ) -> Result<DynamicObject, ErrorResponse> {
        let key = key_of(gvr, namespace, &mut obj)?;
        let mut state = self.state.lock();
        let stored = state
            .objects
            .get(gvr)
            .and_then(|objects| objects.get(&key))
            .ok_or_else(|| ErrorResponse::not_found(gvr, &key.1))?;
        if let Some(rv) = obj.metadata.resource_version.as_deref().filter(|rv| !rv.is_empty()) {
            if stored.metadata.resource_version.as_deref() != Some(rv) {
                return Err(ErrorResponse::conflict(
                    gvr,
                    &key.1,
                    "the object has been modified; please apply your changes to the latest version and try again",
                ));
            }
        }
        if pp.dry_run {
            obj.metadata.resource_version = stored.metadata.resource_version.clone();
            return Ok(obj);
        }
        obj.metadata.resource_version = Some(state.next_version());
        state.objects.entry(gvr.clone()).or_default().insert(key, obj.clone());
        state.notify(gvr, WatchEvent::Modified(obj.clone()));
        Ok(obj)
    }

    /// Remove an object, returning its last state
    ///
    /// Fails with a conflict when the stored object does not meet the preconditions.
    /// A dry run checks everything and removes nothing.
    pub fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
        dp: &DeleteParams,
    ) -> Result<DynamicObject, ErrorResponse> {
        let key = (namespace.to_string(), name.to_string());
        let mut state = self.state.lock();
        let stored = state
            .objects
            .get(gvr)
            .and_then(|objects| objects.get(&key))
            .ok_or_else(|| ErrorResponse::not_found(gvr, name))?;
        if let Some(pre) = &dp.preconditions {
            check_preconditions(gvr, stored, pre)?;
        }
        if dp.dry_run {
            return Ok(stored.clone());
        }
        let removed = state
            .objects
            .get_mut(gvr)
            .and_then(|objects| objects.remove(&key))
            .ok_or_else(|| ErrorResponse::not_found(gvr, name))?;
        state.notify(gvr, WatchEvent::Deleted(removed.clone()));
        Ok(removed)
    }

    /// Subscribe to changes in a namespace, or in every namespace for [`NAMESPACE_ALL`]
    ///
    /// Only changes made after subscribing are delivered. Dropping the receiver unsubscribes.
    pub fn watch(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
    ) -> mpsc::UnboundedReceiver<WatchEvent<DynamicObject>> {
        let (tx, rx) = mpsc::unbounded();
        let mut state = self.state.lock();
        let subs = state.watchers.entry(gvr.clone()).or_default();
        subs.retain(|sub| !sub.tx.is_closed());
        subs.push(Subscription {
            namespace: namespace.to_string(),
            tx,
        });
        rx
    }

    /// Number of open subscriptions on a resource
    pub fn watcher_count(&self, gvr: &GroupVersionResource) -> usize {
        self.state
            .lock()
            .watchers
            .get(gvr)
            .map_or(0, |subs| subs.iter().filter(|sub| !sub.tx.is_closed()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use kubegen_core::{ApiResource, GroupVersionKind};

    fn widgets() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("example.com", "v1", "Widget"))
    }

    fn widget(ns: &str, name: &str) -> DynamicObject {
        DynamicObject::new(name, &widgets()).within(ns)
    }

    #[test]
    fn create_get_conflicts() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let pp = PostParams::default();
        let created = tracker.create(&gvr, "a", widget("a", "w"), &pp).unwrap();
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));
        assert_eq!(tracker.get(&gvr, "a", "w").unwrap(), created);

        let err = tracker.create(&gvr, "a", widget("a", "w"), &pp).unwrap_err();
        assert!(err.is_already_exists());
        assert!(tracker.get(&gvr, "b", "w").unwrap_err().is_not_found());
        assert!(tracker.update(&gvr, "b", widget("b", "w"), &pp).unwrap_err().is_not_found());
    }

    #[test]
    fn stale_versions_conflict() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let pp = PostParams::default();
        let created = tracker.create(&gvr, "a", widget("a", "w"), &pp).unwrap();
        let updated = tracker.update(&gvr, "a", created.clone(), &pp).unwrap();
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("2"));
        assert!(tracker.update(&gvr, "a", created, &pp).unwrap_err().is_conflict());
        // no resourceVersion replaces unconditionally
        assert!(tracker.update(&gvr, "a", widget("a", "w"), &pp).is_ok());
    }

    #[test]
    fn names_and_namespaces_are_checked() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let pp = PostParams::default();
        let mut nameless = widget("a", "w");
        nameless.metadata.name = None;
        assert!(tracker.create(&gvr, "a", nameless, &pp).unwrap_err().is_invalid());
        assert!(tracker.create(&gvr, "b", widget("a", "w"), &pp).unwrap_err().is_invalid());
        let placed = tracker.create(&gvr, "b", DynamicObject::new("w", &widgets()), &pp).unwrap();
        assert_eq!(placed.metadata.namespace.as_deref(), Some("b"));
    }

    #[test]
    fn lists_by_namespace_in_key_order() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        for (ns, name) in [("b", "y"), ("a", "z"), ("a", "x")] {
            tracker.add(&gvr, widget(ns, name)).unwrap();
        }
        let names = |list: ObjectList<DynamicObject>| -> Vec<String> {
            list.items.into_iter().filter_map(|o| o.metadata.name).collect()
        };
        assert_eq!(names(tracker.list(&gvr, "a")), vec!["x", "z"]);
        assert_eq!(names(tracker.list(&gvr, "")), vec!["x", "z", "y"]);
        assert!(tracker.list(&widgets().gvr(), "c").items.is_empty());
        assert_eq!(tracker.list(&gvr, "").metadata.resource_version.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn watchers_see_changes_in_order() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let pp = PostParams::default();
        let mut in_a = tracker.watch(&gvr, "a");
        let mut everywhere = tracker.watch(&gvr, NAMESPACE_ALL);

        tracker.create(&gvr, "a", widget("a", "w"), &pp).unwrap();
        tracker.create(&gvr, "b", widget("b", "w"), &pp).unwrap();
        tracker.update(&gvr, "a", widget("a", "w"), &pp).unwrap();
        tracker.delete(&gvr, "a", "w", &DeleteParams::default()).unwrap();

        let kinds = |evs: Vec<WatchEvent<DynamicObject>>| -> Vec<String> {
            evs.iter().map(|e| format!("{e:?}")).collect()
        };
        let seen: Vec<_> = (&mut in_a).take(3).collect().await;
        assert_eq!(kinds(seen), vec!["Added event", "Modified event", "Deleted event"]);
        let seen: Vec<_> = (&mut everywhere).take(4).collect().await;
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1].object().unwrap().metadata.namespace.as_deref(), Some("b"));
    }

    #[test]
    fn dropped_watchers_are_pruned() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let rx = tracker.watch(&gvr, "a");
        assert_eq!(tracker.watcher_count(&gvr), 1);
        drop(rx);
        // no change happened on the resource, the closed subscription is not counted
        assert_eq!(tracker.watcher_count(&gvr), 0);

        let idle: Vec<_> = (0..3).map(|_| tracker.watch(&gvr, "a")).collect();
        drop(idle);
        let _open = tracker.watch(&gvr, "a");
        assert_eq!(tracker.state.lock().watchers[&gvr].len(), 1);
        assert_eq!(tracker.watcher_count(&gvr), 1);
    }

    #[test]
    fn dry_runs_store_nothing() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let mut events = tracker.watch(&gvr, NAMESPACE_ALL);

        let answered = tracker.create(&gvr, "a", widget("a", "w"), &PostParams::dry_run()).unwrap();
        assert_eq!(answered.metadata.resource_version, None);
        assert!(tracker.get(&gvr, "a", "w").unwrap_err().is_not_found());

        let stored = tracker.create(&gvr, "a", widget("a", "w"), &PostParams::default()).unwrap();
        let mut changed = stored.clone();
        changed.data = serde_json::json!({ "spec": { "size": 2 } });
        let answered = tracker.update(&gvr, "a", changed, &PostParams::dry_run()).unwrap();
        assert_eq!(answered.metadata.resource_version, stored.metadata.resource_version);
        assert_eq!(tracker.get(&gvr, "a", "w").unwrap(), stored);

        let dp = DeleteParams::default().dry_run();
        assert_eq!(tracker.delete(&gvr, "a", "w", &dp).unwrap(), stored);
        assert_eq!(tracker.get(&gvr, "a", "w").unwrap(), stored);
        assert_eq!(tracker.list(&gvr, "").metadata.resource_version.as_deref(), Some("1"));

        // only the real create reached the watch
        assert!(matches!(events.try_next(), Ok(Some(WatchEvent::Added(_)))));
        assert!(events.try_next().is_err());
    }

    #[test]
    fn delete_preconditions_must_match() {
        let tracker = ObjectTracker::new();
        let gvr = widgets().gvr();
        let mut obj = widget("a", "w");
        obj.metadata.uid = Some("u-1".into());
        let stored = tracker.create(&gvr, "a", obj, &PostParams::default()).unwrap();

        let stale = DeleteParams::default().preconditions(Preconditions {
            resource_version: Some("0".into()),
            uid: None,
        });
        assert!(tracker.delete(&gvr, "a", "w", &stale).unwrap_err().is_conflict());
        let other_uid = DeleteParams::default().preconditions(Preconditions {
            resource_version: None,
            uid: Some("u-2".into()),
        });
        assert!(tracker.delete(&gvr, "a", "w", &other_uid).unwrap_err().is_conflict());
        assert!(tracker.get(&gvr, "a", "w").is_ok());

        let current = DeleteParams::default().preconditions(Preconditions {
            resource_version: stored.metadata.resource_version.clone(),
            uid: Some("u-1".into()),
        });
        assert_eq!(tracker.delete(&gvr, "a", "w", &current).unwrap(), stored);
        assert!(tracker.get(&gvr, "a", "w").unwrap_err().is_not_found());
    }
}
