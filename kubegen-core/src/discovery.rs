//! Resolved type information for a bound resource
use crate::{
    gvk::{GroupVersionKind, GroupVersionResource},
    plural::to_plural,
    resource::Resource,
    scheme::{Scheme, UnregisteredTypeError},
};
use serde::{Deserialize, Serialize};

/// Information about a Kubernetes API resource
///
/// This is the immutable (group, version, plural) triple every request path is built from,
/// plus the kind used to check watch payloads.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApiResource {
    /// Resource group, empty for core group.
    pub group: String,
    /// group version
    pub version: String,
    /// apiVersion of the resource (v1 for core group,
    /// groupName/groupVersions for other).
    pub api_version: String,
    /// Singular PascalCase name of the resource
    pub kind: String,
    /// Plural name of the resource
    pub plural: String,
}

impl ApiResource {
    /// Resolve the type information of `K`
    ///
    /// Self-description through [`Resource::api_resource`] wins. Otherwise the kind is looked
    /// up in `scheme` and the plural derived from [`Resource::type_name`].
    /// Fails when neither source knows the type.
    pub fn resolve<K: Resource>(scheme: &Scheme) -> Result<Self, UnregisteredTypeError> {
        if let Some(ar) = K::api_resource() {
            return Ok(ar);
        }
        let gvk = scheme
            .kind_of::<K>()
            .ok_or_else(|| UnregisteredTypeError(K::type_name().into()))?;
        Ok(Self::from_gvk_with_plural(gvk, &to_plural(K::type_name())))
    }

    /// Creates an ApiResource from group, version, kind and plural name.
    pub fn from_gvk_with_plural(gvk: &GroupVersionKind, plural: &str) -> Self {
        ApiResource {
            api_version: gvk.api_version(),
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            kind: gvk.kind.clone(),
            plural: plural.to_string(),
        }
    }

    /// Creates an ApiResource from group, version and kind.
    ///
    /// # Warning
    /// This function will **guess** the resource plural name from the kind.
    pub fn from_gvk(gvk: &GroupVersionKind) -> Self {
        ApiResource::from_gvk_with_plural(gvk, &to_plural(&gvk.kind))
    }

    /// The group, version and plural of this resource
    pub fn gvr(&self) -> GroupVersionResource {
        GroupVersionResource::gvr(&self.group, &self.version, &self.plural)
    }

    /// The group, version and kind of this resource
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// Creates a url path for http requests for this resource
    ///
    /// An empty namespace addresses the collection across all namespaces.
    pub fn url_path(&self, namespace: &str) -> String {
        let n = if namespace.is_empty() {
            "".into()
        } else {
            format!("namespaces/{namespace}/")
        };
        format!(
            "/{group}/{api_version}/{namespaces}{plural}",
            group = if self.group.is_empty() { "api" } else { "apis" },
            api_version = self.api_version,
            namespaces = n,
            plural = self.plural
        )
    }
}
