//! Objects with their type erased, as stored by the fake tracker and decoded from watch streams
use crate::{discovery::ApiResource, metadata::TypeMeta, resource::Resource};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Converting between a typed resource and a [`DynamicObject`] failed
#[derive(Debug, Error)]
#[error("object does not fit the requested type: {0}")]
pub struct ParseDynamicObjectError(#[from] serde_json::Error);

/// Any single object, kept as metadata plus free-form JSON
///
/// Lists do not fit this shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// `apiVersion` and `kind`, absent on some payloads
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Standard metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Every remaining top-level field, `spec` and `status` included
    #[serde(flatten)]
    pub data: serde_json::Value,
}

// typed values reach the erased form and back through a JSON value
fn convert<T: Serialize, U: DeserializeOwned>(value: &T) -> Result<U, ParseDynamicObjectError> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

impl DynamicObject {
    /// A named object of the kind `resource` describes, with no data
    #[must_use]
    pub fn new(name: &str, resource: &ApiResource) -> Self {
        Self {
            types: Some(TypeMeta::new(&resource.api_version, &resource.kind)),
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            data: serde_json::Value::Null,
        }
    }

    /// Erase a typed resource
    ///
    /// Types whose serialized form has no `apiVersion`/`kind` get those of `resource`.
    pub fn from_resource<K: Serialize>(
        obj: &K,
        resource: &ApiResource,
    ) -> Result<Self, ParseDynamicObjectError> {
        let mut erased: Self = convert(obj)?;
        erased
            .types
            .get_or_insert_with(|| TypeMeta::new(&resource.api_version, &resource.kind));
        Ok(erased)
    }

    /// Replace the free-form fields
    #[must_use]
    pub fn data(self, data: serde_json::Value) -> Self {
        Self { data, ..self }
    }

    /// Place the object in namespace `ns`
    #[must_use]
    pub fn within(mut self, ns: &str) -> Self {
        self.metadata.namespace = Some(ns.into());
        self
    }

    /// The recorded kind
    pub fn kind(&self) -> Option<&str> {
        self.types.as_ref().map(|types| types.kind.as_str())
    }

    /// Read the object back as `K`
    pub fn try_parse<K: Resource + DeserializeOwned>(self) -> Result<K, ParseDynamicObjectError> {
        convert(&self)
    }
}

impl Resource for DynamicObject {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
