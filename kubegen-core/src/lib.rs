//! Crate with types and traits necessary for binding a Rust type to a Kubernetes resource collection
//!
//! Nothing here performs I/O. The client, the fake backend and the informer adapter
//! all build on these types, and the same items are re-exported from `kubegen` under `kubegen::core`.
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod discovery;
pub use discovery::ApiResource;

pub mod dynamic;
pub use dynamic::DynamicObject;

pub mod gvk;
pub use gvk::{GroupVersion, GroupVersionKind, GroupVersionResource};

pub mod labels;
pub use labels::Selector;

pub mod metadata;

pub mod object;
pub use object::ObjectList;

pub mod params;

pub mod plural;
pub use plural::{to_plural, Pluralizer};

pub mod request;
pub use request::Request;

mod resource;
pub use resource::{Resource, ResourceExt};

pub mod response;

pub mod scheme;
pub use scheme::Scheme;

pub mod subresource;

pub mod watch;
pub use watch::WatchEvent;

mod error;
pub use error::{ErrorResponse, StatusCause, StatusDetails};

/// The namespace value that addresses every namespace at once
pub const NAMESPACE_ALL: &str = "";
