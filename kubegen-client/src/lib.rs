//! Generic typed client for Kubernetes style resource APIs
//!
//! One [`Api<K>`] serves any type implementing [`Resource`]: the type either describes
//! its own group, version and plural, or it is registered in a [`Scheme`](crate::core::Scheme)
//! and its plural is derived from the type name.
//!
//! The operation set lives on the [`ResourceApi`] trait so that the same calling code can run
//! against a real apiserver through [`Client`] or against the in-memory fake from `kubegen-fake`.
//!
//! # Example
//!
//! ```rust,no_run
//! use kubegen_client::{api::ListParams, Api, Client, ResourceApi, ResourceExt};
//! use k8s_openapi::api::core::v1::Pod;
//!
//! # async fn wrapper<S>(service: S) -> Result<(), Box<dyn std::error::Error>>
//! # where
//! #     S: tower::Service<http::Request<kubegen_client::client::Body>, Response = http::Response<kubegen_client::client::Body>> + Send + 'static,
//! #     S::Future: Send + 'static,
//! #     S::Error: Into<tower::BoxError>,
//! # {
//! // Any tower service speaking http to an apiserver will do
//! let client = Client::new(service);
//! let pods: Api<Pod> = Api::new(client)?;
//! for p in pods.list("kube-system", &ListParams::default()).await? {
//!     println!("found pod {}", p.name_any());
//! }
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod client;
pub mod error;
pub mod watcher;

#[doc(inline)]
pub use api::{Api, ResourceApi, ResourceApiExt};
#[doc(inline)]
pub use client::Client;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use watcher::{Event, Termination, Watcher};

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub use crate::core::{Resource, ResourceExt};
/// Re-exports from kubegen_core
pub use kubegen_core as core;
