//! Kubegen is an umbrella-crate for talking to [Kubernetes](http://kubernetes.io) style APIs
//! through one generic, typed client.
//!
//! # Overview
//!
//! The main modules are:
//!
//! - [`client`](crate::client) with the transport [`Client`](crate::Client)
//! - [`api`](crate::api) with the generic [`Api`](crate::Api), the shared [`ResourceApi`] operation set
//!   and its decorators
//! - [`watcher`](crate::watcher) with the typed [`Watcher`](crate::Watcher)
//! - [`fake`](crate::fake) with the in-memory [`FakeApi`](crate::fake::FakeApi) for tests
//! - [`runtime`](crate::runtime) with the [`Informer`](crate::runtime::Informer) and its [`Lister`](crate::runtime::Lister)
//! - [`core`](crate::core) with the client-less types: resources, schemes, params and selectors
//!
//! # Writing code once for both backends
//!
//! ```
//! use kubegen::{api::{GetParams, PostParams}, fake::FakeApi, ResourceApi, ResourceApiExt, ResourceExt};
//! use k8s_openapi::api::core::v1::ConfigMap;
//!
//! async fn label<A: ResourceApi<Resource = ConfigMap>>(api: &A, name: &str, ns: &str) -> kubegen::Result<ConfigMap> {
//!     let mut cm = api.get(name, ns, &GetParams::default()).await?;
//!     cm.labels_mut().insert("seen".into(), "true".into());
//!     api.create_or_update(&cm, &PostParams::default()).await
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> kubegen::Result<()> {
//! let mut seed = ConfigMap::default();
//! seed.metadata.name = Some("settings".into());
//! seed.metadata.namespace = Some("apps".into());
//! let cms = FakeApi::new([seed])?;
//! let labelled = label(&cms, "settings", "apps").await?;
//! assert_eq!(labelled.labels()["seen"], "true");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

macro_rules! cfg_fake {
    ($($item:item)*) => {
        $(
            #[cfg_attr(docsrs, doc(cfg(feature = "fake")))]
            #[cfg(feature = "fake")]
            $item
        )*
    }
}

macro_rules! cfg_runtime {
    ($($item:item)*) => {
        $(
            #[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
            #[cfg(feature = "runtime")]
            $item
        )*
    }
}

#[doc(inline)]
pub use kubegen_client::{api, client, error, watcher};
#[doc(inline)]
pub use kubegen_client::{Api, Client, Error, Event, ResourceApi, ResourceApiExt, Result, Termination, Watcher};

cfg_fake! {
    #[doc(inline)]
    pub use kubegen_fake as fake;
}

cfg_runtime! {
    #[doc(inline)]
    pub use kubegen_runtime as runtime;
}

#[doc(inline)] pub use kubegen_core as core;
pub use crate::core::{Resource, ResourceExt, Scheme};
