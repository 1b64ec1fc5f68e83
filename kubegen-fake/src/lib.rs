//! In-memory fake backend for the kubegen generic client
//!
//! [`FakeApi`] implements [`ResourceApi`](kubegen_client::ResourceApi) against an
//! [`ObjectTracker`] instead of an apiserver. Calls become recorded [`Action`]s answered by a
//! chain of reactors; tests can put their own reactors in front of the default ones to inject
//! failures or canned answers.
//!
//! ```
//! # async fn wrapper() -> kubegen_client::Result<()> {
//! use kubegen_client::{api::ListParams, ResourceApi};
//! use kubegen_fake::{reactor::Reaction, FakeApi};
//! use kubegen_core::ErrorResponse;
//! use k8s_openapi::api::core::v1::Pod;
//!
//! let pods: FakeApi<Pod> = FakeApi::new([])?;
//! pods.to_client_set().prepend_reactor("list", "pods", |action| {
//!     Reaction::fail(ErrorResponse::invalid(action.resource(), "", "list disabled"))
//! });
//! assert!(pods.list("", &ListParams::default()).await.unwrap_err().is_invalid());
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod api;
pub use api::{FakeApi, FakeClientset};

pub mod reactor;
pub use reactor::{Action, Reaction, Reply};

pub mod tracker;
pub use tracker::ObjectTracker;
