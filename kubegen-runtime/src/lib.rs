//! Local caches kept in sync with a kubegen backend
//!
//! An [`Informer`] feeds list and watch calls of any
//! [`ResourceApi`](kubegen_client::ResourceApi) into a [`Store`], and a [`Lister`] reads the store
//! by label selector. The informer only starts when asked to and stops with its handle.
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod informer;
pub use informer::{Informer, InformerHandle, ListWatch};

pub mod lister;
pub use lister::{Lister, NamespaceLister};

pub mod reflector;
pub use reflector::Store;
