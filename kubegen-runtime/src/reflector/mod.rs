//! Caches objects in memory

mod object_ref;
/// The cache and its single writer
pub mod store;

pub use self::{
    object_ref::ObjectRef,
    store::{Store, Writer},
};

/// Create a (Reader, Writer) for a [`Store<K>`] for a typed resource `K`
///
/// The [`Writer`] should be passed to the one loop that keeps the cache current, such as an
/// [`Informer`](crate::Informer), and the [`Store`] is a cheaply clonable read handle.
#[must_use]
pub fn store<K: kubegen_core::Resource>() -> (Store<K>, Writer<K>) {
    let w = Writer::default();
    let r = w.as_reader();
    (r, w)
}
