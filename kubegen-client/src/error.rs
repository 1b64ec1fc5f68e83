//! Error handling in [`kubegen_client`][crate]
use std::time::Duration;

use thiserror::Error;

pub use kubegen_core::ErrorResponse;
use kubegen_core::{dynamic::ParseDynamicObjectError, scheme::UnregisteredTypeError};

/// Possible errors when working with [`kubegen_client`][crate]
#[derive(Error, Debug)]
pub enum Error {
    /// ApiError for when things fail
    ///
    /// Covers `NotFound`, `AlreadyExists`, `Conflict` and `Invalid` from both the apiserver
    /// and the fake tracker. Use the predicates on [`ErrorResponse`] to tell them apart.
    #[error("ApiError: {0} ({0:?})")]
    Api(#[source] ErrorResponse),

    /// Service error
    #[error("ServiceError: {0}")]
    Service(#[source] tower::BoxError),

    /// UTF-8 Error
    #[error("UTF-8 Error: {0}")]
    FromUtf8(#[source] std::string::FromUtf8Error),

    /// Returned when failed to find a newline character within max length.
    /// Only returned by `Client::request_events` and this should never happen as
    /// the max is `usize::MAX`.
    #[error("Error finding newline character")]
    LinesCodecMaxLineLengthExceeded,

    /// Returned on `std::io::Error` when reading event stream.
    #[error("Error reading events stream: {0}")]
    ReadEvents(#[source] std::io::Error),

    /// Http based error
    #[error("HttpError: {0}")]
    HttpError(#[source] http::Error),

    /// Common error case when requesting parsing into own structs
    #[error("Error deserializing response: {0}")]
    SerdeError(#[source] serde_json::Error),

    /// Failed to convert between a typed resource and its untyped form
    #[error("Error converting object: {0}")]
    ParseObject(#[source] ParseDynamicObjectError),

    /// Failed to build request
    #[error("Failed to build request: {0}")]
    BuildRequest(#[source] kubegen_core::request::Error),

    /// The bound type could not be resolved to a resource
    #[error("{0}")]
    UnregisteredType(#[from] UnregisteredTypeError),

    /// A list call did not complete within its requested timeout
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// An object carried a namespace other than the one an api is bound to
    #[error("object namespace {found:?} does not match the bound namespace {expected:?}")]
    NamespaceMismatch {
        /// The namespace of the api
        expected: String,
        /// The namespace of the object
        found: String,
    },

    /// No reactor of the fake backend handled the action
    #[error("no reaction implemented for {verb} on {resource}")]
    Unhandled {
        /// The verb of the action
        verb: String,
        /// The resource of the action
        resource: String,
    },
}

impl Error {
    /// The status returned by the server or the fake tracker, if any
    pub fn api_error(&self) -> Option<&ErrorResponse> {
        match self {
            Error::Api(ae) => Some(ae),
            _ => None,
        }
    }

    /// Whether this is a `NotFound` status
    pub fn is_not_found(&self) -> bool {
        self.api_error().is_some_and(ErrorResponse::is_not_found)
    }

    /// Whether this is an `AlreadyExists` status
    pub fn is_already_exists(&self) -> bool {
        self.api_error().is_some_and(ErrorResponse::is_already_exists)
    }

    /// Whether this is a `Conflict` status
    pub fn is_conflict(&self) -> bool {
        self.api_error().is_some_and(ErrorResponse::is_conflict)
    }

    /// Whether this is an `Invalid` status
    pub fn is_invalid(&self) -> bool {
        self.api_error().is_some_and(ErrorResponse::is_invalid)
    }
}
