//! Machine readable reasons carried by API [`ErrorResponse`](crate::ErrorResponse)s
//!
//! Each reason maps to a single HTTP status code, but multiple reasons may map
//! to the same HTTP status code.
/// Reason strings of the `Status` objects servers answer failures with
pub mod reason {
    /// The server declined to indicate a specific reason.
    /// Status code 500.
    pub const UNKNOWN: &str = "";

    /// One or more resources required for this operation could not be found.
    /// Status code 404
    pub const NOT_FOUND: &str = "NotFound";

    /// The resource being created already exists.
    /// Status code 409
    pub const ALREADY_EXISTS: &str = "AlreadyExists";

    /// The operation cannot be completed due to a conflict, typically a stale `resourceVersion`.
    /// Status code 409
    pub const CONFLICT: &str = "Conflict";

    /// The item is no longer available at the server.
    /// Status code 410
    pub const GONE: &str = "Gone";

    /// The create or update operation cannot be completed due to invalid data.
    /// Status code 422
    pub const INVALID: &str = "Invalid";

    /// The request was rejected before being processed.
    /// Status code 400
    pub const BAD_REQUEST: &str = "BadRequest";

    /// The server could not complete the request in time.
    /// Status code 504
    pub const TIMEOUT: &str = "Timeout";

    /// The action requested is not supported for this resource.
    /// Status code 405
    pub const METHOD_NOT_ALLOWED: &str = "MethodNotAllowed";

    /// An unexpected error on the server.
    /// Status code 500
    pub const INTERNAL_ERROR: &str = "InternalError";
}
