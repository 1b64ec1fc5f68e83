use crate::{gvk::GroupVersionResource, response::reason};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error response from the API.
///
/// The fake tracker produces the same shape for its failures, so callers can match on
/// [`reason`](ErrorResponse::reason) regardless of the backend.
#[derive(Error, Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[error("{message}: {reason}")]
pub struct ErrorResponse {
    /// The status
    pub status: String,
    /// A message about the error
    #[serde(default)]
    pub message: String,
    /// The reason for the error
    #[serde(default)]
    pub reason: String,
    /// The error code
    pub code: u16,
    /// Extended data associated with the reason.
    /// Each reason may define its own extended details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
}

/// StatusDetails is a set of additional properties that MAY be set by the server
/// to provide additional information about a response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    /// The Causes array includes more details associated with the StatusReason failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<StatusCause>>,

    /// The group attribute of the resource associated with the status StatusReason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// The kind attribute of the resource associated with the status StatusReason.
    /// On some operations may differ from the requested resource Kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// The name attribute of the resource associated with the status StatusReason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// If specified, the time in seconds before the operation should be retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i32>,

    /// UID of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// StatusCause provides more information about an api.Status failure
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCause {
    /// The field of the resource that has caused this error, as named by its JSON serialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// A human-readable description of the cause of the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// A machine-readable description of the cause of the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Constructors matching the Status bodies an apiserver sends
impl ErrorResponse {
    fn failure(code: u16, reason: &str, message: String, gvr: &GroupVersionResource, name: &str) -> Self {
        Self {
            status: "Failure".into(),
            message,
            reason: reason.into(),
            code,
            details: Some(StatusDetails {
                group: Some(gvr.group.clone()),
                kind: Some(gvr.resource.clone()),
                name: (!name.is_empty()).then(|| name.to_string()),
                ..StatusDetails::default()
            }),
        }
    }

    /// `404 NotFound` for `name` in the `gvr` collection
    pub fn not_found(gvr: &GroupVersionResource, name: &str) -> Self {
        let message = format!("{} {name:?} not found", group_resource(gvr));
        Self::failure(404, reason::NOT_FOUND, message, gvr, name)
    }

    /// `409 AlreadyExists` for `name` in the `gvr` collection
    pub fn already_exists(gvr: &GroupVersionResource, name: &str) -> Self {
        let message = format!("{} {name:?} already exists", group_resource(gvr));
        Self::failure(409, reason::ALREADY_EXISTS, message, gvr, name)
    }

    /// `409 Conflict` for `name` in the `gvr` collection
    pub fn conflict(gvr: &GroupVersionResource, name: &str, cause: &str) -> Self {
        let message = format!(
            "Operation cannot be fulfilled on {} {name:?}: {cause}",
            group_resource(gvr)
        );
        Self::failure(409, reason::CONFLICT, message, gvr, name)
    }

    /// `422 Invalid` for `name` in the `gvr` collection
    pub fn invalid(gvr: &GroupVersionResource, name: &str, cause: &str) -> Self {
        let message = format!("{} {name:?} is invalid: {cause}", group_resource(gvr));
        Self::failure(422, reason::INVALID, message, gvr, name)
    }

    /// Whether the reason is `NotFound`
    pub fn is_not_found(&self) -> bool {
        self.reason == reason::NOT_FOUND
    }

    /// Whether the reason is `AlreadyExists`
    pub fn is_already_exists(&self) -> bool {
        self.reason == reason::ALREADY_EXISTS
    }

    /// Whether the reason is `Conflict`
    pub fn is_conflict(&self) -> bool {
        self.reason == reason::CONFLICT
    }

    /// Whether the reason is `Invalid`
    pub fn is_invalid(&self) -> bool {
        self.reason == reason::INVALID
    }
}

fn group_resource(gvr: &GroupVersionResource) -> String {
    if gvr.group.is_empty() {
        gvr.resource.clone()
    } else {
        format!("{}.{}", gvr.resource, gvr.group)
    }
}
