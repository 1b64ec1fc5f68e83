//! Request parameters for get, list, watch, create, replace and delete calls
//!
//! The same parameters drive both backends: the real client encodes them into the query string
//! or body, and the fake tracker evaluates them in memory.
use crate::request::Error;
use serde::Serialize;
use std::time::Duration;

/// Query parameters of list and watch calls
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListParams {
    /// A label selector, see [`Selector`](crate::Selector) for the grammar. `None` selects everything.
    pub label_selector: Option<String>,

    /// A field selector, passed through to the server
    pub field_selector: Option<String>,

    /// Timeout of the call in seconds, `None` and `Some(0)` both mean no timeout
    ///
    /// Sent as `timeoutSeconds` and also enforced by the client on `list`.
    pub timeout: Option<u32>,

    /// Page size of a list call
    pub limit: Option<u32>,

    /// Token of the next page, from a previous list
    pub continue_token: Option<String>,

    /// Version to start a watch from, or the minimum version a list must reflect
    pub resource_version: Option<String>,
}

impl ListParams {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.continue_token.is_some() && self.resource_version.is_some() {
            return Err(Error::Validation(
                "a continue token already pins the resourceVersion of a list".into(),
            ));
        }
        Ok(())
    }

    fn append_selectors(&self, qp: &mut form_urlencoded::Serializer<String>) {
        if let Some(fields) = &self.field_selector {
            qp.append_pair("fieldSelector", fields);
        }
        if let Some(labels) = &self.label_selector {
            qp.append_pair("labelSelector", labels);
        }
        if let Some(timeout) = self.timeout.filter(|t| *t > 0) {
            qp.append_pair("timeoutSeconds", &timeout.to_string());
        }
    }

    pub(crate) fn populate_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        self.append_selectors(qp);
        if let Some(limit) = self.limit {
            qp.append_pair("limit", &limit.to_string());
        }
        if let Some(token) = &self.continue_token {
            qp.append_pair("continue", token);
        }
        if let Some(rv) = &self.resource_version {
            qp.append_pair("resourceVersion", rv);
        }
    }

    pub(crate) fn populate_watch_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        qp.append_pair("watch", "true");
        if let Some(rv) = &self.resource_version {
            qp.append_pair("resourceVersion", rv);
        }
        self.append_selectors(qp);
    }

    /// The client side bound for a list call, `None` when no timeout was requested
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .filter(|t| *t > 0)
            .map(|t| Duration::from_secs(u64::from(t)))
    }
}

/// Builder interface to ListParams
///
/// ```
/// use kubegen_core::params::ListParams;
/// let lp = ListParams::default()
///     .timeout(60)
///     .labels("tier in (frontend,backend),!canary");
/// ```
impl ListParams {
    /// Set the timeout in seconds
    #[must_use]
    pub fn timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }

    /// Set the field selector
    #[must_use]
    pub fn fields(mut self, field_selector: &str) -> Self {
        self.field_selector = Some(field_selector.to_string());
        self
    }

    /// Set the label selector
    #[must_use]
    pub fn labels(mut self, label_selector: &str) -> Self {
        self.label_selector = Some(label_selector.to_string());
        self
    }

    /// Set the page size
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continue a paged list
    #[must_use]
    pub fn continue_token(mut self, token: &str) -> Self {
        self.continue_token = Some(token.to_string());
        self
    }

    /// Set the resource version
    #[must_use]
    pub fn at(mut self, resource_version: &str) -> Self {
        self.resource_version = Some(resource_version.into());
        self
    }
}

/// Query parameters of get calls
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetParams {
    /// Minimum resource version the answer must reflect
    pub resource_version: Option<String>,
}

impl GetParams {
    /// Get at or after `resource_version`
    #[must_use]
    pub fn at(resource_version: &str) -> Self {
        Self {
            resource_version: Some(resource_version.into()),
        }
    }
}

/// Query parameters of create and replace calls
#[derive(Default, Clone, Debug, PartialEq)]
pub struct PostParams {
    /// Validate and answer as usual, without storing anything
    pub dry_run: bool,
    /// Name of the actor making the change
    pub field_manager: Option<String>,
}

impl PostParams {
    /// Parameters of a dry run
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub(crate) fn populate_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        if self.dry_run {
            qp.append_pair("dryRun", "All");
        }
        if let Some(fm) = &self.field_manager {
            qp.append_pair("fieldManager", fm);
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        match &self.field_manager {
            Some(fm) if fm.len() > 128 => Err(Error::Validation(
                "fieldManager must be at most 128 characters".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Parameters of delete calls, sent as the request body
#[derive(Default, Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    /// Validate and answer as usual, without removing anything
    #[serde(serialize_with = "dry_run_all", skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,

    /// Conditions the stored object must meet, a mismatch fails with `409 Conflict`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
}

impl DeleteParams {
    /// Only delete the object if it still matches `preconditions`
    #[must_use]
    pub fn preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = Some(preconditions);
        self
    }

    /// Perform a dry run
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

// the body form of dryRun is a list of stages
fn dry_run_all<S: serde::Serializer>(_: &bool, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeSeq;
    let mut stages = s.serialize_seq(Some(1))?;
    stages.serialize_element("All")?;
    stages.end()
}

/// What the stored object must look like for a delete to go ahead
#[derive(Default, Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    /// The stored object must be at this resource version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    /// The stored object must have this uid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
