use crate::{api::Api, Error, Result};
use kubegen_core::{subresource::LogParams, Resource};

// ----------------------------------------------------------------------------
// Log subresource
// ----------------------------------------------------------------------------

/// Marker trait for objects that has logs
pub trait Loggable {}

impl Loggable for k8s_openapi::api::core::v1::Pod {}

impl<K> Api<K>
where
    K: Resource + Loggable,
{
    /// Fetch logs as a string
    ///
    /// Transport and status failures are returned, an empty log is an empty string.
    pub async fn logs(&self, name: &str, namespace: &str, lp: &LogParams) -> Result<String> {
        let mut req = self
            .request(namespace)
            .logs(name, lp)
            .map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("logs");
        self.client.request_text(req).await
    }
}
