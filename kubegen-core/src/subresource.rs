//! Request builder types and parameters for subresources
use crate::request::{validate_name, Error, Request};

/// Params of the `log` subresource of pods
#[derive(Default, Clone, Debug)]
pub struct LogParams {
    /// The container to read from, required when the pod has more than one
    pub container: Option<String>,
    /// Read the logs of the previous, terminated instance of the container
    pub previous: bool,
    /// Only the last lines of the log
    pub tail_lines: Option<i64>,
}

impl Request {
    /// Read the logs of a pod
    pub fn logs(&self, name: &str, lp: &LogParams) -> Result<http::Request<Vec<u8>>, Error> {
        validate_name(name)?;
        let mut qp = form_urlencoded::Serializer::new(format!("{}/{}/log?", self.url_path, name));
        if let Some(container) = &lp.container {
            qp.append_pair("container", container);
        }
        if lp.previous {
            qp.append_pair("previous", "true");
        }
        if let Some(lines) = lp.tail_lines {
            qp.append_pair("tailLines", &lines.to_string());
        }
        http::Request::get(qp.finish())
            .body(vec![])
            .map_err(Error::BuildRequest)
    }
}

#[cfg(test)]
mod test {
    use super::LogParams;
    use crate::request::Request;

    #[test]
    fn log_queries() {
        let pods = Request::new("/api/v1/namespaces/ns/pods");
        let req = pods.logs("web", &LogParams::default()).unwrap();
        assert_eq!(req.uri(), "/api/v1/namespaces/ns/pods/web/log?");
        let lp = LogParams {
            container: Some("nginx".into()),
            previous: true,
            tail_lines: Some(20),
        };
        let req = pods.logs("web", &lp).unwrap();
        assert_eq!(
            req.uri(),
            "/api/v1/namespaces/ns/pods/web/log?&container=nginx&previous=true&tailLines=20"
        );
        assert!(pods.logs("", &lp).is_err());
    }
}
