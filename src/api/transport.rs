use crate::error::ApiError;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A single REST call, independent of the HTTP library.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root, e.g. `/api/Cart/items/3`
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Full `Authorization` header value
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            authorization: None,
            body: None,
        }
    }

    pub fn auth(mut self, header: Option<&str>) -> Self {
        self.authorization = header.map(str::to_string);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, params: Vec<(String, String)>) -> Self {
        self.query = params;
        self
    }
}

/// Raw HTTP outcome. Any status, success or not, is a response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP transports to allow faking the server in tests.
///
/// Implementations return `Err` only when no HTTP response was obtained.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_millis(timeout_ms))
                .build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!(method = request.method.as_str(), %url, "sending request");

        let mut req = self
            .agent
            .request(request.method.as_str(), &url)
            .set("Accept", "application/json");
        for (key, value) in &request.query {
            req = req.query(key, value);
        }
        if let Some(auth) = &request.authorization {
            req = req.set("Authorization", auth);
        }

        let resp = match &request.body {
            Some(body) => req
                .set("Content-Type", "application/json")
                .send_json(body.clone()),
            None => req.call(),
        };

        match resp {
            Ok(r) => {
                let status = r.status();
                let body = r
                    .into_string()
                    .map_err(|e| ApiError::Transport(format!("reading response: {}", e)))?;
                Ok(ApiResponse { status, body })
            }
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                tracing::debug!(status, "server returned error status");
                Ok(ApiResponse { status, body })
            }
            Err(e) => Err(ApiError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::new(Method::Post, "/api/Cart/items")
            .auth(Some("Bearer abc"))
            .json(json!({"bookId": 1, "quantity": 2}));
        assert_eq!(req.method.as_str(), "POST");
        assert_eq!(req.authorization.as_deref(), Some("Bearer abc"));
        assert_eq!(req.body.as_ref().unwrap()["quantity"], 2);
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_http_transport_trims_base_url() {
        let transport = HttpTransport::new("http://localhost:5000/", 1000);
        assert_eq!(transport.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to be listening.
        let transport = HttpTransport::new("http://127.0.0.1:9", 500);
        let err = transport
            .send(&ApiRequest::new(Method::Get, "/api/Books"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn test_response_success_range() {
        let ok = ApiResponse { status: 204, body: String::new() };
        let bad = ApiResponse { status: 404, body: String::new() };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
