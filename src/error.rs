//! Error types shared by the API client and the state holders.

use serde_json::Value;

/// Result alias used by every REST call.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout, I/O).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    /// The server rejected the bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not logged in. Use /login first")]
    NotAuthenticated,

    #[error("Session expired. Please /login again")]
    SessionExpired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Build an error from a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| format!("HTTP {}", status));
        if status == 401 {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Server { status, message }
        }
    }

    /// True when the error means the stored credentials are no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized(_) | ApiError::NotAuthenticated | ApiError::SessionExpired
        )
    }
}

/// A single failed field check (checkout forms, config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Pull a human-readable message out of an error body.
///
/// Backends report errors as `{"message": ..}`, as problem details
/// (`{"title": .., "errors": {"Field": ["msg"]}}`), as `{"error": ..}` or as
/// plain text. Returns `None` for an empty body.
pub fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let json: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Some(body.to_string()),
    };

    if let Some(s) = json.as_str() {
        return Some(s.to_string());
    }

    for key in ["message", "title", "error"] {
        if let Some(s) = json.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }

    // {"errors": {"Quantity": ["must be positive"]}}
    if let Some(errors) = json.get("errors").and_then(|v| v.as_object()) {
        for (field, messages) in errors {
            let first = messages
                .as_array()
                .and_then(|a| a.first())
                .and_then(|m| m.as_str())
                .or_else(|| messages.as_str());
            if let Some(msg) = first {
                return Some(format!("{}: {}", field, msg));
            }
        }
    }

    Some(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_variants() {
        assert_eq!(
            extract_message(r#"{"message":"Out of stock"}"#).as_deref(),
            Some("Out of stock")
        );
        assert_eq!(
            extract_message(r#"{"title":"One or more validation errors occurred."}"#).as_deref(),
            Some("One or more validation errors occurred.")
        );
        assert_eq!(
            extract_message(r#"{"errors":{"Quantity":["Must be positive"]}}"#).as_deref(),
            Some("Quantity: Must be positive")
        );
        assert_eq!(
            extract_message("Book not found").as_deref(),
            Some("Book not found")
        );
        assert_eq!(extract_message("\"plain json string\"").as_deref(), Some("plain json string"));
        assert!(extract_message("   ").is_none());
    }

    #[test]
    fn test_from_status() {
        match ApiError::from_status(401, "") {
            ApiError::Unauthorized(msg) => assert_eq!(msg, "HTTP 401"),
            other => panic!("unexpected: {:?}", other),
        }
        match ApiError::from_status(400, r#"{"message":"Not enough stock"}"#) {
            ApiError::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Not enough stock");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_display_carries_server_message() {
        let err = ApiError::Server {
            status: 409,
            message: "Order already delivered".to_string(),
        };
        assert_eq!(err.to_string(), "Order already delivered (HTTP 409)");
        assert!(!err.is_auth_failure());
        assert!(ApiError::SessionExpired.is_auth_failure());
    }
}
