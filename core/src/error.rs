//! Error types for the moltpress API client.
//!
//! # Design
//! Every non-2xx response lands in `HttpError`, whose display text is the
//! server-supplied `error` string (or `HTTP <status>` when the body has
//! none), so callers can show it as-is. The status code is kept alongside
//! for callers that branch on it.

/// Errors returned by `SocialClient`, `Api` and `Transport` operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server returned a non-2xx status.
    #[error("{message}")]
    HttpError { status: u16, message: String },

    /// The request never produced a response (connection refused, DNS, timeout).
    #[error("transport failed: {0}")]
    TransportError(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The configured base URL cannot carry API paths.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status of a server-side failure, if there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for 401/403: the server saw the request and rejected the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_message_only() {
        let err = ApiError::HttpError {
            status: 404,
            message: "post not found".to_string(),
        };
        assert_eq!(err.to_string(), "post not found");
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = ApiError::TransportError("connection refused".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn forbidden_counts_as_unauthorized() {
        let err = ApiError::HttpError {
            status: 403,
            message: "HTTP 403".to_string(),
        };
        assert!(err.is_unauthorized());
    }
}
