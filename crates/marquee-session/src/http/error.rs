/*
[INPUT]:  Error sources (HTTP, backend payloads, refresh exchange, key-value store)
[OUTPUT]: Structured error types with retry and auth hints, normalized backend messages
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing backend error payloads
*/

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the session crate
#[derive(Error, Debug)]
pub enum SessionError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Request was rejected for authentication reasons and could not be recovered
    #[error("Request rejected: authentication required")]
    AuthRejected,

    /// Timeout or connection failure that survived the bounded retry
    #[error("Network failure after {attempts} attempts: {message}")]
    TransientNetworkFailure { attempts: u32, message: String },

    /// Refresh exchange failed
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Persistent key-value store could not be read or written
    #[error("Persistent store unavailable: {0}")]
    PersistentStoreUnavailable(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure of a (possibly coalesced) refresh exchange.
///
/// Cloneable because every caller waiting on the same exchange receives the
/// same error value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh credential available")]
    NoRefreshCredential,

    #[error("Token refresh failed: {message}")]
    ExchangeFailed { message: String },

    #[error("Token refresh timed out after {}s", duration.as_secs())]
    Timeout { duration: Duration },
}

impl SessionError {
    /// Check if the error is worth retrying at the transport level
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Http(err) => err.is_timeout() || err.is_connect(),
            SessionError::TransientNetworkFailure { .. } => true,
            SessionError::Api { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    /// Check if error indicates an authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SessionError::AuthRejected
                | SessionError::Refresh(_)
                | SessionError::Api { status: 401, .. }
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Api { status, .. } => Some(*status),
            SessionError::AuthRejected => Some(StatusCode::UNAUTHORIZED.as_u16()),
            SessionError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short message suitable for a user-facing notification
    pub fn user_message(&self) -> &'static str {
        match self.status() {
            Some(401) => "Please sign in to continue.",
            Some(403) => "You do not have permission to do that.",
            Some(404) => "The requested resource was not found.",
            Some(422) => "Please check the information you entered.",
            Some(status) if status >= 500 => "The server ran into a problem.",
            _ if matches!(self, SessionError::Refresh(_)) => {
                "Your session has expired. Please sign in again."
            }
            _ => "Please check your network connection.",
        }
    }

    /// Build an API error from a status and a raw response body
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = normalize_error_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
        SessionError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Statuses retried with backoff, independent of the auth-refresh path
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Extract the first human-readable string from a backend error payload.
///
/// The backend reports `message` either as a string or as an array of
/// validation messages; `error` is the fallback.
pub fn normalize_error_message(body: &str) -> Option<String> {
    let payload: serde_json::Value = serde_json::from_str(body).ok()?;

    let first_text = |value: &serde_json::Value| -> Option<String> {
        match value {
            serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str())
                .find(|text| !text.trim().is_empty())
                .map(str::to_string),
            _ => None,
        }
    };

    payload
        .get("message")
        .and_then(first_text)
        .or_else(|| payload.get("error").and_then(first_text))
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_error_is_auth_error() {
        assert!(SessionError::AuthRejected.is_auth_error());
        assert!(SessionError::Refresh(RefreshError::NoRefreshCredential).is_auth_error());
        assert!(
            !SessionError::TransientNetworkFailure {
                attempts: 3,
                message: "timeout".to_string()
            }
            .is_auth_error()
        );
    }

    #[test]
    fn test_error_retryable() {
        let transient = SessionError::TransientNetworkFailure {
            attempts: 3,
            message: "timeout".to_string(),
        };
        assert!(transient.is_retryable());
        assert!(!SessionError::AuthRejected.is_retryable());
        assert!(
            SessionError::Api {
                status: 503,
                message: "busy".to_string()
            }
            .is_retryable()
        );
    }

    #[rstest]
    #[case(r#"{"message":["email must be an email","password too short"]}"#, Some("email must be an email"))]
    #[case(r#"{"message":"User not found","statusCode":404}"#, Some("User not found"))]
    #[case(r#"{"message":[],"error":"Bad Request"}"#, Some("Bad Request"))]
    #[case(r#"{"message":"   ","error":"Conflict"}"#, Some("Conflict"))]
    #[case(r#"{"statusCode":500}"#, None)]
    #[case("<html>oops</html>", None)]
    fn test_normalize_error_message(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_error_message(body).as_deref(), expected);
    }

    #[test]
    fn test_from_response_falls_back_to_reason() {
        let err = SessionError::from_response(StatusCode::FORBIDDEN, "");
        match err {
            SessionError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("Expected Api error variant, got {other:?}"),
        }
    }

    #[rstest]
    #[case(401, "Please sign in to continue.")]
    #[case(403, "You do not have permission to do that.")]
    #[case(422, "Please check the information you entered.")]
    #[case(502, "The server ran into a problem.")]
    fn test_user_message_by_status(#[case] status: u16, #[case] expected: &str) {
        let err = SessionError::Api {
            status,
            message: String::new(),
        };
        assert_eq!(err.user_message(), expected);
    }

    #[test]
    fn test_refresh_timeout_display() {
        let err = RefreshError::Timeout {
            duration: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "Token refresh timed out after 10s");
    }
}
