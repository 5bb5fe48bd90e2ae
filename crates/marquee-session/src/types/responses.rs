/*
[INPUT]:  Backend auth schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

use super::models::User;

/// Credential pair (and optionally the user) returned by sign-in, sign-up and refresh
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

// Custom Debug to avoid exposing tokens
impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_without_user() {
        let json = r#"{"accessToken":"A1","refreshToken":"R1"}"#;
        let response: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "A1");
        assert_eq!(response.refresh_token.as_deref(), Some("R1"));
        assert!(response.user.is_none());
    }

    #[test]
    fn test_debug_output_does_not_expose_tokens() {
        let response = AuthResponse {
            access_token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            user: None,
        };
        let debug_output = format!("{:?}", response);
        assert!(!debug_output.contains("secret-access"));
        assert!(!debug_output.contains("secret-refresh"));
    }
}
