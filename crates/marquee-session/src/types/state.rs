/*
[INPUT]:  Credential presence, expiry timestamps and the signed-in user
[OUTPUT]: Observable auth state snapshots and token status reports
[POS]:    Data layer - read-only views handed to UI collaborators
[UPDATE]: When the auth state shape exposed to subscribers changes
*/

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::User;

/// Global auth state observed by UI bindings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub current_user: Option<User>,
}

impl AuthState {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn authenticated(user: Option<User>) -> Self {
        Self {
            is_authenticated: true,
            current_user: user,
        }
    }
}

/// Point-in-time credential report; never carries token values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub minutes_until_expiry: Option<i64>,
}
