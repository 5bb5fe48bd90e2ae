/*
[INPUT]:  Sign-in/sign-up payloads, profile patches, the authenticated client
[OUTPUT]: Established or ended sessions, the signed-in user profile
[POS]:    HTTP layer - auth and user endpoints
[UPDATE]: When auth endpoints or their payloads change
*/

// ### Auth Endpoints

use reqwest::Method;
use tracing::warn;

use crate::http::{ApiClient, Result};
use crate::types::{AuthResponse, AuthState, LoginRequest, SignUpRequest, User, UserPatch};

pub const SIGN_IN_ENDPOINT: &str = "auth/sign/in";
pub const SIGN_UP_ENDPOINT: &str = "auth/sign/up";
pub const SIGN_OUT_ENDPOINT: &str = "auth/sign/out";
pub const ME_ENDPOINT: &str = "users/me";

impl ApiClient {
    /// Sign in with email and password
    ///
    /// POST /api/v1/auth/sign/in
    pub async fn sign_in(&self, request: &LoginRequest) -> Result<AuthState> {
        let response: AuthResponse = self
            .send_public(Method::POST, SIGN_IN_ENDPOINT, Some(request))
            .await?;
        Ok(self.establish_session(response).await)
    }

    /// Register a new local account and sign in
    ///
    /// POST /api/v1/auth/sign/up
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthState> {
        let response: AuthResponse = self
            .send_public(Method::POST, SIGN_UP_ENDPOINT, Some(request))
            .await?;
        Ok(self.establish_session(response).await)
    }

    /// End the session on the backend; local credentials are cleared regardless
    ///
    /// POST /api/v1/auth/sign/out
    pub async fn sign_out(&self) -> Result<()> {
        let outcome = self
            .send_json::<serde_json::Value, ()>(Method::POST, SIGN_OUT_ENDPOINT, None)
            .await;
        if let Err(err) = outcome {
            warn!(error = %err, "backend sign-out failed; clearing local session");
        }
        self.manager().logout();
        Ok(())
    }

    /// Fetch the signed-in user
    ///
    /// GET /api/v1/users/me
    pub async fn me(&self) -> Result<User> {
        self.get(ME_ENDPOINT).await
    }

    /// Update a user profile; the published user follows when it is the same account
    ///
    /// PATCH /api/v1/users/{id}
    pub async fn update_profile(&self, user_id: &str, patch: &UserPatch) -> Result<User> {
        let user: User = self.patch(&format!("users/{user_id}"), patch).await?;

        let is_current = self
            .manager()
            .auth_state()
            .current_user
            .is_some_and(|current| current.id == user.id);
        if is_current {
            self.manager().set_user(user.clone());
        }
        Ok(user)
    }

    async fn establish_session(&self, response: AuthResponse) -> AuthState {
        let has_user = response.user.is_some();
        self.manager().login(response);
        if has_user {
            return self.manager().auth_state();
        }

        match self.me().await {
            Ok(user) => self.manager().set_user(user),
            Err(err) => warn!(error = %err, "signed in but failed to load the user profile"),
        }
        self.manager().auth_state()
    }
}
