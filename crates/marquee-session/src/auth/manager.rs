/*
[INPUT]:  Credential store, refresh exchange, navigator, session configuration
[OUTPUT]: Coalesced refresh, expiry queries, login/logout transitions, published auth state
[POS]:    Auth layer - owns the credential lifecycle for the whole process
[UPDATE]: When refresh coalescing, expiry policy, or state transitions change
*/

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{
    AuthStateNotifier, Clock, Navigator, RefreshExchange, SystemClock, UnauthorizedHandler,
};
use crate::http::RefreshError;
use crate::store::{CredentialStore, KeyValueStore};
use crate::types::{AuthResponse, AuthState, TokenStatus, User, UserPatch};

type RefreshOutcome = std::result::Result<String, RefreshError>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Session lifecycle configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client-side lifetime assumed for a freshly issued access credential
    pub lease: Duration,
    /// Window before expiry in which a credential counts as expiring soon
    pub expiring_window: Duration,
    pub redirect_delay: Duration,
    pub sign_in_path: String,
    pub refresh_timeout: Duration,
    pub monitor_interval: Duration,
    pub monitor_min_spacing: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(55 * 60),
            expiring_window: Duration::from_secs(5 * 60),
            redirect_delay: Duration::from_secs(1),
            sign_in_path: "/auth/signin".to_string(),
            refresh_timeout: Duration::from_secs(10),
            monitor_interval: Duration::from_secs(30),
            monitor_min_spacing: Duration::from_secs(5),
        }
    }
}

/// Process-wide credential lifecycle manager.
///
/// Cheap to clone; all clones share the same store, notifier and in-flight
/// refresh. At most one refresh exchange runs at any time and every
/// concurrent caller receives its outcome.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    store: Arc<CredentialStore>,
    notifier: AuthStateNotifier,
    unauthorized: UnauthorizedHandler,
    exchange: Arc<dyn RefreshExchange>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    in_flight: Mutex<Option<PendingRefresh>>,
}

impl TokenManager {
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        exchange: Arc<dyn RefreshExchange>,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
    ) -> Self {
        Self::with_clock(backend, exchange, navigator, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn KeyValueStore>,
        exchange: Arc<dyn RefreshExchange>,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(CredentialStore::new(backend, Arc::clone(&clock), config.lease));

        let initial = if store.read_access().is_some() && store.read_refresh().is_some() {
            info!("restored persisted session");
            AuthState::authenticated(None)
        } else {
            AuthState::logged_out()
        };
        let notifier = AuthStateNotifier::new(initial);

        let unauthorized = UnauthorizedHandler::new(
            Arc::clone(&store),
            notifier.clone(),
            navigator,
            config.sign_in_path.clone(),
            config.redirect_delay,
        );

        Self {
            inner: Arc::new(ManagerInner {
                store,
                notifier,
                unauthorized,
                exchange,
                clock,
                config,
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn notifier(&self) -> &AuthStateNotifier {
        &self.inner.notifier
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner.notifier.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.notifier.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.store.read_access()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.store.read_refresh()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.inner.store.read_refresh().is_some()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.store.expires_at()
    }

    /// True when no expiry is recorded or it has passed
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => self.inner.clock.now() >= expires_at,
            None => true,
        }
    }

    /// True when no expiry is recorded or it falls within the configured window
    pub fn is_expiring_soon(&self) -> bool {
        self.is_expiring_within(self.inner.config.expiring_window)
    }

    pub fn is_expiring_within(&self, window: Duration) -> bool {
        let Some(expires_at) = self.expires_at() else {
            return true;
        };
        let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        self.inner.clock.now() + window >= expires_at
    }

    /// Credential report without token values
    pub fn status(&self) -> TokenStatus {
        let expires_at = self.expires_at();
        let minutes_until_expiry =
            expires_at.map(|at| (at - self.inner.clock.now()).num_minutes().max(0));

        TokenStatus {
            has_access_token: self.access_token().is_some(),
            has_refresh_token: self.has_refresh_token(),
            is_expired: self.is_expired(),
            is_expiring_soon: self.is_expiring_soon(),
            expires_at,
            minutes_until_expiry,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_in_flight().is_some()
    }

    /// Store a sign-in response and publish it as the authenticated state.
    ///
    /// The published user is replaced, so a response without one clears any
    /// user left from a previous session.
    pub fn login(&self, response: AuthResponse) {
        self.store_pair(&response.access_token, response.refresh_token.as_deref());
        self.inner.unauthorized.arm();
        self.inner
            .notifier
            .publish(AuthState::authenticated(response.user));
        info!("signed in");
    }

    /// Store a credential pair, keeping any published user
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) {
        self.store_pair(access, refresh);
        self.inner.unauthorized.arm();
        self.inner.notifier.update(|state| {
            if state.is_authenticated {
                return false;
            }
            state.is_authenticated = true;
            true
        });
    }

    /// Replace the published user while authenticated
    pub fn set_user(&self, user: User) {
        self.inner.notifier.update(|state| {
            if !state.is_authenticated {
                return false;
            }
            state.current_user = Some(user);
            true
        });
    }

    /// Merge a partial update into the published user
    pub fn update_user(&self, patch: &UserPatch) {
        self.inner.notifier.update(|state| match state.current_user.as_mut() {
            Some(user) => {
                user.apply(patch);
                true
            }
            None => false,
        });
    }

    /// Explicit sign-out: clear credentials and publish the logged-out state. Idempotent.
    pub fn logout(&self) {
        if let Err(err) = self.inner.store.clear() {
            warn!(error = %err, "failed to clear persisted credentials on logout");
        }
        self.inner.notifier.publish(AuthState::logged_out());
        info!("signed out");
    }

    /// Forced teardown; returns false if this session was already torn down
    pub fn handle_unauthorized(&self) -> bool {
        self.inner.unauthorized.handle()
    }

    /// Wait for the sign-in redirect scheduled by the last teardown, if any
    pub async fn wait_for_redirect(&self) {
        self.inner.unauthorized.wait_for_redirect().await;
    }

    /// Obtain a fresh access credential, joining any refresh already in flight.
    ///
    /// Failure ends the session: credentials are cleared, the logged-out state
    /// is published and the unauthorized handler fires.
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let Some(refresh_token) = self.inner.store.read_refresh() else {
                        drop(in_flight);
                        warn!("token refresh requested without a refresh credential");
                        self.inner.unauthorized.handle();
                        return Err(RefreshError::NoRefreshCredential);
                    };
                    let pending = self.start_refresh(refresh_token);
                    *in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_refresh(&self, refresh_token: String) -> PendingRefresh {
        let manager = self.clone();
        let task = tokio::spawn(async move { manager.run_exchange(refresh_token).await });

        let manager = self.clone();
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "token refresh task aborted; ending session");
                    manager.inner.unauthorized.handle();
                    manager.finish_refresh();
                    Err(RefreshError::ExchangeFailed {
                        message: format!("refresh task aborted: {err}"),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn run_exchange(&self, refresh_token: String) -> RefreshOutcome {
        debug!("exchanging refresh credential");
        let limit = self.inner.config.refresh_timeout;

        let outcome = match tokio::time::timeout(limit, self.inner.exchange.exchange(&refresh_token)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RefreshError::Timeout { duration: limit }),
        };

        let result = match outcome {
            Ok(response) => {
                self.store_pair(&response.access_token, response.refresh_token.as_deref());
                self.inner.unauthorized.arm();
                let user = response.user;
                self.inner.notifier.update(|state| {
                    let mut changed = !state.is_authenticated;
                    state.is_authenticated = true;
                    if let Some(user) = user {
                        state.current_user = Some(user);
                        changed = true;
                    }
                    changed
                });
                info!(rotated = response.refresh_token.is_some(), "access credential refreshed");
                Ok(response.access_token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; ending session");
                self.inner.unauthorized.handle();
                Err(err)
            }
        };

        self.finish_refresh();
        result
    }

    fn store_pair(&self, access: &str, refresh: Option<&str>) {
        if let Err(err) = self.inner.store.write(access, refresh) {
            warn!(error = %err, "credentials kept in memory only");
        }
    }

    fn finish_refresh(&self) {
        self.lock_in_flight().take();
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<PendingRefresh>> {
        self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("store", &self.inner.store)
            .field("exchange", &self.inner.exchange)
            .field("config", &self.inner.config)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}
