/*
[INPUT]:  Terminal authentication failures from the token manager or HTTP interceptor
[OUTPUT]: One-shot session teardown: cleared credentials, logged-out state, sign-in redirect
[POS]:    Auth layer - bridges session failure to the navigation surface
[UPDATE]: When teardown ordering, auth surfaces, or redirect timing change
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthStateNotifier;
use crate::store::CredentialStore;
use crate::types::AuthState;

/// Notification shown when a session is forcibly ended
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Navigation surface the session reports to (a router, a terminal, a test double)
pub trait Navigator: Send + Sync + fmt::Debug {
    /// Location the user is currently viewing, as an absolute path
    fn current_path(&self) -> String;

    /// Show a brief user-facing notification
    fn notify(&self, _message: &str) {}

    fn redirect(&self, path: &str);
}

/// Navigator for processes without a navigation surface; stays on the root
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessNavigator;

impl Navigator for HeadlessNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn redirect(&self, path: &str) {
        debug!(path, "redirect requested without a navigation surface");
    }
}

/// Recording navigator for tests and dry runs
#[derive(Debug)]
pub struct MockNavigator {
    path: Mutex<String>,
    notifications: Mutex<Vec<String>>,
    redirects: Mutex<Vec<String>>,
}

impl MockNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_string()),
            notifications: Mutex::new(Vec::new()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn set_path(&self, path: &str) {
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = path.to_string();
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for MockNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn notify(&self, message: &str) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn redirect(&self, path: &str) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        self.set_path(path);
    }
}

/// Root and `/auth/*` pages never trigger a redirect
pub fn is_auth_surface(path: &str) -> bool {
    path == "/" || path == "/auth" || path.starts_with("/auth/")
}

/// Ends a session at most once per authenticated lifetime.
///
/// Re-armed whenever new credentials are stored, so concurrent failures of
/// the same session collapse into a single teardown.
#[derive(Debug)]
pub struct UnauthorizedHandler {
    store: Arc<CredentialStore>,
    notifier: AuthStateNotifier,
    navigator: Arc<dyn Navigator>,
    sign_in_path: String,
    redirect_delay: Duration,
    armed: AtomicBool,
    pending_redirect: Mutex<Option<JoinHandle<()>>>,
}

impl UnauthorizedHandler {
    pub fn new(
        store: Arc<CredentialStore>,
        notifier: AuthStateNotifier,
        navigator: Arc<dyn Navigator>,
        sign_in_path: impl Into<String>,
        redirect_delay: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            navigator,
            sign_in_path: sign_in_path.into(),
            redirect_delay,
            armed: AtomicBool::new(true),
            pending_redirect: Mutex::new(None),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Wait for a scheduled sign-in redirect, if any, to run.
    ///
    /// Short-lived processes call this before exiting so the redirect is not
    /// lost with the runtime.
    pub async fn wait_for_redirect(&self) {
        let pending = self
            .pending_redirect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            if let Err(err) = handle.await {
                warn!(error = %err, "sign-in redirect task failed");
            }
        }
    }

    /// Tear the session down. Returns false when this session was already torn down.
    pub fn handle(&self) -> bool {
        if !self.armed.swap(false, Ordering::SeqCst) {
            debug!("session teardown already performed");
            return false;
        }

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear persisted credentials during teardown");
        }
        self.notifier.publish(AuthState::logged_out());
        info!("session ended; credentials cleared");

        let current = self.navigator.current_path();
        if is_auth_surface(&current) {
            debug!(path = %current, "already on an auth surface; skipping redirect");
            return true;
        }

        self.navigator.notify(SESSION_EXPIRED_MESSAGE);
        self.schedule_redirect();
        true
    }

    fn schedule_redirect(&self) {
        let navigator = Arc::clone(&self.navigator);
        let path = self.sign_in_path.clone();
        let delay = self.redirect_delay;

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    navigator.redirect(&path);
                });
                *self
                    .pending_redirect
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(_) => {
                warn!("no async runtime available; redirecting immediately");
                navigator.redirect(&path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SystemClock;
    use crate::store::MemoryStore;
    use rstest::rstest;

    fn build_handler(navigator: Arc<MockNavigator>) -> (UnauthorizedHandler, Arc<CredentialStore>, AuthStateNotifier) {
        let store = Arc::new(CredentialStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            Duration::from_secs(3300),
        ));
        let notifier = AuthStateNotifier::new(AuthState::authenticated(None));
        let handler = UnauthorizedHandler::new(
            store.clone(),
            notifier.clone(),
            navigator,
            "/auth/signin",
            Duration::from_secs(1),
        );
        (handler, store, notifier)
    }

    #[rstest]
    #[case("/", true)]
    #[case("/auth/signin", true)]
    #[case("/auth/signup", true)]
    #[case("/movies/42", false)]
    #[case("/authors", false)]
    fn test_is_auth_surface(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_auth_surface(path), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_tears_down_once_and_redirects_after_delay() {
        let navigator = Arc::new(MockNavigator::at("/movies/42"));
        let (handler, store, notifier) = build_handler(navigator.clone());
        store.write("A1", Some("R1")).unwrap();

        assert!(handler.handle());
        assert!(!handler.handle());

        assert_eq!(store.read_access(), None);
        assert_eq!(store.read_refresh(), None);
        assert!(!notifier.current().is_authenticated);
        assert_eq!(navigator.notifications(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
        assert!(navigator.redirects().is_empty());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(navigator.redirects(), vec!["/auth/signin".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_on_auth_surface_skips_redirect() {
        let navigator = Arc::new(MockNavigator::at("/auth/signin"));
        let (handler, _store, notifier) = build_handler(navigator.clone());

        assert!(handler.handle());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!notifier.current().is_authenticated);
        assert!(navigator.notifications().is_empty());
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_redirect_runs_the_scheduled_redirect() {
        let navigator = Arc::new(MockNavigator::at("/movies/42"));
        let (handler, _store, _notifier) = build_handler(navigator.clone());

        assert!(handler.handle());
        assert!(navigator.redirects().is_empty());

        handler.wait_for_redirect().await;
        assert_eq!(navigator.redirects(), vec!["/auth/signin".to_string()]);

        // Nothing pending: returns immediately
        handler.wait_for_redirect().await;
        assert_eq!(navigator.redirects().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_redirect_without_teardown_returns() {
        let navigator = Arc::new(MockNavigator::at("/movies/42"));
        let (handler, _store, _notifier) = build_handler(navigator.clone());

        handler.wait_for_redirect().await;
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_arm_allows_next_teardown() {
        let navigator = Arc::new(MockNavigator::at("/"));
        let (handler, _store, _notifier) = build_handler(navigator);

        assert!(handler.handle());
        assert!(!handler.is_armed());
        handler.arm();
        assert!(handler.handle());
    }
}
