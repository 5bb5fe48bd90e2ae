/*
[INPUT]:  Authentication state transitions from the token manager and teardown handler
[OUTPUT]: Latest-value auth state distribution via `watch` + callback subscriptions
[POS]:    Auth layer - process-wide observable session state (no I/O)
[UPDATE]: When the published state shape or subscription semantics change
*/

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::AuthState;

/// Broadcasts the current [`AuthState`] to every interested component.
///
/// Subscribers always observe the latest value; intermediate states published
/// in quick succession may be coalesced.
#[derive(Debug, Clone)]
pub struct AuthStateNotifier {
    state_tx: watch::Sender<AuthState>,
}

impl AuthStateNotifier {
    pub fn new(initial: AuthState) -> Self {
        let (state_tx, _rx) = watch::channel(initial);
        Self { state_tx }
    }

    /// Replace the state and wake all subscribers
    pub fn publish(&self, state: AuthState) {
        debug!(
            authenticated = state.is_authenticated,
            has_user = state.current_user.is_some(),
            "auth state published"
        );
        self.state_tx.send_replace(state);
    }

    /// Mutate in place; subscribers are woken only when `modify` returns true
    pub fn update<F>(&self, modify: F) -> bool
    where
        F: FnOnce(&mut AuthState) -> bool,
    {
        self.state_tx.send_if_modified(modify)
    }

    pub fn current(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Receiver positioned at the current value; `changed()` fires on the next publish
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Invoke `callback` with every subsequently published state.
    ///
    /// Must be called inside a tokio runtime. Dropping the returned
    /// [`Subscription`] stops delivery.
    pub fn listen<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let mut state_rx = self.subscribe();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = state_rx.borrow_and_update().clone();
                        callback(&state);
                    }
                }
            }
        });

        Subscription {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Default for AuthStateNotifier {
    fn default() -> Self {
        Self::new(AuthState::logged_out())
    }
}

/// Handle returned by [`AuthStateNotifier::listen`]
#[derive(Debug)]
pub struct Subscription {
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop delivery and wait for the listener task to exit
    pub async fn unsubscribe(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
