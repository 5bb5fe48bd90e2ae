/*
[INPUT]:  `TokenManager` handle, check interval, minimum spacing, shutdown token
[OUTPUT]: Periodic proactive refresh of credentials nearing expiry
[POS]:    Auth layer - background housekeeping (no request path involvement)
[UPDATE]: When check cadence or refresh triggers change
*/

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::TokenManager;

/// Result of a single monitor check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCheck {
    /// Previous check was too recent
    Skipped,
    /// No session to maintain
    NotAuthenticated,
    /// Credential is not near expiry
    Fresh,
    Refreshed,
    Failed,
}

/// Background task that refreshes credentials before they expire
#[derive(Debug)]
pub struct TokenMonitor {
    manager: TokenManager,
    interval: Duration,
    min_spacing: Duration,
    last_check: Mutex<Option<Instant>>,
}

impl TokenMonitor {
    pub fn new(manager: TokenManager) -> Self {
        let interval = manager.config().monitor_interval;
        let min_spacing = manager.config().monitor_min_spacing;
        Self {
            manager,
            interval,
            min_spacing,
            last_check: Mutex::new(None),
        }
    }

    pub async fn check(&self) -> MonitorCheck {
        let now = Instant::now();
        {
            let mut last_check = self.last_check.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(last) = *last_check {
                if now.duration_since(last) < self.min_spacing {
                    return MonitorCheck::Skipped;
                }
            }
            *last_check = Some(now);
        }

        if !self.manager.auth_state().is_authenticated || !self.manager.has_refresh_token() {
            return MonitorCheck::NotAuthenticated;
        }
        if !self.manager.is_expired() && !self.manager.is_expiring_soon() {
            return MonitorCheck::Fresh;
        }

        debug!("credential expiring; refreshing in background");
        match self.manager.refresh().await {
            Ok(_) => MonitorCheck::Refreshed,
            Err(err) => {
                warn!(error = %err, "background token refresh failed");
                MonitorCheck::Failed
            }
        }
    }

    /// Run checks every interval until `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "token monitor started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("token monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let outcome = self.check().await;
                        debug!(outcome = ?outcome, "token monitor check");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{HeadlessNavigator, ManualClock, MockRefreshExchange, SessionConfig};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn monitor_with(exchange: Arc<MockRefreshExchange>) -> (TokenMonitor, TokenManager, ManualClock) {
        let clock = ManualClock::default();
        let config = SessionConfig {
            monitor_min_spacing: Duration::ZERO,
            ..SessionConfig::default()
        };
        let manager = TokenManager::with_clock(
            Arc::new(MemoryStore::new()),
            exchange,
            Arc::new(HeadlessNavigator),
            config,
            Arc::new(clock.clone()),
        );
        (TokenMonitor::new(manager.clone()), manager, clock)
    }

    #[tokio::test]
    async fn test_check_refreshes_only_when_expiring() {
        let exchange = Arc::new(MockRefreshExchange::new().succeed_with("A2", Some("R2")));
        let (monitor, manager, clock) = monitor_with(exchange.clone());

        assert_eq!(monitor.check().await, MonitorCheck::NotAuthenticated);

        manager.set_tokens("A1", Some("R1"));
        assert_eq!(monitor.check().await, MonitorCheck::Fresh);

        clock.advance(chrono::Duration::minutes(52));
        assert_eq!(monitor.check().await, MonitorCheck::Refreshed);
        assert_eq!(manager.access_token().as_deref(), Some("A2"));
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn test_check_respects_min_spacing() {
        let exchange = Arc::new(MockRefreshExchange::new());
        let (mut monitor, _manager, _clock) = monitor_with(exchange);
        monitor.min_spacing = Duration::from_secs(60);

        assert_eq!(monitor.check().await, MonitorCheck::NotAuthenticated);
        assert_eq!(monitor.check().await, MonitorCheck::Skipped);
    }

    #[tokio::test]
    async fn test_spawned_monitor_stops_on_cancel() {
        let exchange = Arc::new(MockRefreshExchange::new());
        let (monitor, _manager, _clock) = monitor_with(exchange);
        let shutdown = CancellationToken::new();

        let handle = monitor.spawn(shutdown.clone());
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
