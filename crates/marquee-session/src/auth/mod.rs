/*
[INPUT]:  Credential store, refresh exchange, navigation surface
[OUTPUT]: Token lifecycle manager, auth state notifier, unauthorized teardown, monitor
[POS]:    Auth layer - session lifecycle for the whole process
[UPDATE]: When auth flow, refresh policy, or teardown behavior change
*/

pub mod clock;
pub mod exchange;
pub mod manager;
pub mod monitor;
pub mod notifier;
pub mod unauthorized;

pub use clock::{Clock, ManualClock, SystemClock};
pub use exchange::{HttpRefreshExchange, MockRefreshExchange, REFRESH_ENDPOINT, RefreshExchange};
pub use manager::{SessionConfig, TokenManager};
pub use monitor::{MonitorCheck, TokenMonitor};
pub use notifier::{AuthStateNotifier, Subscription};
pub use unauthorized::{
    HeadlessNavigator, MockNavigator, Navigator, SESSION_EXPIRED_MESSAGE, UnauthorizedHandler,
    is_auth_surface,
};
