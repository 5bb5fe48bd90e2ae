/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public session crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod store;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthStateNotifier,
    Clock,
    HeadlessNavigator,
    HttpRefreshExchange,
    ManualClock,
    MockNavigator,
    MockRefreshExchange,
    MonitorCheck,
    Navigator,
    RefreshExchange,
    SessionConfig,
    Subscription,
    SystemClock,
    TokenManager,
    TokenMonitor,
};

// Re-export commonly used types from http
pub use http::{
    ApiClient,
    ClientConfig,
    RefreshError,
    Result,
    SessionError,
};

// Re-export commonly used types from store
pub use store::{
    CredentialStore,
    FileStore,
    KeyValueStore,
    MemoryStore,
    StoreError,
};

// Re-export all types
pub use types::*;
