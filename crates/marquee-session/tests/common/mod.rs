/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for marquee-session tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use marquee_session::{
    ApiClient, ClientConfig, HttpRefreshExchange, ManualClock, MemoryStore, MockNavigator,
    RefreshExchange, SessionConfig, TokenManager, User,
};
use wiremock::{Match, MockServer, Request};

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Session config with short delays so tests never wait on real seconds
pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        redirect_delay: Duration::from_millis(20),
        refresh_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

pub fn test_client_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        refresh_timeout: Duration::from_secs(2),
        initial_backoff: Duration::from_millis(10),
        ..ClientConfig::default()
    }
}

/// Everything a test needs to drive and inspect one session
pub struct Harness {
    pub manager: TokenManager,
    pub backend: Arc<MemoryStore>,
    pub navigator: Arc<MockNavigator>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(exchange: Arc<dyn RefreshExchange>) -> Self {
        Self::with_backend(exchange, Arc::new(MemoryStore::new()))
    }

    pub fn with_backend(exchange: Arc<dyn RefreshExchange>, backend: Arc<MemoryStore>) -> Self {
        let navigator = Arc::new(MockNavigator::at("/movies"));
        let clock = ManualClock::default();
        let manager = TokenManager::with_clock(
            backend.clone(),
            exchange,
            navigator.clone(),
            test_session_config(),
            Arc::new(clock.clone()),
        );
        Self {
            manager,
            backend,
            navigator,
            clock,
        }
    }
}

/// Client wired against the mock server, including the real refresh exchange
pub fn client_harness(server: &MockServer) -> (ApiClient, Harness) {
    let config = test_client_config(server);
    let exchange = HttpRefreshExchange::new(&config).expect("refresh exchange");
    let harness = Harness::new(Arc::new(exchange));
    let client = ApiClient::new(config, harness.manager.clone()).expect("api client");
    (client, harness)
}

/// Wait until `condition` holds, failing the test after one second
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 1s");
}

pub fn sample_user() -> User {
    User {
        id: "u-1".to_string(),
        name: "Ana".to_string(),
        email: "ana@example.com".to_string(),
        ..User::default()
    }
}

pub fn user_json() -> serde_json::Value {
    serde_json::json!({
        "id": "u-1",
        "name": "Ana",
        "email": "ana@example.com",
        "role": "user",
        "provider": "local",
    })
}

pub fn token_pair_json(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "accessToken": access,
        "refreshToken": refresh,
    })
}

/// Matches requests that carry no `Authorization` header
pub struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}
