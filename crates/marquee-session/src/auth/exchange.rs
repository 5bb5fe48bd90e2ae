/*
[INPUT]:  A refresh credential
[OUTPUT]: A fresh credential pair from the backend refresh endpoint
[POS]:    Auth layer - the single network call behind every refresh
[UPDATE]: When the refresh endpoint, its payload, or its timeout policy change
*/

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::http::{ClientConfig, RefreshError, Result, normalize_error_message};
use crate::types::AuthResponse;

/// Refresh endpoint, relative to the API root
pub const REFRESH_ENDPOINT: &str = "auth/sign/refresh";

/// Trait for exchanging a refresh credential for a new pair
#[async_trait]
pub trait RefreshExchange: Send + Sync + fmt::Debug {
    async fn exchange(&self, refresh_token: &str) -> std::result::Result<AuthResponse, RefreshError>;
}

/// Exchange against the backend over a dedicated HTTP client.
///
/// The client carries no interceptor, so a rejected refresh can never
/// trigger another refresh.
#[derive(Debug, Clone)]
pub struct HttpRefreshExchange {
    http_client: Client,
    refresh_url: Url,
    timeout: Duration,
}

impl HttpRefreshExchange {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.refresh_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            refresh_url: config.api_url(REFRESH_ENDPOINT)?,
            timeout: config.refresh_timeout,
        })
    }

    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }
}

#[async_trait]
impl RefreshExchange for HttpRefreshExchange {
    async fn exchange(&self, refresh_token: &str) -> std::result::Result<AuthResponse, RefreshError> {
        debug!(url = %self.refresh_url, "exchanging refresh credential");

        let response = self
            .http_client
            .post(self.refresh_url.clone())
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    RefreshError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    RefreshError::ExchangeFailed {
                        message: err.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| RefreshError::ExchangeFailed {
            message: err.to_string(),
        })?;

        if !status.is_success() {
            let detail = normalize_error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(RefreshError::ExchangeFailed {
                message: format!("refresh rejected with status {}: {detail}", status.as_u16()),
            });
        }

        serde_json::from_str(&body).map_err(|err| RefreshError::ExchangeFailed {
            message: format!("malformed refresh response: {err}"),
        })
    }
}

/// Scripted exchange for tests.
///
/// Replies are consumed in order; a gated exchange waits for [`release`]
/// before answering, which keeps a refresh in flight deterministically.
///
/// [`release`]: MockRefreshExchange::release
#[derive(Debug, Default)]
pub struct MockRefreshExchange {
    replies: Mutex<VecDeque<std::result::Result<AuthResponse, RefreshError>>>,
    presented: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl MockRefreshExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchange that blocks every call until released
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Queue a successful reply
    pub fn succeed_with(self, access: &str, refresh: Option<&str>) -> Self {
        self.push(Ok(AuthResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            user: None,
        }));
        self
    }

    /// Queue a failed reply
    pub fn fail_with(self, error: RefreshError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, reply: std::result::Result<AuthResponse, RefreshError>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Let `count` pending or future calls proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh credentials presented so far, in call order
    pub fn presented(&self) -> Vec<String> {
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RefreshExchange for MockRefreshExchange {
    async fn exchange(&self, refresh_token: &str) -> std::result::Result<AuthResponse, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(refresh_token.to_string());

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|err| RefreshError::ExchangeFailed {
                message: err.to_string(),
            })?;
            permit.forget();
        }

        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(RefreshError::ExchangeFailed {
                    message: "no scripted reply".to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_mock_exchange_replies_in_order() {
        let exchange = MockRefreshExchange::new()
            .succeed_with("A2", Some("R2"))
            .fail_with(RefreshError::NoRefreshCredential);

        let first = assert_ok!(exchange.exchange("R1").await);
        assert_eq!(first.access_token, "A2");
        assert_eq!(
            exchange.exchange("R2").await.unwrap_err(),
            RefreshError::NoRefreshCredential
        );
        assert!(exchange.exchange("R2").await.is_err());

        assert_eq!(exchange.calls(), 3);
        assert_eq!(exchange.presented(), vec!["R1", "R2", "R2"]);
    }

    #[tokio::test]
    async fn test_gated_exchange_waits_for_release() {
        let exchange = Arc::new(MockRefreshExchange::gated().succeed_with("A2", None));
        let pending = tokio::spawn({
            let exchange = exchange.clone();
            async move { exchange.exchange("R1").await }
        });

        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        exchange.release(1);
        let reply = pending.await.unwrap().unwrap();
        assert_eq!(reply.access_token, "A2");
    }

    #[test]
    fn test_http_exchange_url() {
        let config = ClientConfig {
            base_url: "http://localhost:3001/".to_string(),
            ..ClientConfig::default()
        };
        let exchange = assert_ok!(HttpRefreshExchange::new(&config));
        assert_eq!(
            exchange.refresh_url().as_str(),
            "http://localhost:3001/api/v1/auth/sign/refresh"
        );
    }
}
