/*
[INPUT]:  HTTP configuration (base URL, prefix/version, timeouts, retry policy), token manager
[OUTPUT]: JSON API calls with credential attachment, bounded retry, refresh-and-retry on 401
[POS]:    HTTP layer - core client and request interceptor
[UPDATE]: When adding connection options or changing interceptor behavior
*/

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{HttpRefreshExchange, Navigator, SessionConfig, TokenManager};
use crate::http::{Result, SessionError, is_transient_status};
use crate::store::KeyValueStore;

/// Default backend location
const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub api_version: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Transport timeout of the refresh exchange client
    pub refresh_timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub retry_limit: u32,
    /// First backoff delay; doubles per retry
    pub initial_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: "api".to_string(),
            api_version: "v1".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            refresh_timeout: Duration::from_secs(10),
            retry_limit: 2,
            initial_backoff: Duration::from_millis(300),
        }
    }
}

impl ClientConfig {
    /// `<base_url>/<api_prefix>/<api_version>/`
    pub fn api_root(&self) -> Result<Url> {
        let mut root = Url::parse(&format!("{}/", self.base_url.trim_end_matches('/')))?;
        if !matches!(root.scheme(), "http" | "https") {
            return Err(SessionError::Config(format!(
                "base URL must use http or https, got {}",
                root.scheme()
            )));
        }
        for segment in [&self.api_prefix, &self.api_version] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                root = root.join(&format!("{segment}/"))?;
            }
        }
        Ok(root)
    }

    pub fn api_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.api_root()?.join(endpoint.trim_start_matches('/'))?)
    }
}

/// JSON API client bound to one token manager
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    api_root: Url,
    config: ClientConfig,
    manager: TokenManager,
}

impl ApiClient {
    pub fn new(config: ClientConfig, manager: TokenManager) -> Result<Self> {
        if config.timeout.is_zero() || config.connect_timeout.is_zero() {
            return Err(SessionError::Config(
                "request and connect timeouts must be non-zero".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_root: config.api_root()?,
            config,
            manager,
        })
    }

    /// Wire a manager with an HTTP refresh exchange and a client on top of it
    pub fn connect(
        config: ClientConfig,
        session: SessionConfig,
        backend: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let exchange = HttpRefreshExchange::new(&config)?;
        let manager = TokenManager::new(backend, Arc::new(exchange), navigator, session);
        Self::new(config, manager)
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.api_root.join(endpoint.trim_start_matches('/'))?)
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.send_json::<T, ()>(Method::GET, endpoint, None).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn patch<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PATCH, endpoint, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.send_json::<T, ()>(Method::DELETE, endpoint, None).await
    }

    /// Authenticated JSON request.
    ///
    /// Attaches the current access credential, refreshes first when it is
    /// expiring, and recovers from one authentication rejection by refreshing
    /// and retrying exactly once.
    pub async fn send_json<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(endpoint)?;
        let body = body.map(serde_json::to_vec).transpose()?;
        let response = self.send_authenticated(&method, &url, body.as_deref()).await?;
        decode(response).await
    }

    /// JSON request that never carries credentials and never enters the refresh path
    pub async fn send_public<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(endpoint)?;
        let body = body.map(serde_json::to_vec).transpose()?;
        let response = self.send_with_retry(&method, &url, body.as_deref(), None).await?;
        decode(response).await
    }

    async fn send_authenticated(&self, method: &Method, url: &Url, body: Option<&[u8]>) -> Result<Response> {
        self.prepare_credentials().await;

        let token = self.manager.access_token();
        let response = self.send_with_retry(method, url, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(endpoint = %url, "request rejected; attempting credential refresh");
        if !self.manager.has_refresh_token() {
            self.manager.handle_unauthorized();
            return Err(SessionError::AuthRejected);
        }

        let token = match self.manager.refresh().await {
            Ok(token) => token,
            Err(err) => {
                warn!(endpoint = %url, error = %err, "refresh after rejection failed");
                self.manager.handle_unauthorized();
                return Err(SessionError::AuthRejected);
            }
        };

        let retried = self.send_with_retry(method, url, body, Some(&token)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(endpoint = %url, "request rejected again after refresh");
            self.manager.handle_unauthorized();
            return Err(SessionError::AuthRejected);
        }
        Ok(retried)
    }

    /// Best-effort refresh ahead of sending; failure falls through to the stored credential
    async fn prepare_credentials(&self) {
        if !self.manager.has_refresh_token() || !self.manager.is_expiring_soon() {
            return;
        }
        debug!("access credential expiring; refreshing before send");
        if let Err(err) = self.manager.refresh().await {
            warn!(error = %err, "proactive refresh failed; sending with current credentials");
        }
    }

    /// Send with bounded exponential backoff on transient failures.
    ///
    /// Authentication rejections are returned untouched for the caller to handle.
    async fn send_with_retry(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        bearer: Option<&str>,
    ) -> Result<Response> {
        let mut attempt: u32 = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            let mut builder = self.http_client.request(method.clone(), url.clone());
            if let Some(token) = bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(bytes) = body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(bytes.to_vec());
            }

            let outcome = builder.send().await;
            let transient = match &outcome {
                Ok(response) => is_transient_status(response.status().as_u16()),
                Err(err) => err.is_timeout() || err.is_connect(),
            };

            if transient && attempt < self.config.retry_limit {
                attempt += 1;
                let reason = match &outcome {
                    Ok(response) => response.status().to_string(),
                    Err(err) => err.to_string(),
                };
                warn!(
                    endpoint = %url,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    reason = %reason,
                    "transient failure; backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                continue;
            }

            return match outcome {
                Ok(response) => Ok(response),
                Err(err) if transient => Err(SessionError::TransientNetworkFailure {
                    attempts: attempt + 1,
                    message: err.to_string(),
                }),
                Err(err) => Err(err.into()),
            };
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SessionError::from_response(status, &body));
    }
    if body.trim().is_empty() {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_str(&body)?)
}
