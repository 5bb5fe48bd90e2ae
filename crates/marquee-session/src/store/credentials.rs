/*
[INPUT]:  Access/refresh credential pair, a clock, a lease duration, a key-value backend
[OUTPUT]: Cached credential reads, persisted writes, computed expiry, teardown
[POS]:    Storage layer - single source of truth for the credential pair
[UPDATE]: When storage keys, lease computation, or degradation rules change
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::auth::Clock;
use crate::http::Result;
use crate::store::kv::{KeyValueStore, StoreError};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Expiry is persisted as epoch milliseconds
pub const TOKEN_EXPIRY_KEY: &str = "tokenExpiry";

#[derive(Default)]
struct CachedCredentials {
    access: Option<String>,
    refresh: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// Access/refresh pair with an in-memory cache in front of a persistent backend.
///
/// Persistence failures never lose credentials for the running process: the
/// memory cache is updated first and the store drops to memory-only mode.
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    lease: chrono::Duration,
    cache: RwLock<CachedCredentials>,
    memory_only: AtomicBool,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, lease: Duration) -> Self {
        Self {
            backend,
            clock,
            lease: chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero()),
            cache: RwLock::new(CachedCredentials::default()),
            memory_only: AtomicBool::new(false),
        }
    }

    /// Store a credential pair and stamp its expiry at `now + lease`.
    ///
    /// A `None` refresh credential keeps the previously stored one. The
    /// returned error only reports that persistence failed; the in-memory
    /// values are already in place.
    pub fn write(&self, access: &str, refresh: Option<&str>) -> Result<DateTime<Utc>> {
        let expires_at = self.clock.now() + self.lease;
        let mut cache = self.write_cache();
        cache.access = Some(access.to_string());
        if let Some(refresh) = refresh {
            cache.refresh = Some(refresh.to_string());
        }
        cache.expires_at = Some(expires_at);

        self.persist(|backend| {
            backend.set(ACCESS_TOKEN_KEY, access)?;
            if let Some(refresh) = refresh {
                backend.set(REFRESH_TOKEN_KEY, refresh)?;
            }
            backend.set(TOKEN_EXPIRY_KEY, &expires_at.timestamp_millis().to_string())
        })?;

        debug!(expires_at = %expires_at, "credentials stored");
        Ok(expires_at)
    }

    pub fn read_access(&self) -> Option<String> {
        if let Some(access) = self.read_cache().access.clone() {
            return Some(access);
        }
        let mut cache = self.write_cache();
        if cache.access.is_none() {
            cache.access = self.hydrate(ACCESS_TOKEN_KEY);
        }
        cache.access.clone()
    }

    pub fn read_refresh(&self) -> Option<String> {
        if let Some(refresh) = self.read_cache().refresh.clone() {
            return Some(refresh);
        }
        let mut cache = self.write_cache();
        if cache.refresh.is_none() {
            cache.refresh = self.hydrate(REFRESH_TOKEN_KEY);
        }
        cache.refresh.clone()
    }

    /// Recorded expiry; an unparsable persisted value counts as absent
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if let Some(expires_at) = self.read_cache().expires_at {
            return Some(expires_at);
        }
        let mut cache = self.write_cache();
        if cache.expires_at.is_some() {
            return cache.expires_at;
        }
        cache.expires_at = self.hydrate(TOKEN_EXPIRY_KEY).and_then(|raw| {
            let parsed = raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis);
            if parsed.is_none() {
                warn!(value = %raw, "ignoring unparsable token expiry");
            }
            parsed
        });
        cache.expires_at
    }

    /// Remove all three entries. Idempotent.
    pub fn clear(&self) -> Result<()> {
        // Held until the backend is wiped so a cold read cannot re-cache old values
        let mut cache = self.write_cache();
        *cache = CachedCredentials::default();
        self.persist(|backend| {
            backend.remove(ACCESS_TOKEN_KEY)?;
            backend.remove(REFRESH_TOKEN_KEY)?;
            backend.remove(TOKEN_EXPIRY_KEY)
        })
    }

    /// True once a backend failure has switched the store to memory-only mode
    pub fn is_memory_only(&self) -> bool {
        self.memory_only.load(Ordering::SeqCst)
    }

    fn persist<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&dyn KeyValueStore) -> std::result::Result<(), StoreError>,
    {
        if self.is_memory_only() {
            return Ok(());
        }
        op(self.backend.as_ref()).map_err(|err| {
            self.degrade(&err);
            err.into()
        })
    }

    fn hydrate(&self, key: &str) -> Option<String> {
        if self.is_memory_only() {
            return None;
        }
        match self.backend.get(key) {
            Ok(value) => value,
            Err(err) => {
                self.degrade(&err);
                None
            }
        }
    }

    fn degrade(&self, err: &StoreError) {
        if !self.memory_only.swap(true, Ordering::SeqCst) {
            warn!(error = %err, "persistent credential store unavailable; continuing memory-only");
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, CachedCredentials> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, CachedCredentials> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.read_cache();
        f.debug_struct("CredentialStore")
            .field("backend", &self.backend)
            .field("has_access", &cache.access.is_some())
            .field("has_refresh", &cache.refresh.is_some())
            .field("expires_at", &cache.expires_at)
            .field("memory_only", &self.is_memory_only())
            .finish()
    }
}
