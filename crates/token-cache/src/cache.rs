//! Per-service bearer token cache

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::credential::CachedCredential;
use crate::error::AuthResult;
use crate::exchange::CredentialExchange;

/// Service key used when callers do not name one
pub const DEFAULT_SERVICE: &str = "default";

/// Tokens are treated as expired this long before their real expiry
pub const EXPIRY_BUFFER: Duration = Duration::from_millis(30_000);

type Slot = Arc<Mutex<Option<CachedCredential>>>;

/// Holds one cached credential per service key.
///
/// Each service has its own lock around check-then-fetch, so concurrent
/// callers for the same service wait for a single exchange and share its
/// token, while other services are never blocked by it.
pub struct TokenCache {
    /// Exchange used for any service without its own
    exchange: Arc<dyn CredentialExchange>,
    /// Per-service exchange overrides
    exchanges: HashMap<String, Arc<dyn CredentialExchange>>,
    slots: RwLock<HashMap<String, Slot>>,
    buffer: Duration,
}

impl TokenCache {
    pub fn new(exchange: Arc<dyn CredentialExchange>) -> Self {
        Self {
            exchange,
            exchanges: HashMap::new(),
            slots: RwLock::new(HashMap::new()),
            buffer: EXPIRY_BUFFER,
        }
    }

    /// Use a dedicated exchange for one service key
    pub fn with_service(mut self, service: impl Into<String>, exchange: Arc<dyn CredentialExchange>) -> Self {
        self.exchanges.insert(service.into(), exchange);
        self
    }

    /// The exchange serving a given service key
    pub fn exchange_for(&self, service: &str) -> Arc<dyn CredentialExchange> {
        self.exchanges
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.exchange.clone())
    }

    /// Return a token that stays valid for at least the expiry buffer,
    /// fetching a new one when the cached entry is absent or expired.
    pub async fn get_valid_token(&self, service: &str) -> AuthResult<String> {
        let slot = self.slot(service).await;
        let mut entry = slot.lock().await;

        if let Some(credential) = entry.as_ref() {
            if credential.is_valid_at(Instant::now(), self.buffer) {
                return Ok(credential.token().to_string());
            }
            debug!("Token for service '{}' expired", service);
        }

        self.fetch_into(&mut entry, service).await
    }

    /// Drop the cached credential for a service
    pub async fn invalidate(&self, service: &str) {
        let slot = self.slot(service).await;
        if slot.lock().await.take().is_some() {
            debug!("Invalidated token for service '{}'", service);
        }
    }

    /// Invalidate, then fetch a fresh token
    pub async fn refresh(&self, service: &str) -> AuthResult<String> {
        self.invalidate(service).await;
        self.get_valid_token(service).await
    }

    /// Replace a token the server rejected.
    ///
    /// When the cache already holds a different token, another caller has
    /// replaced the rejected one and that token is returned without a new
    /// exchange.
    pub async fn refresh_rejected(&self, service: &str, rejected: &str) -> AuthResult<String> {
        let slot = self.slot(service).await;
        let mut entry = slot.lock().await;

        if let Some(credential) = entry.as_ref() {
            if credential.token() != rejected && credential.is_valid_at(Instant::now(), self.buffer) {
                debug!("Token for service '{}' already replaced", service);
                return Ok(credential.token().to_string());
            }
        }

        *entry = None;
        self.fetch_into(&mut entry, service).await
    }

    /// Whether a service currently holds a token that would be reused
    pub async fn has_valid_token(&self, service: &str) -> bool {
        let slot = self.slot(service).await;
        let entry = slot.lock().await;
        entry
            .as_ref()
            .map(|c| c.is_valid_at(Instant::now(), self.buffer))
            .unwrap_or(false)
    }

    async fn fetch_into(&self, entry: &mut Option<CachedCredential>, service: &str) -> AuthResult<String> {
        let body = self.exchange_for(service).exchange().await?;
        let credential = CachedCredential::from_response(&body, Instant::now())?;
        info!("Acquired token for service '{}'", service);

        let token = credential.token().to_string();
        *entry = Some(credential);
        Ok(token)
    }

    async fn slot(&self, service: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(service) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(service.to_string())
            .or_default()
            .clone()
    }
}
