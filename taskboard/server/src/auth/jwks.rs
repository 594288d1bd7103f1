//! Cache of the identity provider's published signing keys.
//!
//! Keys are indexed by their key identifier (`kid`). A lookup that misses
//! re-fetches the whole key set, replaces the cache and retries once.
//! Concurrent misses may each trigger a fetch; the last one to finish wins.

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors that can occur while resolving a verification key.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    /// The key set was fetched but does not contain the requested key.
    #[error("No signing key with id '{0}' in the published key set")]
    NotFound(String),
    /// The key set could not be retrieved.
    #[error("Failed to fetch the published key set: {0}")]
    FetchFailed(String),
}

/// Source of the provider's key set document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetches the full key set.
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Fetches the key set over HTTP from the provider's JWKS endpoint.
pub struct HttpKeySetSource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySetError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::FetchFailed(format!(
                "key set endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::FetchFailed(e.to_string()))
    }
}

/// Read-through cache from key identifier to verification key.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl KeySetCache {
    /// Creates an empty cache backed by the given source.
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a key identifier to a verification key, re-fetching the key
    /// set once when the identifier is not cached.
    pub async fn resolve(&self, key_id: &str) -> Result<DecodingKey, KeySetError> {
        if let Some(key) = self.keys.read().await.get(key_id) {
            return Ok(key.clone());
        }

        tracing::debug!(key_id, "Signing key not cached, refreshing key set");
        self.refresh().await?;

        self.keys
            .read()
            .await
            .get(key_id)
            .cloned()
            .ok_or_else(|| KeySetError::NotFound(key_id.to_string()))
    }

    /// Replaces the cached keys with a freshly fetched key set.
    async fn refresh(&self) -> Result<(), KeySetError> {
        let key_set = self.source.fetch().await?;

        let mut keys = HashMap::with_capacity(key_set.keys.len());
        for jwk in &key_set.keys {
            let Some(key_id) = jwk.common.key_id.clone() else {
                tracing::warn!("Ignoring published key without a key id");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(key_id, key);
                }
                Err(err) => {
                    tracing::warn!(key_id, "Ignoring unusable published key: {}", err);
                }
            }
        }

        tracing::info!("Loaded {} signing keys", keys.len());
        *self.keys.write().await = keys;
        Ok(())
    }
}
