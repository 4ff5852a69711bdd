use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::application::ports::auth_ports::BlacklistStoragePort;
use crate::domain::entities::blacklist_entry::BlacklistEntry;
use crate::domain::services::auth_error::AuthError;
use crate::domain::services::token_codec::{token_digest, TokenCodec};

/// Lista negra de tokens de acceso con copia local en memoria.
///
/// Storage is the source of truth. The local map only speeds up the common
/// case and is rebuilt by `reload`; a local miss always falls through to
/// storage so another instance's revocations are honoured.
pub struct RevocationCache {
    storage: Arc<dyn BlacklistStoragePort>,
    codec: Arc<TokenCodec>,
    // token hash -> expiry
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
    default_ttl: Duration,
}

impl RevocationCache {
    /// Builds the cache and loads every active entry from storage
    pub async fn new(
        storage: Arc<dyn BlacklistStoragePort>,
        codec: Arc<TokenCodec>,
        default_ttl: Duration,
    ) -> Self {
        let cache = Self {
            storage,
            codec,
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        };

        if let Err(e) = cache.reload().await {
            warn!("Starting with an empty revocation cache: {}", e);
        }

        cache
    }

    pub async fn is_blacklisted(&self, token: &str) -> bool {
        let now = Utc::now();
        let token_hash = token_digest(token);

        {
            let entries = self.entries.read().await;
            if matches!(entries.get(&token_hash), Some(expires_at) if *expires_at > now) {
                return true;
            }
        }

        match self.storage.find_active_entry(&token_hash, now).await {
            Ok(Some(entry)) => {
                debug!("Blacklist hit from storage, caching locally");
                self.entries.write().await.insert(token_hash, entry.expires_at);
                true
            }
            Ok(None) => false,
            // Fails open: a revoked session is still caught by the liveness check
            Err(e) => {
                warn!("Blacklist lookup failed, treating token as not revoked: {}", e);
                false
            }
        }
    }

    /// Revoca un token de acceso hasta su expiración natural
    pub async fn blacklist(&self, token: &str, user_id: &str, reason: &str) -> Result<(), AuthError> {
        let now = Utc::now();
        let expires_at = self
            .codec
            .peek_expiry(token)
            .unwrap_or_else(|| now + self.default_ttl);

        if expires_at <= now {
            debug!("Token already expired, nothing to blacklist");
            return Ok(());
        }

        let token_hash = token_digest(token);
        let entry = BlacklistEntry::new(
            token_hash.clone(),
            user_id.to_string(),
            reason.to_string(),
            expires_at,
            now,
        );
        self.storage.add_entry(entry).await?;

        self.entries
            .write()
            .await
            .entry(token_hash)
            .and_modify(|current| {
                if expires_at > *current {
                    *current = expires_at;
                }
            })
            .or_insert(expires_at);

        info!("Access token of user {} blacklisted: {}", user_id, reason);
        Ok(())
    }

    /// Replaces the local map with the active entries in storage
    pub async fn reload(&self) -> Result<usize, AuthError> {
        let now = Utc::now();
        let fresh: HashMap<String, DateTime<Utc>> = self
            .storage
            .list_active_entries(now)
            .await?
            .into_iter()
            .map(|entry| (entry.token_hash, entry.expires_at))
            .collect();

        let count = fresh.len();
        *self.entries.write().await = fresh;
        debug!("Revocation cache reloaded with {} entries", count);
        Ok(count)
    }

    /// Elimina entradas expiradas en almacenamiento y en memoria
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let removed = self.storage.delete_expired_entries(now).await?;
        self.entries.write().await.retain(|_, expires_at| *expires_at > now);
        Ok(removed)
    }

    pub async fn cached_entries(&self) -> usize {
        self.entries.read().await.len()
    }
}
