use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

/// Token de acceso revocado antes de su expiración natural
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// SHA-256 (hex) del token completo
    pub token_hash: String,
    pub user_id: String,
    pub reason: String,
    /// Coincide con el `exp` del token; pasado ese instante la entrada sobra
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn new(
        token_hash: String,
        user_id: String,
        reason: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            token_hash,
            user_id,
            reason,
            expires_at,
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
