use serde::{Serialize, Deserialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::entities::device::DeviceInfo;

/// Registro persistido de un token de refresco emitido.
///
/// Only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub token_hash: String,
    pub user_id: String,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshToken {
    pub fn new(
        token_hash: String,
        user_id: String,
        session_id: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        device: &DeviceInfo,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            token_hash,
            user_id,
            session_id,
            issued_at,
            expires_at,
            revoked: false,
            revoked_at: None,
            revoked_reason: None,
            last_used_at: None,
            device_id: device.device_id.clone(),
            ip_address: device.ip_address.clone(),
            user_agent: device.user_agent.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    pub fn revoke(&mut self, now: DateTime<Utc>, reason: &str) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(now);
        self.revoked_reason = Some(reason.to_string());
        true
    }

    /// Metadatos del dispositivo que presentó este token
    pub fn device(&self) -> DeviceInfo {
        DeviceInfo::new(
            self.device_id.clone(),
            self.user_agent.clone(),
            self.ip_address.clone(),
        )
    }
}
