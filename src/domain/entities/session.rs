use serde::{Serialize, Deserialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, Duration};

use crate::domain::entities::device::{DeviceInfo, DeviceType};

/// Estado observable de una sesión en un instante dado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Live,
    Expired,
    Revoked,
}

/// Sesión de un usuario en un dispositivo.
///
/// Once revoked a session never becomes live again; `extend` only moves the
/// expiry of a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub fingerprint: String,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub ip_address: Option<String>,
    pub trusted: bool,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
}

impl Session {
    pub fn new(
        user_id: String,
        device: &DeviceInfo,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let classification = device.classify();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            fingerprint: device.fingerprint(),
            device_id: device.device_id.clone(),
            user_agent: device.user_agent.clone(),
            device_type: classification.device_type,
            browser: classification.browser,
            os: classification.os,
            ip_address: device.ip_address.clone(),
            trusted: false,
            created_at: now,
            last_active_at: now,
            expires_at: now + ttl,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked_at.is_some() {
            SessionState::Revoked
        } else if self.expires_at <= now {
            SessionState::Expired
        } else {
            SessionState::Live
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SessionState::Live
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Desliza la expiración de una sesión viva. Devuelve `false` si ya no lo está.
    pub fn extend(&mut self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if !self.is_live_at(now) {
            return false;
        }
        self.expires_at = now + ttl;
        self.last_active_at = now;
        true
    }

    /// Revoca la sesión. La primera revocación gana.
    pub fn revoke(&mut self, now: DateTime<Utc>, reason: &str) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        self.revoked_at = Some(now);
        self.revoked_reason = Some(reason.to_string());
        true
    }
}
