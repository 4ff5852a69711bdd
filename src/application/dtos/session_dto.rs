use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use crate::domain::entities::device::DeviceType;
use crate::domain::entities::session::Session;

/// Par de tokens emitido para una sesión
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Identidad ya validada de quien hace la petición
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedPrincipal {
    pub user_id: String,
    pub role: String,
    /// Email o teléfono
    pub contact: Option<String>,
    /// `None` sólo para tokens heredados sin sesión
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDto {
    pub id: String,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

impl SessionDto {
    pub fn from_session(session: Session, current_session_id: Option<&str>) -> Self {
        let current = current_session_id == Some(session.id());
        Self {
            id: session.id,
            device_type: session.device_type,
            browser: session.browser,
            os: session.os,
            ip_address: session.ip_address,
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            expires_at: session.expires_at,
            current,
        }
    }
}

/// Notificación emitida cuando se abre una sesión nueva
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreatedEvent {
    pub session_id: String,
    pub user_id: String,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionCreatedEvent {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            device_type: session.device_type,
            browser: session.browser.clone(),
            os: session.os.clone(),
            ip_address: session.ip_address.clone(),
            created_at: session.created_at,
        }
    }
}
