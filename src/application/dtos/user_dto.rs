use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use crate::application::dtos::session_dto::{AuthenticatedPrincipal, TokenPair};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub role: String,
    pub contact: Option<String>,
    pub session_id: Option<String>,
}

impl From<AuthenticatedPrincipal> for UserDto {
    fn from(principal: AuthenticatedPrincipal) -> Self {
        Self {
            id: principal.user_id,
            role: principal.role,
            contact: principal.contact,
            session_id: principal.session_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub session_id: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl AuthResponseDto {
    pub fn from_pair(pair: TokenPair, now: DateTime<Utc>) -> Self {
        Self {
            expires_in: (pair.access_expires_at - now).num_seconds().max(0),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            session_id: pair.session_id,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevocationCountDto {
    pub revoked_sessions: u64,
}
