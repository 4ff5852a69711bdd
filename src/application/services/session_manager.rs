use std::sync::Arc;

use chrono::{Duration, Utc, DateTime};
use tracing::{debug, info, instrument, warn};

use crate::application::dtos::session_dto::{SessionCreatedEvent, TokenPair};
use crate::application::ports::auth_ports::{SessionEventPort, SessionStoragePort, UserStoragePort};
use crate::common::config::AuthConfig;
use crate::domain::entities::device::DeviceInfo;
use crate::domain::entities::refresh_token::RefreshToken;
use crate::domain::entities::session::{Session, SessionState};
use crate::domain::entities::user::User;
use crate::domain::repositories::session_repository::{RotationOutcome, TokenRotation};
use crate::domain::services::auth_error::AuthError;
use crate::domain::services::token_codec::{token_digest, TokenCodec, TokenKind, TokenSubject};

pub const REASON_TOKEN_ROTATED: &str = "Token rotated";
pub const REASON_TOKEN_EXPIRED: &str = "Token expired";
pub const REASON_USER_LOGOUT: &str = "User logout";
pub const REASON_LOGOUT_ALL: &str = "Logout from all devices";
pub const REASON_PASSWORD_CHANGED: &str = "Password changed";
pub const REASON_REVOKED_BY_USER: &str = "Revoked by user";

/// Vidas de tokens y sesiones
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub session_ttl: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(30),
            session_ttl: Duration::days(30),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self {
            access_token_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_token_ttl: Duration::seconds(config.refresh_token_ttl_secs),
            session_ttl: Duration::seconds(config.session_ttl_secs),
        })
    }
}

/// What a revocation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationTarget {
    Session(String),
    User(String),
}

/**
 * Owns the session and refresh-token lifecycle.
 *
 * A session stays usable only while it is live and holds at least one live
 * refresh token. Rotation stores the replacement before revoking the presented
 * token, inside one storage transaction, so a failure part-way never strands a
 * live session without a token.
 */
pub struct SessionManager {
    storage: Arc<dyn SessionStoragePort>,
    users: Arc<dyn UserStoragePort>,
    codec: Arc<TokenCodec>,
    events: Arc<dyn SessionEventPort>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn SessionStoragePort>,
        users: Arc<dyn UserStoragePort>,
        codec: Arc<TokenCodec>,
        events: Arc<dyn SessionEventPort>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            storage,
            users,
            codec,
            events,
            settings,
        }
    }

    /// Abre una sesión nueva y emite su primer par de tokens
    #[instrument(skip(self, user, device), fields(user_id = %user.id()))]
    pub async fn issue(&self, user: &User, device: &DeviceInfo) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let session = Session::new(user.id().to_string(), device, self.settings.session_ttl, now);
        let session_id = session.id().to_string();

        let subject = TokenSubject::for_user(user, Some(&session_id));
        let refresh = self.codec.issue(TokenKind::Refresh, &subject, self.settings.refresh_token_ttl)?;
        let access = self.codec.issue(TokenKind::Access, &subject, self.settings.access_token_ttl)?;

        let record = RefreshToken::new(
            token_digest(&refresh.token),
            user.id().to_string(),
            session_id.clone(),
            now,
            refresh.expires_at(),
            device,
        );

        let event = SessionCreatedEvent::from(&session);
        self.storage.create_session(session, record).await?;
        info!("Session {} created for user {}", session_id, user.id());

        self.notify_session_created(event);

        Ok(TokenPair {
            access_expires_at: access.expires_at(),
            refresh_expires_at: refresh.expires_at(),
            access_token: access.token,
            refresh_token: refresh.token,
            session_id,
        })
    }

    fn notify_session_created(&self, event: SessionCreatedEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            events.session_created(event).await;
        });
    }

    /// Cambia un token de refresco por un par nuevo dentro de la misma sesión
    #[instrument(skip(self, refresh_token, device))]
    pub async fn rotate(&self, refresh_token: &str, device: &DeviceInfo) -> Result<TokenPair, AuthError> {
        let now = Utc::now();

        let claims = match self.codec.verify(refresh_token, TokenKind::Refresh) {
            Ok(verified) => verified.into_claims(),
            Err(AuthError::TokenExpired) => {
                self.retire_expired_token(refresh_token, now).await;
                return Err(AuthError::TokenExpired);
            }
            Err(e) => return Err(e),
        };

        let record = self
            .storage
            .get_refresh_token(&token_digest(refresh_token))
            .await?
            .ok_or_else(|| {
                warn!("Refresh token with valid signature has no record (user {})", claims.sub);
                AuthError::TokenNotRecognized
            })?;

        if record.revoked {
            warn!(
                session_id = %record.session_id,
                "Revoked refresh token presented ({})",
                record.revoked_reason.as_deref().unwrap_or("no reason")
            );
            return Err(AuthError::TokenRevoked);
        }

        if record.is_expired_at(now) {
            self.storage
                .revoke_refresh_token(record.id(), REASON_TOKEN_EXPIRED, now)
                .await?;
            return Err(AuthError::TokenExpired);
        }

        if claims.session_id.as_deref() != Some(record.session_id()) || claims.sub != record.user_id {
            warn!("Refresh token claims do not match its record {}", record.id());
            return Err(AuthError::InvalidToken("token does not match its record".to_string()));
        }

        let session = self
            .storage
            .get_session(record.session_id())
            .await?
            .ok_or_else(|| AuthError::SessionInvalid("session not found".to_string()))?;

        match session.state_at(now) {
            SessionState::Live => {}
            SessionState::Revoked => {
                return Err(AuthError::SessionInvalid("session revoked".to_string()));
            }
            SessionState::Expired => {
                return Err(AuthError::SessionInvalid("session expired".to_string()));
            }
        }

        let user = self
            .users
            .get_user_by_id(&record.user_id)
            .await?
            .filter(User::is_active)
            .ok_or(AuthError::UserNotFound)?;

        let subject = TokenSubject::for_user(&user, Some(record.session_id()));
        let new_refresh = self.codec.issue(TokenKind::Refresh, &subject, self.settings.refresh_token_ttl)?;

        let rotation = TokenRotation {
            session_id: record.session_id.clone(),
            old_token_id: record.id.clone(),
            new_token: RefreshToken::new(
                token_digest(&new_refresh.token),
                user.id().to_string(),
                record.session_id.clone(),
                now,
                new_refresh.expires_at(),
                &merge_device(device, record.device()),
            ),
            session_expires_at: now + self.settings.session_ttl,
            reason: REASON_TOKEN_ROTATED.to_string(),
            at: now,
        };

        match self.storage.rotate_refresh_token(rotation).await? {
            RotationOutcome::Rotated => {
                debug!("Rotated refresh token for session {}", record.session_id);
            }
            RotationOutcome::OldTokenAlreadyRevoked => {
                warn!(
                    "Concurrent rotation of the same refresh token in session {}",
                    record.session_id
                );
            }
            RotationOutcome::SessionNotLive => {
                return Err(AuthError::SessionInvalid("session ended during rotation".to_string()));
            }
        }

        let access = self.codec.issue(TokenKind::Access, &subject, self.settings.access_token_ttl)?;

        Ok(TokenPair {
            access_expires_at: access.expires_at(),
            refresh_expires_at: new_refresh.expires_at(),
            access_token: access.token,
            refresh_token: new_refresh.token,
            session_id: record.session_id,
        })
    }

    /// Marks the record of an expired but authentic refresh token as revoked
    async fn retire_expired_token(&self, refresh_token: &str, now: DateTime<Utc>) {
        if self.codec.verify_ignoring_expiry(refresh_token, TokenKind::Refresh).is_err() {
            return;
        }

        match self.storage.get_refresh_token(&token_digest(refresh_token)).await {
            Ok(Some(record)) if !record.revoked => {
                if let Err(e) = self
                    .storage
                    .revoke_refresh_token(record.id(), REASON_TOKEN_EXPIRED, now)
                    .await
                {
                    warn!("Could not revoke expired refresh token {}: {}", record.id(), e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not look up expired refresh token: {}", e),
        }
    }

    /// Revoca una sesión o todas las de un usuario. Devuelve las sesiones afectadas.
    #[instrument(skip(self))]
    pub async fn revoke(&self, target: &RevocationTarget, reason: &str) -> Result<u64, AuthError> {
        let now = Utc::now();
        let revoked = match target {
            RevocationTarget::Session(session_id) => {
                u64::from(self.storage.revoke_session(session_id, reason, now).await?)
            }
            RevocationTarget::User(user_id) => {
                self.storage.revoke_all_user_sessions(user_id, reason, now).await?
            }
        };

        info!("Revoked {} session(s) for {:?}: {}", revoked, target, reason);
        Ok(revoked)
    }

    /// Una sesión es válida si está viva y conserva un token de refresco vivo
    pub async fn validate_session(&self, session_id: &str) -> Result<bool, AuthError> {
        let now = Utc::now();

        let session = match self.storage.get_session(session_id).await? {
            Some(session) => session,
            None => return Ok(false),
        };

        if !session.is_live_at(now) {
            return Ok(false);
        }

        Ok(self.storage.has_live_refresh_token(session_id, now).await?)
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.storage.get_session(session_id).await?)
    }

    pub async fn list_live_sessions(&self, user_id: &str) -> Result<Vec<Session>, AuthError> {
        Ok(self.storage.get_live_sessions(user_id, Utc::now()).await?)
    }
}

/// Attributes the client sent now win over the ones stored with the old token
fn merge_device(current: &DeviceInfo, previous: DeviceInfo) -> DeviceInfo {
    DeviceInfo {
        device_id: current.device_id.clone().or(previous.device_id),
        user_agent: current.user_agent.clone().or(previous.user_agent),
        ip_address: current.ip_address.clone().or(previous.ip_address),
    }
}
