use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::application::dtos::session_dto::{AuthenticatedPrincipal, SessionDto};
use crate::application::dtos::user_dto::AuthResponseDto;
use crate::application::services::revocation_cache::RevocationCache;
use crate::application::services::session_manager::{
    RevocationTarget, SessionManager, REASON_LOGOUT_ALL, REASON_PASSWORD_CHANGED,
    REASON_REVOKED_BY_USER, REASON_USER_LOGOUT,
};
use crate::domain::entities::device::DeviceInfo;
use crate::domain::entities::user::User;
use crate::domain::services::auth_error::AuthError;

/// Casos de uso de sesión expuestos a la capa HTTP y a otros módulos
pub struct AuthApplicationService {
    session_manager: Arc<SessionManager>,
    revocation_cache: Arc<RevocationCache>,
}

impl AuthApplicationService {
    pub fn new(
        session_manager: Arc<SessionManager>,
        revocation_cache: Arc<RevocationCache>,
    ) -> Self {
        Self {
            session_manager,
            revocation_cache,
        }
    }

    /// Opens a session for a user whose credentials were checked elsewhere
    pub async fn start_session(&self, user: &User, device: &DeviceInfo) -> Result<AuthResponseDto, AuthError> {
        let pair = self.session_manager.issue(user, device).await?;
        info!("User {} signed in on session {}", user.id(), pair.session_id);
        Ok(AuthResponseDto::from_pair(pair, Utc::now()))
    }

    pub async fn refresh_token(&self, refresh_token: &str, device: &DeviceInfo) -> Result<AuthResponseDto, AuthError> {
        let pair = self.session_manager.rotate(refresh_token, device).await?;
        Ok(AuthResponseDto::from_pair(pair, Utc::now()))
    }

    /// Cierra la sesión actual y revoca el token de acceso presentado
    pub async fn logout(&self, principal: &AuthenticatedPrincipal, access_token: Option<&str>) -> Result<u64, AuthError> {
        // Legacy tokens carry no session, so every session of the user goes
        let target = match &principal.session_id {
            Some(session_id) => RevocationTarget::Session(session_id.clone()),
            None => RevocationTarget::User(principal.user_id.clone()),
        };
        let revoked = self.session_manager.revoke(&target, REASON_USER_LOGOUT).await?;

        self.blacklist_presented(principal, access_token, REASON_USER_LOGOUT).await;
        Ok(revoked)
    }

    /// Cierra todas las sesiones del usuario
    pub async fn logout_all(&self, principal: &AuthenticatedPrincipal, access_token: Option<&str>) -> Result<u64, AuthError> {
        let revoked = self
            .session_manager
            .revoke(&RevocationTarget::User(principal.user_id.clone()), REASON_LOGOUT_ALL)
            .await?;

        self.blacklist_presented(principal, access_token, REASON_LOGOUT_ALL).await;
        Ok(revoked)
    }

    /// Called by the accounts module after a password change or reset
    pub async fn password_changed(&self, user_id: &str) -> Result<u64, AuthError> {
        self.session_manager
            .revoke(&RevocationTarget::User(user_id.to_string()), REASON_PASSWORD_CHANGED)
            .await
    }

    pub async fn list_sessions(&self, principal: &AuthenticatedPrincipal) -> Result<Vec<SessionDto>, AuthError> {
        let sessions = self.session_manager.list_live_sessions(&principal.user_id).await?;
        Ok(sessions
            .into_iter()
            .map(|session| SessionDto::from_session(session, principal.session_id.as_deref()))
            .collect())
    }

    /// Revoca una sesión propia, p. ej. un dispositivo perdido
    pub async fn revoke_session(&self, principal: &AuthenticatedPrincipal, session_id: &str) -> Result<(), AuthError> {
        let session = self
            .session_manager
            .find_session(session_id)
            .await?
            .ok_or_else(|| AuthError::SessionInvalid("session not found".to_string()))?;

        if session.user_id() != principal.user_id {
            return Err(AuthError::AccessDenied(format!(
                "session {} belongs to another user",
                session_id
            )));
        }

        self.session_manager
            .revoke(&RevocationTarget::Session(session_id.to_string()), REASON_REVOKED_BY_USER)
            .await?;
        Ok(())
    }

    /// The session is already revoked, so a failure here only delays rejection
    /// until the liveness check; it is logged, not returned.
    async fn blacklist_presented(&self, principal: &AuthenticatedPrincipal, access_token: Option<&str>, reason: &str) {
        if let Some(token) = access_token {
            if let Err(e) = self.revocation_cache.blacklist(token, &principal.user_id, reason).await {
                warn!("Could not blacklist access token of user {}: {}", principal.user_id, e);
            }
        }
    }
}
