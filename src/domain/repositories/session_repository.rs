use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::refresh_token::RefreshToken;
use crate::domain::entities::session::Session;
use crate::common::errors::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum SessionRepositoryError {
    #[error("Sesión no encontrada: {0}")]
    NotFound(String),

    #[error("Error de base de datos: {0}")]
    DatabaseError(String),

    #[error("Error de tiempo de espera: {0}")]
    Timeout(String),
}

pub type SessionRepositoryResult<T> = Result<T, SessionRepositoryError>;

// Conversión de SessionRepositoryError a DomainError
impl From<SessionRepositoryError> for DomainError {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::NotFound(msg) => {
                DomainError::not_found("Session", msg)
            },
            SessionRepositoryError::DatabaseError(msg) => {
                DomainError::internal_error("Database", msg)
            },
            SessionRepositoryError::Timeout(msg) => {
                DomainError::timeout("Database", msg)
            },
        }
    }
}

/// Rotación de un token de refresco, aplicada como una única unidad
#[derive(Debug, Clone)]
pub struct TokenRotation {
    pub session_id: String,
    pub old_token_id: String,
    pub new_token: RefreshToken,
    pub session_expires_at: DateTime<Utc>,
    /// Motivo registrado en el token anterior
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// New token stored, session extended, old token revoked
    Rotated,
    /// New token stored but a concurrent rotation had already revoked the old one
    OldTokenAlreadyRevoked,
    /// Session was revoked or expired in the meantime; nothing was written
    SessionNotLive,
}

#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Crea una sesión junto con su primer token de refresco
    async fn create_session(&self, session: Session, token: RefreshToken) -> SessionRepositoryResult<()>;

    /// Obtiene una sesión por ID
    async fn find_session(&self, id: &str) -> SessionRepositoryResult<Option<Session>>;

    /// Obtiene un token de refresco por el hash del token
    async fn find_refresh_token(&self, token_hash: &str) -> SessionRepositoryResult<Option<RefreshToken>>;

    /// Extiende la sesión, guarda el nuevo token y revoca el anterior
    async fn rotate_refresh_token(&self, rotation: TokenRotation) -> SessionRepositoryResult<RotationOutcome>;

    /// Revoca un token de refresco concreto
    async fn revoke_refresh_token(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> SessionRepositoryResult<bool>;

    /// Revoca una sesión y todos sus tokens
    async fn revoke_session(&self, session_id: &str, reason: &str, at: DateTime<Utc>) -> SessionRepositoryResult<bool>;

    /// Revoca todas las sesiones de un usuario
    async fn revoke_all_user_sessions(&self, user_id: &str, reason: &str, at: DateTime<Utc>) -> SessionRepositoryResult<u64>;

    /// Indica si la sesión conserva algún token de refresco vivo
    async fn has_live_refresh_token(&self, session_id: &str, at: DateTime<Utc>) -> SessionRepositoryResult<bool>;

    /// Sesiones vivas de un usuario, la más reciente primero
    async fn get_live_sessions_by_user_id(&self, user_id: &str, at: DateTime<Utc>) -> SessionRepositoryResult<Vec<Session>>;

    /// Elimina tokens expirados o revocados antes de `dead_before`.
    ///
    /// Expired tokens get the same grace period as revoked ones so a late replay
    /// is still recognised.
    async fn delete_stale_refresh_tokens(&self, dead_before: DateTime<Utc>) -> SessionRepositoryResult<u64>;

    /// Elimina sesiones revocadas o expiradas antes de `dead_before`
    async fn delete_dead_sessions(&self, dead_before: DateTime<Utc>) -> SessionRepositoryResult<u64>;
}
