use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::dtos::session_dto::SessionCreatedEvent;
use crate::domain::entities::blacklist_entry::BlacklistEntry;
use crate::domain::entities::refresh_token::RefreshToken;
use crate::domain::entities::session::Session;
use crate::domain::entities::user::User;
use crate::domain::repositories::session_repository::{RotationOutcome, TokenRotation};
use crate::common::errors::DomainError;

/// Lectura de usuarios; las cuentas pertenecen a otro módulo
#[cfg_attr(any(test, feature = "test_utils"), mockall::automock)]
#[async_trait]
pub trait UserStoragePort: Send + Sync + 'static {
    /// Obtiene un usuario por ID
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, DomainError>;
}

#[async_trait]
pub trait SessionStoragePort: Send + Sync + 'static {
    /// Crea una sesión junto con su primer token de refresco
    async fn create_session(&self, session: Session, token: RefreshToken) -> Result<(), DomainError>;

    /// Obtiene una sesión por ID
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, DomainError>;

    /// Obtiene un token de refresco por el hash del token
    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, DomainError>;

    /// Extiende la sesión, guarda el nuevo token y revoca el anterior en una sola unidad
    async fn rotate_refresh_token(&self, rotation: TokenRotation) -> Result<RotationOutcome, DomainError>;

    /// Revoca un token de refresco concreto
    async fn revoke_refresh_token(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, DomainError>;

    /// Revoca una sesión y todos sus tokens
    async fn revoke_session(&self, session_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, DomainError>;

    /// Revoca todas las sesiones de un usuario
    async fn revoke_all_user_sessions(&self, user_id: &str, reason: &str, at: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Indica si la sesión conserva algún token de refresco vivo
    async fn has_live_refresh_token(&self, session_id: &str, at: DateTime<Utc>) -> Result<bool, DomainError>;

    /// Sesiones vivas de un usuario
    async fn get_live_sessions(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<Session>, DomainError>;

    /// Elimina tokens expirados o revocados antes de `dead_before`
    async fn delete_stale_refresh_tokens(&self, dead_before: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Elimina sesiones revocadas o expiradas antes de `dead_before`
    async fn delete_dead_sessions(&self, dead_before: DateTime<Utc>) -> Result<u64, DomainError>;
}

#[async_trait]
pub trait BlacklistStoragePort: Send + Sync + 'static {
    async fn add_entry(&self, entry: BlacklistEntry) -> Result<(), DomainError>;

    async fn find_active_entry(&self, token_hash: &str, at: DateTime<Utc>) -> Result<Option<BlacklistEntry>, DomainError>;

    async fn list_active_entries(&self, at: DateTime<Utc>) -> Result<Vec<BlacklistEntry>, DomainError>;

    async fn delete_expired_entries(&self, at: DateTime<Utc>) -> Result<u64, DomainError>;
}

/// Observador de sesiones nuevas. Nunca debe bloquear la emisión de tokens.
#[cfg_attr(any(test, feature = "test_utils"), mockall::automock)]
#[async_trait]
pub trait SessionEventPort: Send + Sync + 'static {
    async fn session_created(&self, event: SessionCreatedEvent);
}
