use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::blacklist_entry::BlacklistEntry;
use crate::common::errors::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum BlacklistRepositoryError {
    #[error("Error de base de datos: {0}")]
    DatabaseError(String),

    #[error("Error de tiempo de espera: {0}")]
    Timeout(String),
}

pub type BlacklistRepositoryResult<T> = Result<T, BlacklistRepositoryError>;

impl From<BlacklistRepositoryError> for DomainError {
    fn from(err: BlacklistRepositoryError) -> Self {
        match err {
            BlacklistRepositoryError::DatabaseError(msg) => {
                DomainError::internal_error("TokenBlacklist", msg)
            },
            BlacklistRepositoryError::Timeout(msg) => {
                DomainError::timeout("TokenBlacklist", msg)
            },
        }
    }
}

#[async_trait]
pub trait BlacklistRepository: Send + Sync + 'static {
    /// Inserta una entrada; si ya existe conserva la expiración más lejana
    async fn add_entry(&self, entry: BlacklistEntry) -> BlacklistRepositoryResult<()>;

    /// Busca una entrada no expirada por hash de token
    async fn find_active_entry(&self, token_hash: &str, at: DateTime<Utc>) -> BlacklistRepositoryResult<Option<BlacklistEntry>>;

    /// Todas las entradas no expiradas
    async fn list_active_entries(&self, at: DateTime<Utc>) -> BlacklistRepositoryResult<Vec<BlacklistEntry>>;

    /// Elimina las entradas expiradas
    async fn delete_expired_entries(&self, at: DateTime<Utc>) -> BlacklistRepositoryResult<u64>;
}
