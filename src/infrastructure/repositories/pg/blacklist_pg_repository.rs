use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use crate::domain::entities::blacklist_entry::BlacklistEntry;
use crate::domain::repositories::blacklist_repository::{
    BlacklistRepository, BlacklistRepositoryError, BlacklistRepositoryResult,
};
use crate::application::ports::auth_ports::BlacklistStoragePort;
use crate::common::errors::DomainError;

pub struct BlacklistPgRepository {
    pool: Arc<PgPool>,
}

impl BlacklistPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn map_sqlx_error(err: sqlx::Error) -> BlacklistRepositoryError {
        match err {
            sqlx::Error::PoolTimedOut => {
                BlacklistRepositoryError::Timeout("Tiempo de espera agotado al obtener conexión".to_string())
            },
            _ => BlacklistRepositoryError::DatabaseError(
                format!("Error de base de datos: {}", err)
            ),
        }
    }

    fn entry_from_row(row: &PgRow) -> BlacklistEntry {
        BlacklistEntry {
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            reason: row.get("reason"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl BlacklistRepository for BlacklistPgRepository {
    /// Inserta una entrada; si ya existe conserva la expiración más lejana
    async fn add_entry(&self, entry: BlacklistEntry) -> BlacklistRepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth.token_blacklist (token_hash, user_id, reason, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token_hash) DO UPDATE
            SET expires_at = GREATEST(auth.token_blacklist.expires_at, EXCLUDED.expires_at)
            "#
        )
        .bind(&entry.token_hash)
        .bind(&entry.user_id)
        .bind(&entry.reason)
        .bind(entry.expires_at)
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(())
    }

    async fn find_active_entry(&self, token_hash: &str, at: DateTime<Utc>) -> BlacklistRepositoryResult<Option<BlacklistEntry>> {
        let row = sqlx::query(
            r#"
            SELECT token_hash, user_id, reason, expires_at, created_at
            FROM auth.token_blacklist
            WHERE token_hash = $1 AND expires_at > $2
            "#
        )
        .bind(token_hash)
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(row.as_ref().map(Self::entry_from_row))
    }

    async fn list_active_entries(&self, at: DateTime<Utc>) -> BlacklistRepositoryResult<Vec<BlacklistEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT token_hash, user_id, reason, expires_at, created_at
            FROM auth.token_blacklist
            WHERE expires_at > $1
            "#
        )
        .bind(at)
        .fetch_all(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(rows.iter().map(Self::entry_from_row).collect())
    }

    async fn delete_expired_entries(&self, at: DateTime<Utc>) -> BlacklistRepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM auth.token_blacklist WHERE expires_at <= $1")
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(Self::map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BlacklistStoragePort for BlacklistPgRepository {
    async fn add_entry(&self, entry: BlacklistEntry) -> Result<(), DomainError> {
        BlacklistRepository::add_entry(self, entry).await.map_err(DomainError::from)
    }

    async fn find_active_entry(&self, token_hash: &str, at: DateTime<Utc>) -> Result<Option<BlacklistEntry>, DomainError> {
        BlacklistRepository::find_active_entry(self, token_hash, at)
            .await
            .map_err(DomainError::from)
    }

    async fn list_active_entries(&self, at: DateTime<Utc>) -> Result<Vec<BlacklistEntry>, DomainError> {
        BlacklistRepository::list_active_entries(self, at).await.map_err(DomainError::from)
    }

    async fn delete_expired_entries(&self, at: DateTime<Utc>) -> Result<u64, DomainError> {
        BlacklistRepository::delete_expired_entries(self, at).await.map_err(DomainError::from)
    }
}
