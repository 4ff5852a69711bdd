use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use crate::domain::entities::device::DeviceType;
use crate::domain::entities::refresh_token::RefreshToken;
use crate::domain::entities::session::Session;
use crate::domain::repositories::session_repository::{
    RotationOutcome, SessionRepository, SessionRepositoryError, SessionRepositoryResult, TokenRotation,
};
use crate::application::ports::auth_ports::SessionStoragePort;
use crate::common::errors::DomainError;

const SESSION_COLUMNS: &str = r#"
    id, user_id, fingerprint, device_id, user_agent, device_type, browser, os,
    ip_address, trusted, created_at, last_active_at, expires_at, revoked_at, revoked_reason
"#;

const TOKEN_COLUMNS: &str = r#"
    id, token_hash, user_id, session_id, issued_at, expires_at, revoked, revoked_at,
    revoked_reason, last_used_at, device_id, ip_address, user_agent
"#;

pub struct SessionPgRepository {
    pool: Arc<PgPool>,
}

impl SessionPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    // Método auxiliar para mapear errores SQL a errores de dominio
    fn map_sqlx_error(err: sqlx::Error) -> SessionRepositoryError {
        match err {
            sqlx::Error::RowNotFound => {
                SessionRepositoryError::NotFound("Sesión no encontrada".to_string())
            },
            sqlx::Error::PoolTimedOut => {
                SessionRepositoryError::Timeout("Tiempo de espera agotado al obtener conexión".to_string())
            },
            _ => SessionRepositoryError::DatabaseError(
                format!("Error de base de datos: {}", err)
            ),
        }
    }

    fn session_from_row(row: &PgRow) -> Session {
        let device_type: String = row.get("device_type");
        Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            fingerprint: row.get("fingerprint"),
            device_id: row.get("device_id"),
            user_agent: row.get("user_agent"),
            device_type: device_type.parse().unwrap_or(DeviceType::Unknown),
            browser: row.get("browser"),
            os: row.get("os"),
            ip_address: row.get("ip_address"),
            trusted: row.get("trusted"),
            created_at: row.get("created_at"),
            last_active_at: row.get("last_active_at"),
            expires_at: row.get("expires_at"),
            revoked_at: row.get("revoked_at"),
            revoked_reason: row.get("revoked_reason"),
        }
    }

    fn token_from_row(row: &PgRow) -> RefreshToken {
        RefreshToken {
            id: row.get("id"),
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            session_id: row.get("session_id"),
            issued_at: row.get("issued_at"),
            expires_at: row.get("expires_at"),
            revoked: row.get("revoked"),
            revoked_at: row.get("revoked_at"),
            revoked_reason: row.get("revoked_reason"),
            last_used_at: row.get("last_used_at"),
            device_id: row.get("device_id"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        }
    }

    async fn insert_token<'e, E>(executor: E, token: &RefreshToken) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO auth.refresh_tokens (
                id, token_hash, user_id, session_id, issued_at, expires_at,
                revoked, revoked_at, revoked_reason, last_used_at,
                device_id, ip_address, user_agent
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            )
            "#
        )
        .bind(&token.id)
        .bind(&token.token_hash)
        .bind(&token.user_id)
        .bind(&token.session_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.revoked_at)
        .bind(&token.revoked_reason)
        .bind(token.last_used_at)
        .bind(&token.device_id)
        .bind(&token.ip_address)
        .bind(&token.user_agent)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionRepository for SessionPgRepository {
    /// Crea una sesión junto con su primer token de refresco
    async fn create_session(&self, session: Session, token: RefreshToken) -> SessionRepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(Self::map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO auth.sessions (
                id, user_id, fingerprint, device_id, user_agent, device_type, browser, os,
                ip_address, trusted, created_at, last_active_at, expires_at, revoked_at, revoked_reason
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
            )
            "#
        )
        .bind(session.id())
        .bind(session.user_id())
        .bind(&session.fingerprint)
        .bind(&session.device_id)
        .bind(&session.user_agent)
        .bind(session.device_type.as_str())
        .bind(&session.browser)
        .bind(&session.os)
        .bind(&session.ip_address)
        .bind(session.trusted)
        .bind(session.created_at())
        .bind(session.last_active_at)
        .bind(session.expires_at())
        .bind(session.revoked_at)
        .bind(&session.revoked_reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        Self::insert_token(&mut *tx, &token)
            .await
            .map_err(Self::map_sqlx_error)?;

        tx.commit().await.map_err(Self::map_sqlx_error)?;
        Ok(())
    }

    /// Obtiene una sesión por ID
    async fn find_session(&self, id: &str) -> SessionRepositoryResult<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM auth.sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(row.as_ref().map(Self::session_from_row))
    }

    /// Obtiene un token de refresco por el hash del token
    async fn find_refresh_token(&self, token_hash: &str) -> SessionRepositoryResult<Option<RefreshToken>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM auth.refresh_tokens WHERE token_hash = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(row.as_ref().map(Self::token_from_row))
    }

    /// Extiende la sesión, guarda el nuevo token y revoca el anterior.
    ///
    /// The new token is inserted before the old one is revoked, all in one
    /// transaction. A concurrent rotation of the same token finds the old one
    /// already revoked; both rotations keep their new token.
    async fn rotate_refresh_token(&self, rotation: TokenRotation) -> SessionRepositoryResult<RotationOutcome> {
        let mut tx = self.pool.begin().await.map_err(Self::map_sqlx_error)?;

        let extended = sqlx::query(
            r#"
            UPDATE auth.sessions
            SET expires_at = $2, last_active_at = $3
            WHERE id = $1 AND revoked_at IS NULL AND expires_at > $3
            "#
        )
        .bind(&rotation.session_id)
        .bind(rotation.session_expires_at)
        .bind(rotation.at)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        if extended.rows_affected() == 0 {
            tx.rollback().await.map_err(Self::map_sqlx_error)?;
            return Ok(RotationOutcome::SessionNotLive);
        }

        Self::insert_token(&mut *tx, &rotation.new_token)
            .await
            .map_err(Self::map_sqlx_error)?;

        let revoked = sqlx::query(
            r#"
            UPDATE auth.refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3, last_used_at = $2
            WHERE id = $1 AND revoked = FALSE
            "#
        )
        .bind(&rotation.old_token_id)
        .bind(rotation.at)
        .bind(&rotation.reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        tx.commit().await.map_err(Self::map_sqlx_error)?;

        if revoked.rows_affected() == 0 {
            Ok(RotationOutcome::OldTokenAlreadyRevoked)
        } else {
            Ok(RotationOutcome::Rotated)
        }
    }

    /// Revoca un token de refresco concreto
    async fn revoke_refresh_token(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> SessionRepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth.refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3
            WHERE id = $1 AND revoked = FALSE
            "#
        )
        .bind(token_id)
        .bind(at)
        .bind(reason)
        .execute(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoca una sesión y todos sus tokens
    async fn revoke_session(&self, session_id: &str, reason: &str, at: DateTime<Utc>) -> SessionRepositoryResult<bool> {
        let mut tx = self.pool.begin().await.map_err(Self::map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE auth.sessions
            SET revoked_at = $2, revoked_reason = $3
            WHERE id = $1 AND revoked_at IS NULL
            "#
        )
        .bind(session_id)
        .bind(at)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        sqlx::query(
            r#"
            UPDATE auth.refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3
            WHERE session_id = $1 AND revoked = FALSE
            "#
        )
        .bind(session_id)
        .bind(at)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        tx.commit().await.map_err(Self::map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoca todas las sesiones de un usuario
    async fn revoke_all_user_sessions(&self, user_id: &str, reason: &str, at: DateTime<Utc>) -> SessionRepositoryResult<u64> {
        let mut tx = self.pool.begin().await.map_err(Self::map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE auth.sessions
            SET revoked_at = $2, revoked_reason = $3
            WHERE user_id = $1 AND revoked_at IS NULL
            "#
        )
        .bind(user_id)
        .bind(at)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        sqlx::query(
            r#"
            UPDATE auth.refresh_tokens
            SET revoked = TRUE, revoked_at = $2, revoked_reason = $3
            WHERE user_id = $1 AND revoked = FALSE
            "#
        )
        .bind(user_id)
        .bind(at)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_sqlx_error)?;

        tx.commit().await.map_err(Self::map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    /// Indica si la sesión conserva algún token de refresco vivo
    async fn has_live_refresh_token(&self, session_id: &str, at: DateTime<Utc>) -> SessionRepositoryResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM auth.refresh_tokens
                WHERE session_id = $1 AND revoked = FALSE AND expires_at > $2
            )
            "#
        )
        .bind(session_id)
        .bind(at)
        .fetch_one(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)
    }

    /// Sesiones vivas de un usuario, la más reciente primero
    async fn get_live_sessions_by_user_id(&self, user_id: &str, at: DateTime<Utc>) -> SessionRepositoryResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM auth.sessions
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2
            ORDER BY last_active_at DESC
            "#,
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(at)
        .fetch_all(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(rows.iter().map(Self::session_from_row).collect())
    }

    /// Elimina tokens expirados o revocados antes de `dead_before`
    async fn delete_stale_refresh_tokens(&self, dead_before: DateTime<Utc>) -> SessionRepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM auth.refresh_tokens
            WHERE expires_at < $1
               OR (revoked = TRUE AND revoked_at < $1)
            "#
        )
        .bind(dead_before)
        .execute(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    /// Elimina sesiones revocadas o expiradas antes de `dead_before`
    async fn delete_dead_sessions(&self, dead_before: DateTime<Utc>) -> SessionRepositoryResult<u64> {
        // refresh_tokens rows go with ON DELETE CASCADE
        let result = sqlx::query(
            r#"
            DELETE FROM auth.sessions
            WHERE revoked_at < $1 OR expires_at < $1
            "#
        )
        .bind(dead_before)
        .execute(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

// Implementación del puerto de almacenamiento para la capa de aplicación
#[async_trait]
impl SessionStoragePort for SessionPgRepository {
    async fn create_session(&self, session: Session, token: RefreshToken) -> Result<(), DomainError> {
        SessionRepository::create_session(self, session, token).await.map_err(DomainError::from)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, DomainError> {
        SessionRepository::find_session(self, session_id).await.map_err(DomainError::from)
    }

    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, DomainError> {
        SessionRepository::find_refresh_token(self, token_hash).await.map_err(DomainError::from)
    }

    async fn rotate_refresh_token(&self, rotation: TokenRotation) -> Result<RotationOutcome, DomainError> {
        SessionRepository::rotate_refresh_token(self, rotation).await.map_err(DomainError::from)
    }

    async fn revoke_refresh_token(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, DomainError> {
        SessionRepository::revoke_refresh_token(self, token_id, reason, at)
            .await
            .map_err(DomainError::from)
    }

    async fn revoke_session(&self, session_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, DomainError> {
        SessionRepository::revoke_session(self, session_id, reason, at)
            .await
            .map_err(DomainError::from)
    }

    async fn revoke_all_user_sessions(&self, user_id: &str, reason: &str, at: DateTime<Utc>) -> Result<u64, DomainError> {
        SessionRepository::revoke_all_user_sessions(self, user_id, reason, at)
            .await
            .map_err(DomainError::from)
    }

    async fn has_live_refresh_token(&self, session_id: &str, at: DateTime<Utc>) -> Result<bool, DomainError> {
        SessionRepository::has_live_refresh_token(self, session_id, at)
            .await
            .map_err(DomainError::from)
    }

    async fn get_live_sessions(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<Session>, DomainError> {
        SessionRepository::get_live_sessions_by_user_id(self, user_id, at)
            .await
            .map_err(DomainError::from)
    }

    async fn delete_stale_refresh_tokens(&self, dead_before: DateTime<Utc>) -> Result<u64, DomainError> {
        SessionRepository::delete_stale_refresh_tokens(self, dead_before)
            .await
            .map_err(DomainError::from)
    }

    async fn delete_dead_sessions(&self, dead_before: DateTime<Utc>) -> Result<u64, DomainError> {
        SessionRepository::delete_dead_sessions(self, dead_before)
            .await
            .map_err(DomainError::from)
    }
}
