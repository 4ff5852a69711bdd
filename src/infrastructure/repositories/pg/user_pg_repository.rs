use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use crate::domain::entities::user::User;
use crate::application::ports::auth_ports::UserStoragePort;
use crate::common::errors::DomainError;

/// Lectura de `auth.users`; la tabla la gestiona el módulo de cuentas
pub struct UserPgRepository {
    pool: Arc<PgPool>,
}

impl UserPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    // Método auxiliar para mapear errores SQL a errores de dominio
    fn map_sqlx_error(err: sqlx::Error) -> DomainError {
        match err {
            sqlx::Error::PoolTimedOut => DomainError::timeout("User", "Tiempo de espera agotado al obtener conexión"),
            other => DomainError::internal_error("User", format!("Error de base de datos: {}", other))
                .with_source(other),
        }
    }
}

#[async_trait]
impl UserStoragePort for UserPgRepository {
    /// Obtiene un usuario por ID
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, role::TEXT AS role, email, phone, active
            FROM auth.users
            WHERE id = $1
            "#
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(row.map(|row| {
            User::new(
                row.get("id"),
                row.get("role"),
                row.get("email"),
                row.get("phone"),
                row.get("active"),
            )
        }))
    }
}
