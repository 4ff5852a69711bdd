use sqlx::{postgres::PgPoolOptions, PgPool};
use anyhow::Result;
use std::time::Duration;
use crate::common::config::AppConfig;

// Each statement runs on its own; all are idempotent
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS auth",
    // Owned by the accounts module; created here only for fresh installations
    r#"
    CREATE TABLE IF NOT EXISTS auth.users (
        id VARCHAR(36) PRIMARY KEY,
        role VARCHAR(32) NOT NULL,
        email VARCHAR(255) UNIQUE,
        phone VARCHAR(32) UNIQUE,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth.sessions (
        id VARCHAR(36) PRIMARY KEY,
        user_id VARCHAR(36) NOT NULL,
        fingerprint VARCHAR(64) NOT NULL,
        device_id VARCHAR(255),
        user_agent TEXT,
        device_type VARCHAR(16) NOT NULL DEFAULT 'unknown',
        browser VARCHAR(64),
        os VARCHAR(64),
        ip_address VARCHAR(45),
        trusted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        last_active_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        revoked_at TIMESTAMPTZ,
        revoked_reason VARCHAR(64)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth.refresh_tokens (
        id VARCHAR(36) PRIMARY KEY,
        token_hash VARCHAR(64) NOT NULL UNIQUE,
        user_id VARCHAR(36) NOT NULL,
        session_id VARCHAR(36) NOT NULL REFERENCES auth.sessions(id) ON DELETE CASCADE,
        issued_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE,
        revoked_at TIMESTAMPTZ,
        revoked_reason VARCHAR(64),
        last_used_at TIMESTAMPTZ,
        device_id VARCHAR(255),
        ip_address VARCHAR(45),
        user_agent TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth.token_blacklist (
        token_hash VARCHAR(64) PRIMARY KEY,
        user_id VARCHAR(36) NOT NULL,
        reason VARCHAR(64) NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON auth.sessions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON auth.sessions(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_session_id ON auth.refresh_tokens(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires_at ON auth.refresh_tokens(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_token_blacklist_expires_at ON auth.token_blacklist(expires_at)",
];

pub async fn create_database_pool(config: &AppConfig) -> Result<PgPool> {
    tracing::info!("Inicializando conexión a PostgreSQL con URL: {}",
                  redact_credentials(&config.database.connection_string));

    let mut attempt = 0;
    const MAX_ATTEMPTS: usize = 3;

    while attempt < MAX_ATTEMPTS {
        attempt += 1;
        tracing::info!("Intento de conexión a PostgreSQL #{}", attempt);

        // Crear el pool de conexiones con las opciones de configuración
        match PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.database.max_lifetime_secs))
            .connect(&config.database.connection_string)
            .await {
                Ok(pool) => {
                    match ensure_schema(&pool).await {
                        Ok(()) => {
                            tracing::info!("Conexión a PostgreSQL establecida correctamente");
                            return Ok(pool);
                        },
                        Err(e) => {
                            tracing::error!("Error al crear tablas: {}", e);
                            if attempt >= MAX_ATTEMPTS {
                                return Err(anyhow::anyhow!("Error en la conexión a PostgreSQL: {}", e));
                            }
                        }
                    }
                },
                Err(e) => {
                    tracing::error!("Error al conectar a PostgreSQL: {}", e);
                    if attempt >= MAX_ATTEMPTS {
                        return Err(anyhow::anyhow!("Error en la conexión a PostgreSQL: {}", e));
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
    }

    Err(anyhow::anyhow!("No se pudo establecer la conexión a PostgreSQL después de {} intentos", MAX_ATTEMPTS))
}

/// Crea el esquema `auth` y sus tablas si no existen
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn redact_credentials(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}[user]:[pass]{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}
