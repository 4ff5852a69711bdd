use std::sync::Arc;
use chrono::Duration;
use sqlx::PgPool;

use crate::application::ports::auth_ports::{
    BlacklistStoragePort, SessionEventPort, SessionStoragePort, UserStoragePort,
};
use crate::application::services::auth_application_service::AuthApplicationService;
use crate::application::services::revocation_cache::RevocationCache;
use crate::application::services::session_manager::{SessionManager, SessionSettings};
use crate::application::services::validation_pipeline::{LegacyTokenPolicy, ValidationPipeline};
use crate::common::config::AuthConfig;
use crate::common::di::AuthServices;
use crate::domain::services::auth_error::AuthError;
use crate::domain::services::token_codec::TokenCodec;
use crate::infrastructure::repositories::{BlacklistPgRepository, SessionPgRepository, UserPgRepository};

/// Adaptadores de almacenamiento sobre los que se construyen los servicios
pub struct AuthStorage {
    pub sessions: Arc<dyn SessionStoragePort>,
    pub blacklist: Arc<dyn BlacklistStoragePort>,
    pub users: Arc<dyn UserStoragePort>,
}

impl AuthStorage {
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            sessions: Arc::new(SessionPgRepository::new(pool.clone())),
            blacklist: Arc::new(BlacklistPgRepository::new(pool.clone())),
            users: Arc::new(UserPgRepository::new(pool)),
        }
    }
}

/// Comprueba lifetimes y secretos y construye el códec.
///
/// Needs no storage, so the process can refuse to start before it opens a
/// database connection.
pub fn create_token_codec(config: &AuthConfig) -> Result<Arc<TokenCodec>, AuthError> {
    config.validate()?;
    Ok(Arc::new(TokenCodec::new(
        &config.access_token_secret,
        &config.refresh_token_secret,
        &config.issuer,
        &config.audience,
    )?))
}

/// Cablea los servicios de autenticación sobre PostgreSQL
pub async fn create_auth_services(
    config: &AuthConfig,
    token_codec: Arc<TokenCodec>,
    pool: Arc<PgPool>,
    events: Arc<dyn SessionEventPort>,
) -> Result<AuthServices, AuthError> {
    build_auth_services(config, token_codec, AuthStorage::postgres(pool), events).await
}

/// Fails with `InsecureConfiguration` before touching storage when a lifetime is unusable.
pub async fn build_auth_services(
    config: &AuthConfig,
    token_codec: Arc<TokenCodec>,
    storage: AuthStorage,
    events: Arc<dyn SessionEventPort>,
) -> Result<AuthServices, AuthError> {
    let settings = SessionSettings::from_config(config)?;

    let session_manager = Arc::new(SessionManager::new(
        storage.sessions,
        storage.users.clone(),
        token_codec.clone(),
        events,
        settings,
    ));

    // Warm-up failures are logged inside; the cache starts empty and falls back to storage
    let revocation_cache = Arc::new(
        RevocationCache::new(
            storage.blacklist,
            token_codec.clone(),
            Duration::seconds(config.blacklist_default_ttl_secs),
        )
        .await,
    );

    let validation_pipeline = Arc::new(ValidationPipeline::new(
        token_codec.clone(),
        revocation_cache.clone(),
        session_manager.clone(),
        storage.users,
        LegacyTokenPolicy::from_flag(config.allow_legacy_tokens),
    ));

    let auth_application_service = Arc::new(AuthApplicationService::new(
        session_manager.clone(),
        revocation_cache.clone(),
    ));

    Ok(AuthServices {
        token_codec,
        session_manager,
        revocation_cache,
        validation_pipeline,
        auth_application_service,
    })
}
