use std::sync::Arc;
use sqlx::PgPool;

use crate::application::services::auth_application_service::AuthApplicationService;
use crate::application::services::revocation_cache::RevocationCache;
use crate::application::services::session_manager::SessionManager;
use crate::application::services::validation_pipeline::ValidationPipeline;
use crate::common::config::CookieConfig;
use crate::domain::services::token_codec::TokenCodec;

/// Servicios de autenticación ya cableados
#[derive(Clone)]
pub struct AuthServices {
    pub token_codec: Arc<TokenCodec>,
    pub session_manager: Arc<SessionManager>,
    pub revocation_cache: Arc<RevocationCache>,
    pub validation_pipeline: Arc<ValidationPipeline>,
    pub auth_application_service: Arc<AuthApplicationService>,
}

/// Estado global de la aplicación para dependency injection
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthServices,
    pub cookies: CookieConfig,
    pub db_pool: Option<Arc<PgPool>>,
}

impl AppState {
    pub fn new(auth: AuthServices, cookies: CookieConfig) -> Self {
        Self {
            auth,
            cookies,
            db_pool: None,
        }
    }

    pub fn with_database(mut self, db_pool: Arc<PgPool>) -> Self {
        self.db_pool = Some(db_pool);
        self
    }
}
