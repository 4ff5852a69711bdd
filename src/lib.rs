// Exportar los módulos principales del proyecto
pub mod common;
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod interfaces;

// Re-exportaciones públicas comunes
pub use application::services::{
    AuthApplicationService, RevocationCache, RevocationTarget, SessionManager, ValidationPipeline,
};
pub use domain::services::auth_error::AuthError;
pub use domain::services::token_codec::{TokenCodec, TokenKind};
pub use infrastructure::services::expiry_sweeper::ExpirySweeper;
