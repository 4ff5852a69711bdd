pub mod session_manager;
pub mod revocation_cache;
pub mod validation_pipeline;
pub mod auth_application_service;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod session_manager_test;

// Re-exportar para facilitar acceso
pub use session_manager::{RevocationTarget, SessionManager, SessionSettings};
pub use revocation_cache::RevocationCache;
pub use validation_pipeline::{LegacyTokenPolicy, TokenCarriers, ValidationPipeline};
pub use auth_application_service::AuthApplicationService;
