// Repositorios PostgreSQL
pub mod pg;

// Re-exportar para facilitar acceso
pub use pg::{BlacklistPgRepository, SessionPgRepository, UserPgRepository};
