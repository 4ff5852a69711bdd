use crate::common::errors::{DomainError, ErrorKind};

/**
 * Authentication-specific error types.
 *
 * Every rejection in the token lifecycle maps to exactly one variant so callers
 * can tell an expired access token (refresh and retry) from everything else
 * (log in again).
 */
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token was found in any accepted carrier
    #[error("Token no proporcionado")]
    TokenNotProvided,

    /// Malformed token, bad signature, wrong algorithm, issuer or audience
    #[error("Token inválido: {0}")]
    InvalidToken(String),

    /// Returned when a token has passed its expiration time
    #[error("Token expirado")]
    TokenExpired,

    /// Token was explicitly revoked (blacklisted or already rotated)
    #[error("Token revocado")]
    TokenRevoked,

    /// Signature checks out but no matching record exists
    #[error("Token no reconocido")]
    TokenNotRecognized,

    #[error("Sesión inválida: {0}")]
    SessionInvalid(String),

    #[error("Usuario no encontrado")]
    UserNotFound,

    #[error("Acceso denegado: {0}")]
    AccessDenied(String),

    /// Raised at startup for weak secrets or unusable lifetimes; the process must not serve requests
    #[error("Configuración insegura: {0}")]
    InsecureConfiguration(String),

    #[error("Error interno: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code, used in logs
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::TokenNotProvided => "TOKEN_NOT_PROVIDED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::TokenNotRecognized => "TOKEN_NOT_RECOGNIZED",
            AuthError::SessionInvalid(_) => "SESSION_INVALID",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::AccessDenied(_) => "ACCESS_DENIED",
            AuthError::InsecureConfiguration(_) => "INSECURE_CONFIGURATION",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AuthError> for DomainError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccessDenied(msg) => DomainError::access_denied("Auth", msg),
            AuthError::InsecureConfiguration(msg) | AuthError::Internal(msg) => {
                DomainError::internal_error("Auth", msg)
            }
            other => DomainError::new(ErrorKind::Unauthorized, "Auth", other.to_string()),
        }
    }
}

/// Fallos de almacenamiento dentro del flujo de autenticación
impl From<DomainError> for AuthError {
    fn from(err: DomainError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
