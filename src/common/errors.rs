use std::fmt::{Display, Formatter, Result as FmtResult};
use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use thiserror::Error;

use crate::common::config::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::domain::services::auth_error::AuthError;

/// Tipos de errores comunes en toda la aplicación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entidad no encontrada
    NotFound,
    /// Credenciales ausentes o rechazadas
    Unauthorized,
    /// Error de acceso o permisos
    AccessDenied,
    /// Tiempo de espera agotado
    Timeout,
    /// Error interno del sistema
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ErrorKind::NotFound => write!(f, "Not Found"),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::AccessDenied => write!(f, "Access Denied"),
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::InternalError => write!(f, "Internal Error"),
        }
    }
}

/// Error base de dominio que proporciona contexto detallado
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct DomainError {
    /// Tipo de error
    pub kind: ErrorKind,
    /// Tipo de entidad afectada (ej: "Session", "RefreshToken")
    pub entity_type: &'static str,
    /// Identificador de la entidad si está disponible
    pub entity_id: Option<String>,
    /// Mensaje descriptivo del error
    pub message: String,
    /// Error fuente (opcional)
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl DomainError {
    /// Crea un nuevo error de dominio
    pub fn new<S: Into<String>>(
        kind: ErrorKind,
        entity_type: &'static str,
        message: S,
    ) -> Self {
        Self {
            kind,
            entity_type,
            entity_id: None,
            message: message.into(),
            source: None,
        }
    }

    /// Crea un error de entidad no encontrada
    pub fn not_found<S: Into<String>>(entity_type: &'static str, entity_id: S) -> Self {
        let id = entity_id.into();
        Self {
            kind: ErrorKind::NotFound,
            entity_type,
            entity_id: Some(id.clone()),
            message: format!("{} not found: {}", entity_type, id),
            source: None,
        }
    }

    /// Crea un error de tiempo agotado
    pub fn timeout<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            entity_type,
            entity_id: None,
            message: message.into(),
            source: None,
        }
    }

    /// Crea un error interno
    pub fn internal_error<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self {
            kind: ErrorKind::InternalError,
            entity_type,
            entity_id: None,
            message: message.into(),
            source: None,
        }
    }

    /// Crea un error de acceso denegado
    pub fn access_denied<S: Into<String>>(entity_type: &'static str, message: S) -> Self {
        Self {
            kind: ErrorKind::AccessDenied,
            entity_type,
            entity_id: None,
            message: message.into(),
            source: None,
        }
    }

    /// Establece el error fuente
    pub fn with_source<E: StdError + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Error devuelto por los handlers HTTP.
///
/// The body is always `{"error": ..., "code": ...}`. Auth rejections other than
/// access-token expiry collapse into a generic `UNAUTHORIZED` body; the precise
/// cause only reaches the logs.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub clear_auth_cookies: bool,
}

impl AppError {
    pub fn new<S: Into<String>>(status: StatusCode, code: &'static str, message: S) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            clear_auth_cookies: false,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "No autorizado")
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Expires the auth cookies on the way out
    pub fn with_cleared_cookies(mut self) -> Self {
        self.clear_auth_cookies = true;
        self
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired => {
                tracing::debug!("Rejected request: access token expired");
                Self::new(StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", "Token expirado")
            }
            AuthError::AccessDenied(msg) => {
                tracing::warn!("Access denied: {}", msg);
                Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", "Acceso denegado")
            }
            AuthError::InsecureConfiguration(msg) | AuthError::Internal(msg) => {
                tracing::error!("Auth subsystem failure: {}", msg);
                Self::internal_error("Error interno del servidor")
            }
            other => {
                tracing::warn!(kind = other.code(), "Rejected request: {}", other);
                Self::unauthorized()
            }
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err.kind {
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.message),
            ErrorKind::Unauthorized => Self::unauthorized(),
            ErrorKind::AccessDenied => Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", err.message),
            ErrorKind::Timeout | ErrorKind::InternalError => {
                tracing::error!("Internal error: {}", err);
                Self::internal_error("Error interno del servidor")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
        }));

        if self.clear_auth_cookies {
            (self.status, expire_auth_cookies(CookieJar::new()), body).into_response()
        } else {
            (self.status, body).into_response()
        }
    }
}

/// Adds expired `access_token`/`refresh_token` cookies to the jar.
///
/// `CookieJar::remove` only emits a removal for cookies the request carried,
/// so the expired cookies are added explicitly.
pub fn expire_auth_cookies(jar: CookieJar) -> CookieJar {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| {
            let mut cookie = Cookie::build((name, "")).path("/").http_only(true).build();
            cookie.make_removal();
            jar.add(cookie)
        })
}
