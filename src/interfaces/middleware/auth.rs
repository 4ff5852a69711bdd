use std::sync::Arc;
use axum::{
    extract::{State, Request},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::application::dtos::session_dto::AuthenticatedPrincipal;
use crate::application::services::validation_pipeline::TokenCarriers;
use crate::common::config::ACCESS_TOKEN_COOKIE;
use crate::common::di::AppState;
use crate::common::errors::AppError;
use crate::domain::entities::device::DeviceInfo;

// Extensión para almacenar datos del usuario autenticado
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub principal: AuthenticatedPrincipal,
    /// Token de acceso con el que se autenticó la petición
    pub access_token: String,
}

/// Extrae el token del header `Authorization: Bearer ...`
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Datos del dispositivo tal y como llegan en la petición
pub fn device_info_from_headers(headers: &HeaderMap) -> DeviceInfo {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    // First hop of x-forwarded-for is the client
    let ip_address = header_value("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_value("x-real-ip"));

    DeviceInfo::new(
        header_value("x-device-id"),
        header_value(header::USER_AGENT.as_str()),
        ip_address,
    )
}

// Middleware de autenticación: cookie primero, Bearer como alternativa
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let carriers = TokenCarriers {
        cookie: jar.get(ACCESS_TOKEN_COOKIE).map(|cookie| cookie.value().to_string()),
        bearer: bearer_token(request.headers()),
    };

    let principal = state.auth.validation_pipeline.authenticate(&carriers).await?;

    // The pipeline already rejected requests without a token
    let access_token = carriers.select().unwrap_or_default().to_string();

    request.extensions_mut().insert(CurrentUser { principal, access_token });
    Ok(next.run(request).await)
}
