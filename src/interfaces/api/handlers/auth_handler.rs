use std::sync::Arc;
use axum::{
    Router,
    routing::{delete, get, post},
    body::Bytes,
    extract::{Extension, Json, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;

use crate::common::config::{CookieConfig, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::common::di::AppState;
use crate::common::errors::{expire_auth_cookies, AppError};
use crate::application::dtos::user_dto::{
    AuthResponseDto, RefreshTokenDto, RevocationCountDto, UserDto,
};
use crate::domain::services::auth_error::AuthError;
use crate::interfaces::middleware::auth::{auth_middleware, device_info_from_headers, CurrentUser};

pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(get_current_user))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", delete(revoke_session))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/refresh", post(refresh_token))
        .merge(protected)
}

fn token_cookie(name: &'static str, value: String, max_age_secs: i64, config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs.max(0)))
        .build()
}

fn with_token_cookies(jar: CookieJar, response: &AuthResponseDto, config: &CookieConfig) -> CookieJar {
    let refresh_max_age = (response.refresh_expires_at - Utc::now()).num_seconds();

    jar.add(token_cookie(ACCESS_TOKEN_COOKIE, response.access_token.clone(), response.expires_in, config))
        .add(token_cookie(REFRESH_TOKEN_COOKIE, response.refresh_token.clone(), refresh_max_age, config))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // Cookie first; non-browser clients send the token in the body
    let presented = match jar.get(REFRESH_TOKEN_COOKIE) {
        Some(cookie) => Some(cookie.value().to_string()),
        None if body.is_empty() => None,
        None => {
            let dto: RefreshTokenDto = serde_json::from_slice(&body)
                .map_err(|e| AppError::bad_request(format!("Cuerpo de petición inválido: {}", e)))?;
            Some(dto.refresh_token)
        }
    };

    let Some(refresh_token) = presented else {
        return Err(AppError::from(AuthError::TokenNotProvided).with_cleared_cookies());
    };

    let device = device_info_from_headers(&headers);
    match state
        .auth
        .auth_application_service
        .refresh_token(&refresh_token, &device)
        .await
    {
        Ok(response) => {
            let jar = with_token_cookies(jar, &response, &state.cookies);
            Ok((jar, Json(response)))
        }
        Err(err @ (AuthError::Internal(_) | AuthError::InsecureConfiguration(_))) => Err(err.into()),
        Err(err) => {
            // Any refresh rejection sends the client back to login
            tracing::info!(kind = err.code(), "Refresh rejected: {}", err);
            Err(AppError::unauthorized().with_cleared_cookies())
        }
    }
}

async fn get_current_user(
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(UserDto::from(current_user.principal)))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let revoked_sessions = state
        .auth
        .auth_application_service
        .logout(&current_user.principal, Some(&current_user.access_token))
        .await?;

    Ok((expire_auth_cookies(jar), Json(RevocationCountDto { revoked_sessions })))
}

async fn logout_all(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let revoked_sessions = state
        .auth
        .auth_application_service
        .logout_all(&current_user.principal, Some(&current_user.access_token))
        .await?;

    Ok((expire_auth_cookies(jar), Json(RevocationCountDto { revoked_sessions })))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state
        .auth
        .auth_application_service
        .list_sessions(&current_user.principal)
        .await?;

    Ok(Json(sessions))
}

async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    match state
        .auth
        .auth_application_service
        .revoke_session(&current_user.principal, &session_id)
        .await
    {
        Ok(()) => {}
        Err(AuthError::SessionInvalid(_)) => {
            return Err(AppError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Sesión no encontrada"));
        }
        Err(err) => return Err(err.into()),
    }

    // Revoking the session in use is a logout
    let jar = if current_user.principal.session_id.as_deref() == Some(session_id.as_str()) {
        expire_auth_cookies(jar)
    } else {
        jar
    };

    Ok((StatusCode::NO_CONTENT, jar))
}
