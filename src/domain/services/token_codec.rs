use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::entities::user::User;
use crate::domain::services::auth_error::AuthError;

/// Longitud mínima aceptada para un secreto de firma
pub const MIN_SECRET_LENGTH: usize = 32;

/// Distinct characters below this are treated as a low-entropy secret
const MIN_DISTINCT_SECRET_CHARS: usize = 10;

const PLACEHOLDER_MARKERS: &[&str] = &[
    "changeme",
    "change-me",
    "change_me",
    "change-in-production",
    "change_in_production",
    "your-secret",
    "your_secret",
    "placeholder",
    "replace-me",
    "example",
];

/// Which key pair a token is signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

fn default_token_use() -> TokenKind {
    TokenKind::Access
}

/**
 * JWT claims carried by both access and refresh tokens.
 *
 * `role` and `sub` are lenient on decode so that a token missing them is
 * reported by the payload-shape check instead of a generic decode failure.
 * Tokens minted before sessions existed carry no `sessionId`.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identifier - contains the user ID
    #[serde(default)]
    pub sub: String,

    /// User role for authorization checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Email or phone of the subject
    #[serde(default, alias = "email", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default = "default_token_use")]
    pub token_use: TokenKind,

    /// JWT unique ID; two tokens issued in the same second still differ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    pub iss: String,
    pub aud: String,

    /// Issued at timestamp (seconds since Unix epoch)
    pub iat: i64,

    /// Expiration timestamp (seconds since Unix epoch)
    pub exp: i64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Datos del usuario que se estampan en un token
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: &'a str,
    pub role: &'a str,
    pub contact: Option<&'a str>,
    pub session_id: Option<&'a str>,
}

impl<'a> TokenSubject<'a> {
    pub fn for_user(user: &'a User, session_id: Option<&'a str>) -> Self {
        Self {
            user_id: user.id(),
            role: user.role(),
            contact: user.contact(),
            session_id,
        }
    }
}

/// Token recién firmado junto con los claims que contiene
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

impl IssuedToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at().unwrap_or_else(Utc::now)
    }
}

/// Result of verifying an access or refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedToken {
    /// Bound to a session that must still be live
    SessionBound { claims: TokenClaims, session_id: String },
    /// Issued without a session; accepted only when legacy tokens are allowed
    Legacy { claims: TokenClaims },
}

impl VerifiedToken {
    pub fn from_claims(claims: TokenClaims) -> Self {
        match claims.session_id.clone().filter(|id| !id.is_empty()) {
            Some(session_id) => VerifiedToken::SessionBound { claims, session_id },
            None => VerifiedToken::Legacy { claims },
        }
    }

    pub fn claims(&self) -> &TokenClaims {
        match self {
            VerifiedToken::SessionBound { claims, .. } | VerifiedToken::Legacy { claims } => claims,
        }
    }

    pub fn into_claims(self) -> TokenClaims {
        match self {
            VerifiedToken::SessionBound { claims, .. } | VerifiedToken::Legacy { claims } => claims,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            VerifiedToken::SessionBound { session_id, .. } => Some(session_id),
            VerifiedToken::Legacy { .. } => None,
        }
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/**
 * Signs and verifies HS256 tokens.
 *
 * Access and refresh tokens use distinct secrets, so one can never be replayed
 * as the other. Verification pins the algorithm, issuer and audience, and
 * applies no clock leeway.
 */
pub struct TokenCodec {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: String,
    audience: String,
}

impl TokenCodec {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, AuthError> {
        validate_secret("access token", access_secret)?;
        validate_secret("refresh token", refresh_secret)?;
        if access_secret == refresh_secret {
            return Err(AuthError::InsecureConfiguration(
                "access and refresh token secrets must differ".to_string(),
            ));
        }

        Ok(Self {
            access: SigningKeys::from_secret(access_secret),
            refresh: SigningKeys::from_secret(refresh_secret),
            issuer: issuer.into(),
            audience: audience.into(),
        })
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }

    pub fn issue(
        &self,
        kind: TokenKind,
        subject: &TokenSubject<'_>,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now().timestamp();

        let claims = TokenClaims {
            sub: subject.user_id.to_string(),
            role: Some(subject.role.to_string()),
            contact: subject.contact.map(str::to_string),
            session_id: subject.session_id.map(str::to_string),
            token_use: kind,
            jti: Some(Uuid::new_v4().to_string()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ttl.num_seconds(),
        };

        tracing::debug!(
            "Issuing {:?} token: sub={}, exp={}",
            kind,
            claims.sub,
            claims.exp
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(|e| {
                tracing::error!("Error generating token: {}", e);
                AuthError::Internal(format!("Error al generar token: {}", e))
            })?;

        Ok(IssuedToken { token, claims })
    }

    /// Verifica firma, algoritmo, emisor, audiencia y expiración
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<VerifiedToken, AuthError> {
        self.decode_claims(token, kind, true)
            .map(VerifiedToken::from_claims)
    }

    /// Like `verify` but accepts an expired token. Only used to retire records.
    pub fn verify_ignoring_expiry(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<TokenClaims, AuthError> {
        self.decode_claims(token, kind, false)
    }

    /// Expiry of an access token whose signature checks out, expired or not
    pub fn peek_expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        self.decode_claims(token, TokenKind::Access, false)
            .ok()
            .and_then(|claims| claims.expires_at())
    }

    fn decode_claims(
        &self,
        token: &str,
        kind: TokenKind,
        validate_exp: bool,
    ) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation(validate_exp))
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(format!("Error al validar token: {}", e)),
            })?;

        if data.claims.token_use != kind {
            return Err(AuthError::InvalidToken(format!(
                "expected {:?} token, got {:?}",
                kind, data.claims.token_use
            )));
        }

        Ok(data.claims)
    }
}

/// SHA-256 (hex) de un token, la única forma en que se persiste
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn validate_secret(name: &str, secret: &str) -> Result<(), AuthError> {
    if secret.trim().is_empty() {
        return Err(AuthError::InsecureConfiguration(format!("{} secret is not set", name)));
    }

    if secret.len() < MIN_SECRET_LENGTH {
        return Err(AuthError::InsecureConfiguration(format!(
            "{} secret must be at least {} characters",
            name, MIN_SECRET_LENGTH
        )));
    }

    let lowered = secret.to_ascii_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Err(AuthError::InsecureConfiguration(format!(
            "{} secret looks like a placeholder",
            name
        )));
    }

    let distinct: HashSet<char> = secret.chars().collect();
    if distinct.len() < MIN_DISTINCT_SECRET_CHARS {
        return Err(AuthError::InsecureConfiguration(format!(
            "{} secret has too little variety",
            name
        )));
    }

    Ok(())
}
