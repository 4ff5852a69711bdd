use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::dtos::session_dto::AuthenticatedPrincipal;
use crate::application::ports::auth_ports::UserStoragePort;
use crate::application::services::revocation_cache::RevocationCache;
use crate::application::services::session_manager::SessionManager;
use crate::domain::services::auth_error::AuthError;
use crate::domain::services::token_codec::{TokenCodec, TokenKind, VerifiedToken};

/// Places a request may carry its access token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCarriers {
    pub cookie: Option<String>,
    pub bearer: Option<String>,
}

impl TokenCarriers {
    /// Cookie wins over the Authorization header; blank values count as absent
    pub fn select(&self) -> Option<&str> {
        self.cookie
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.bearer.as_deref().filter(|token| !token.trim().is_empty()))
    }
}

/// Trato de los tokens de acceso emitidos sin `sessionId`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyTokenPolicy {
    Allow,
    Reject,
}

impl LegacyTokenPolicy {
    pub fn from_flag(allow: bool) -> Self {
        if allow {
            LegacyTokenPolicy::Allow
        } else {
            LegacyTokenPolicy::Reject
        }
    }
}

/**
 * Authenticates a request from its access token.
 *
 * Steps run in a fixed order and stop at the first failure: locate the token,
 * verify it, check the blacklist, check the payload shape, check the session,
 * load the user.
 */
pub struct ValidationPipeline {
    codec: Arc<TokenCodec>,
    revocation_cache: Arc<RevocationCache>,
    session_manager: Arc<SessionManager>,
    users: Arc<dyn UserStoragePort>,
    legacy_policy: LegacyTokenPolicy,
}

impl ValidationPipeline {
    pub fn new(
        codec: Arc<TokenCodec>,
        revocation_cache: Arc<RevocationCache>,
        session_manager: Arc<SessionManager>,
        users: Arc<dyn UserStoragePort>,
        legacy_policy: LegacyTokenPolicy,
    ) -> Self {
        Self {
            codec,
            revocation_cache,
            session_manager,
            users,
            legacy_policy,
        }
    }

    pub async fn authenticate(&self, carriers: &TokenCarriers) -> Result<AuthenticatedPrincipal, AuthError> {
        let token = carriers.select().ok_or(AuthError::TokenNotProvided)?;
        self.authenticate_token(token).await
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<AuthenticatedPrincipal, AuthError> {
        let verified = self.codec.verify(token, TokenKind::Access)?;

        if self.revocation_cache.is_blacklisted(token).await {
            return Err(AuthError::TokenRevoked);
        }

        let claims = verified.claims();
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("missing subject claim".to_string()));
        }
        let role = claims
            .role
            .clone()
            .filter(|role| !role.trim().is_empty())
            .ok_or_else(|| AuthError::InvalidToken("missing role claim".to_string()))?;

        let session_id = match &verified {
            VerifiedToken::SessionBound { session_id, .. } => {
                if !self.session_manager.validate_session(session_id).await? {
                    debug!("Session {} is no longer valid", session_id);
                    return Err(AuthError::SessionInvalid("session is not active".to_string()));
                }
                Some(session_id.clone())
            }
            VerifiedToken::Legacy { claims } => match self.legacy_policy {
                LegacyTokenPolicy::Allow => {
                    warn!("Accepting legacy access token without session for user {}", claims.sub);
                    None
                }
                LegacyTokenPolicy::Reject => {
                    return Err(AuthError::SessionInvalid("token is not bound to a session".to_string()));
                }
            },
        };

        let user = self
            .users
            .get_user_by_id(&claims.sub)
            .await?
            .filter(|user| user.is_active())
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthenticatedPrincipal {
            user_id: user.id().to_string(),
            role,
            contact: user.contact().map(str::to_string),
            session_id,
        })
    }
}
