use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::application::ports::auth_ports::{
    BlacklistStoragePort, MockSessionEventPort, MockUserStoragePort, SessionStoragePort,
};
use crate::application::services::auth_application_service::AuthApplicationService;
use crate::application::services::revocation_cache::RevocationCache;
use crate::application::services::session_manager::{SessionManager, SessionSettings};
use crate::application::services::validation_pipeline::{LegacyTokenPolicy, ValidationPipeline};
use crate::common::errors::DomainError;
use crate::domain::entities::blacklist_entry::BlacklistEntry;
use crate::domain::entities::refresh_token::RefreshToken;
use crate::domain::entities::session::Session;
use crate::domain::entities::user::User;
use crate::domain::repositories::session_repository::{RotationOutcome, TokenRotation};
use crate::domain::services::token_codec::{token_digest, TokenCodec};

pub const ACCESS_SECRET: &str = "access-signing-key-4f9a1c7e2b8d6053";
pub const REFRESH_SECRET: &str = "refresh-signing-key-8e2d4b6a0c1f3957";

pub fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET, "learnup", "learnup-api").unwrap())
}

pub fn student(id: &str) -> User {
    User::new(
        id.to_string(),
        "student".to_string(),
        Some(format!("{}@learnup.test", id)),
        None,
        true,
    )
}

/// User lookup backed by a fixed set of users
pub fn user_store(users: Vec<User>) -> Arc<MockUserStoragePort> {
    let users: HashMap<String, User> = users
        .into_iter()
        .map(|user| (user.id().to_string(), user))
        .collect();

    let mut mock = MockUserStoragePort::new();
    mock.expect_get_user_by_id()
        .returning(move |id| Ok(users.get(id).cloned()));
    Arc::new(mock)
}

pub fn silent_events() -> Arc<MockSessionEventPort> {
    let mut mock = MockSessionEventPort::new();
    mock.expect_session_created().returning(|_| ());
    Arc::new(mock)
}

fn outage() -> DomainError {
    DomainError::internal_error("Database", "simulated outage")
}

#[derive(Default)]
struct SessionTables {
    sessions: HashMap<String, Session>,
    // keyed by record id
    tokens: HashMap<String, RefreshToken>,
}

/// Session and refresh-token storage kept in one mutex, so every call is atomic
#[derive(Default)]
pub struct InMemorySessionStorage {
    tables: Mutex<SessionTables>,
    failing: AtomicBool,
    failing_rotations: AtomicBool,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_rotations(&self, failing: bool) {
        self.failing_rotations.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(outage())
        } else {
            Ok(())
        }
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.tables.lock().unwrap().sessions.get(id).cloned()
    }

    /// Record of a raw token
    pub fn record_for(&self, token: &str) -> Option<RefreshToken> {
        let hash = token_digest(token);
        self.tables
            .lock()
            .unwrap()
            .tokens
            .values()
            .find(|record| record.token_hash == hash)
            .cloned()
    }

    pub fn update_record(&self, token: &str, update: impl FnOnce(&mut RefreshToken)) {
        let hash = token_digest(token);
        let mut tables = self.tables.lock().unwrap();
        if let Some(record) = tables.tokens.values_mut().find(|record| record.token_hash == hash) {
            update(record);
        }
    }

    pub fn remove_record(&self, token: &str) {
        let hash = token_digest(token);
        self.tables
            .lock()
            .unwrap()
            .tokens
            .retain(|_, record| record.token_hash != hash);
    }

    pub fn update_session(&self, id: &str, update: impl FnOnce(&mut Session)) {
        if let Some(session) = self.tables.lock().unwrap().sessions.get_mut(id) {
            update(session);
        }
    }

    pub fn insert_session(&self, session: Session) {
        self.tables.lock().unwrap().sessions.insert(session.id.clone(), session);
    }

    pub fn insert_record(&self, record: RefreshToken) {
        self.tables.lock().unwrap().tokens.insert(record.id.clone(), record);
    }

    pub fn session_count(&self) -> usize {
        self.tables.lock().unwrap().sessions.len()
    }

    pub fn record_count(&self) -> usize {
        self.tables.lock().unwrap().tokens.len()
    }

    pub fn live_token_count(&self, session_id: &str) -> usize {
        let now = Utc::now();
        self.tables
            .lock()
            .unwrap()
            .tokens
            .values()
            .filter(|record| record.session_id == session_id && record.is_live_at(now))
            .count()
    }

    /// Every live session must hold at least one live refresh token
    pub fn assert_live_sessions_hold_tokens(&self) {
        let now = Utc::now();
        let tables = self.tables.lock().unwrap();
        for session in tables.sessions.values().filter(|s| s.is_live_at(now)) {
            let live = tables
                .tokens
                .values()
                .filter(|record| record.session_id == session.id && record.is_live_at(now))
                .count();
            assert!(live >= 1, "live session {} has no live refresh token", session.id);
        }
    }
}

#[async_trait]
impl SessionStoragePort for InMemorySessionStorage {
    async fn create_session(&self, session: Session, token: RefreshToken) -> Result<(), DomainError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.sessions.insert(session.id.clone(), session);
        tables.tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, DomainError> {
        self.check()?;
        Ok(self.session(session_id))
    }

    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, DomainError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tokens
            .values()
            .find(|record| record.token_hash == token_hash)
            .cloned())
    }

    async fn rotate_refresh_token(&self, rotation: TokenRotation) -> Result<RotationOutcome, DomainError> {
        self.check()?;
        if self.failing_rotations.load(Ordering::SeqCst) {
            return Err(outage());
        }

        let mut tables = self.tables.lock().unwrap();
        match tables.sessions.get_mut(&rotation.session_id) {
            Some(session) if session.is_live_at(rotation.at) => {
                session.expires_at = rotation.session_expires_at;
                session.last_active_at = rotation.at;
            }
            _ => return Ok(RotationOutcome::SessionNotLive),
        }

        tables.tokens.insert(rotation.new_token.id.clone(), rotation.new_token);

        match tables.tokens.get_mut(&rotation.old_token_id) {
            Some(old) if !old.revoked => {
                old.revoke(rotation.at, &rotation.reason);
                old.last_used_at = Some(rotation.at);
                Ok(RotationOutcome::Rotated)
            }
            _ => Ok(RotationOutcome::OldTokenAlreadyRevoked),
        }
    }

    async fn revoke_refresh_token(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, DomainError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tokens
            .get_mut(token_id)
            .map(|record| record.revoke(at, reason))
            .unwrap_or(false))
    }

    async fn revoke_session(&self, session_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, DomainError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let revoked = tables
            .sessions
            .get_mut(session_id)
            .map(|session| session.revoke(at, reason))
            .unwrap_or(false);
        for record in tables.tokens.values_mut().filter(|r| r.session_id == session_id) {
            record.revoke(at, reason);
        }
        Ok(revoked)
    }

    async fn revoke_all_user_sessions(&self, user_id: &str, reason: &str, at: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let mut count = 0;
        for session in tables.sessions.values_mut().filter(|s| s.user_id == user_id) {
            if session.revoke(at, reason) {
                count += 1;
            }
        }
        for record in tables.tokens.values_mut().filter(|r| r.user_id == user_id) {
            record.revoke(at, reason);
        }
        Ok(count)
    }

    async fn has_live_refresh_token(&self, session_id: &str, at: DateTime<Utc>) -> Result<bool, DomainError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tokens
            .values()
            .any(|record| record.session_id == session_id && record.is_live_at(at)))
    }

    async fn get_live_sessions(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<Session>, DomainError> {
        self.check()?;
        let mut sessions: Vec<Session> = self
            .tables
            .lock()
            .unwrap()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_live_at(at))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(sessions)
    }

    async fn delete_stale_refresh_tokens(&self, dead_before: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.tokens.len();
        tables.tokens.retain(|_, record| {
            let expired = record.expires_at < dead_before;
            let retired = record.revoked && record.revoked_at.map_or(false, |at| at < dead_before);
            !(expired || retired)
        });
        Ok((before - tables.tokens.len()) as u64)
    }

    async fn delete_dead_sessions(&self, dead_before: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| {
            let revoked_long_ago = session.revoked_at.map_or(false, |at| at < dead_before);
            !(revoked_long_ago || session.expires_at < dead_before)
        });
        let removed = before - tables.sessions.len();

        let SessionTables { sessions, tokens } = &mut *tables;
        tokens.retain(|_, record| sessions.contains_key(&record.session_id));
        Ok(removed as u64)
    }
}

#[derive(Default)]
pub struct InMemoryBlacklistStorage {
    entries: Mutex<HashMap<String, BlacklistEntry>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryBlacklistStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of single-entry lookups that reached storage
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn entry_for(&self, token: &str) -> Option<BlacklistEntry> {
        self.entries.lock().unwrap().get(&token_digest(token)).cloned()
    }

    pub fn insert(&self, entry: BlacklistEntry) {
        self.entries.lock().unwrap().insert(entry.token_hash.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(outage())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlacklistStoragePort for InMemoryBlacklistStorage {
    async fn add_entry(&self, entry: BlacklistEntry) -> Result<(), DomainError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&entry.token_hash) {
            Some(existing) if existing.expires_at >= entry.expires_at => {}
            _ => {
                entries.insert(entry.token_hash.clone(), entry);
            }
        }
        Ok(())
    }

    async fn find_active_entry(&self, token_hash: &str, at: DateTime<Utc>) -> Result<Option<BlacklistEntry>, DomainError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(token_hash)
            .filter(|entry| entry.expires_at > at)
            .cloned())
    }

    async fn list_active_entries(&self, at: DateTime<Utc>) -> Result<Vec<BlacklistEntry>, DomainError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.expires_at > at)
            .cloned()
            .collect())
    }

    async fn delete_expired_entries(&self, at: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > at);
        Ok((before - entries.len()) as u64)
    }
}

/// Fully wired auth services over in-memory storage
pub struct AuthFixture {
    pub codec: Arc<TokenCodec>,
    pub storage: Arc<InMemorySessionStorage>,
    pub blacklist: Arc<InMemoryBlacklistStorage>,
    pub session_manager: Arc<SessionManager>,
    pub revocation_cache: Arc<RevocationCache>,
    pub pipeline: Arc<ValidationPipeline>,
    pub service: Arc<AuthApplicationService>,
}

impl AuthFixture {
    pub async fn new(users: Vec<User>) -> Self {
        Self::build(users, SessionSettings::default(), LegacyTokenPolicy::Reject).await
    }

    pub async fn build(users: Vec<User>, settings: SessionSettings, legacy_policy: LegacyTokenPolicy) -> Self {
        let codec = codec();
        let storage = Arc::new(InMemorySessionStorage::new());
        let blacklist = Arc::new(InMemoryBlacklistStorage::new());
        let users = user_store(users);

        let session_manager = Arc::new(SessionManager::new(
            storage.clone(),
            users.clone(),
            codec.clone(),
            silent_events(),
            settings,
        ));
        let revocation_cache = Arc::new(
            RevocationCache::new(blacklist.clone(), codec.clone(), Duration::hours(24)).await,
        );
        let pipeline = Arc::new(ValidationPipeline::new(
            codec.clone(),
            revocation_cache.clone(),
            session_manager.clone(),
            users,
            legacy_policy,
        ));
        let service = Arc::new(AuthApplicationService::new(
            session_manager.clone(),
            revocation_cache.clone(),
        ));

        Self {
            codec,
            storage,
            blacklist,
            session_manager,
            revocation_cache,
            pipeline,
            service,
        }
    }
}
