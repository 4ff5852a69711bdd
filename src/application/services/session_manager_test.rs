use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::mpsc;

use crate::application::dtos::session_dto::SessionCreatedEvent;
use crate::application::ports::auth_ports::{MockSessionEventPort, SessionEventPort};
use crate::application::services::session_manager::{
    RevocationTarget, SessionManager, SessionSettings, REASON_TOKEN_EXPIRED, REASON_TOKEN_ROTATED,
    REASON_USER_LOGOUT,
};
use crate::application::services::test_support::{
    codec, student, user_store, AuthFixture, InMemorySessionStorage,
};
use crate::application::services::validation_pipeline::LegacyTokenPolicy;
use crate::domain::entities::device::{DeviceInfo, DeviceType};
use crate::domain::services::auth_error::AuthError;
use crate::domain::services::token_codec::{TokenKind, VerifiedToken};

const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

fn phone() -> DeviceInfo {
    DeviceInfo::new(
        Some("device-42".to_string()),
        Some(IPHONE.to_string()),
        Some("203.0.113.7".to_string()),
    )
}

#[tokio::test]
async fn issue_binds_both_tokens_to_a_new_live_session() {
    // Arrange
    let fixture = AuthFixture::new(vec![student("user-1")]).await;

    // Act
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();

    // Assert
    let access = fixture.codec.verify(&pair.access_token, TokenKind::Access).unwrap();
    let refresh = fixture.codec.verify(&pair.refresh_token, TokenKind::Refresh).unwrap();
    assert_eq!(access.session_id(), Some(pair.session_id.as_str()));
    assert_eq!(refresh.session_id(), Some(pair.session_id.as_str()));

    let session = fixture.storage.session(&pair.session_id).unwrap();
    assert!(session.is_live_at(Utc::now()));
    assert_eq!(session.device_type, DeviceType::Mobile);
    assert_eq!(session.fingerprint, phone().fingerprint());

    let record = fixture.storage.record_for(&pair.refresh_token).unwrap();
    assert_eq!(record.session_id, pair.session_id);
    assert_ne!(record.token_hash, pair.refresh_token);
    assert!(!record.revoked);

    assert!(fixture.session_manager.validate_session(&pair.session_id).await.unwrap());
}

#[tokio::test]
async fn issue_fails_when_storage_is_down() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    fixture.storage.set_failing(true);

    let result = fixture.session_manager.issue(&student("user-1"), &phone()).await;

    assert!(matches!(result, Err(AuthError::Internal(_))));
}

#[tokio::test]
async fn issue_notifies_observers_of_the_new_session() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut events = MockSessionEventPort::new();
    events
        .expect_session_created()
        .times(1)
        .returning(move |event| {
            let _ = tx.send(event);
        });

    let storage = Arc::new(InMemorySessionStorage::new());
    let manager = SessionManager::new(
        storage,
        user_store(vec![student("user-1")]),
        codec(),
        Arc::new(events),
        SessionSettings::default(),
    );

    let pair = manager.issue(&student("user-1"), &phone()).await.unwrap();

    let event = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.session_id, pair.session_id);
    assert_eq!(event.user_id, "user-1");
    assert_eq!(event.device_type, DeviceType::Mobile);
}

struct StalledObserver;

#[async_trait]
impl SessionEventPort for StalledObserver {
    async fn session_created(&self, _event: SessionCreatedEvent) {
        std::future::pending::<()>().await;
    }
}

#[tokio::test]
async fn a_stalled_observer_does_not_block_issuance() {
    let manager = SessionManager::new(
        Arc::new(InMemorySessionStorage::new()),
        user_store(vec![student("user-1")]),
        codec(),
        Arc::new(StalledObserver),
        SessionSettings::default(),
    );

    let issued = tokio::time::timeout(
        StdDuration::from_secs(1),
        manager.issue(&student("user-1"), &phone()),
    )
    .await;

    assert!(matches!(issued, Ok(Ok(_))));
}

#[tokio::test]
async fn rotate_keeps_the_session_and_revokes_the_presented_token() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let first = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    let before = fixture.storage.session(&first.session_id).unwrap();

    let second = fixture
        .session_manager
        .rotate(&first.refresh_token, &DeviceInfo::default())
        .await
        .unwrap();

    assert_eq!(second.session_id, first.session_id);
    assert_ne!(second.refresh_token, first.refresh_token);

    let old = fixture.storage.record_for(&first.refresh_token).unwrap();
    assert!(old.revoked);
    assert_eq!(old.revoked_reason.as_deref(), Some(REASON_TOKEN_ROTATED));
    assert!(old.last_used_at.is_some());

    let new = fixture.storage.record_for(&second.refresh_token).unwrap();
    assert!(!new.revoked);
    // device attributes of the original login carry over when the client omits them
    assert_eq!(new.device_id.as_deref(), Some("device-42"));

    let after = fixture.storage.session(&first.session_id).unwrap();
    assert!(after.expires_at >= before.expires_at);
    assert_eq!(fixture.storage.live_token_count(&first.session_id), 1);
    fixture.storage.assert_live_sessions_hold_tokens();
}

#[tokio::test]
async fn replaying_a_rotated_token_is_rejected_as_revoked() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let first = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture
        .session_manager
        .rotate(&first.refresh_token, &phone())
        .await
        .unwrap();

    let replay = fixture.session_manager.rotate(&first.refresh_token, &phone()).await;

    assert_eq!(replay.unwrap_err(), AuthError::TokenRevoked);
    fixture.storage.assert_live_sessions_hold_tokens();
}

#[tokio::test]
async fn expired_refresh_token_is_rejected_and_its_record_revoked() {
    let settings = SessionSettings {
        refresh_token_ttl: Duration::seconds(-1),
        ..SessionSettings::default()
    };
    let fixture = AuthFixture::build(vec![student("user-1")], settings, LegacyTokenPolicy::Reject).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();

    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;

    assert_eq!(result.unwrap_err(), AuthError::TokenExpired);
    let record = fixture.storage.record_for(&pair.refresh_token).unwrap();
    assert!(record.revoked);
    assert_eq!(record.revoked_reason.as_deref(), Some(REASON_TOKEN_EXPIRED));
}

#[tokio::test]
async fn expired_record_behind_a_valid_jwt_is_rejected_and_revoked() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture
        .storage
        .update_record(&pair.refresh_token, |record| record.expires_at = Utc::now() - Duration::seconds(1));

    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;

    assert_eq!(result.unwrap_err(), AuthError::TokenExpired);
    assert!(fixture.storage.record_for(&pair.refresh_token).unwrap().revoked);
}

#[tokio::test]
async fn authentic_token_without_record_is_not_recognized() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture.storage.remove_record(&pair.refresh_token);

    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;

    assert_eq!(result.unwrap_err(), AuthError::TokenNotRecognized);
}

#[tokio::test]
async fn access_token_cannot_be_used_to_rotate() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();

    let result = fixture.session_manager.rotate(&pair.access_token, &phone()).await;

    assert!(matches!(result, Err(AuthError::InvalidToken(_))));
}

#[tokio::test]
async fn revoked_session_rejects_rotation_and_validation() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();

    let revoked = fixture
        .session_manager
        .revoke(&RevocationTarget::Session(pair.session_id.clone()), REASON_USER_LOGOUT)
        .await
        .unwrap();

    assert_eq!(revoked, 1);
    assert!(!fixture.session_manager.validate_session(&pair.session_id).await.unwrap());
    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;
    assert!(matches!(
        result,
        Err(AuthError::TokenRevoked) | Err(AuthError::SessionInvalid(_))
    ));

    // revoking again is a no-op and keeps the first reason
    let again = fixture
        .session_manager
        .revoke(&RevocationTarget::Session(pair.session_id.clone()), "Password changed")
        .await
        .unwrap();
    assert_eq!(again, 0);
    let session = fixture.storage.session(&pair.session_id).unwrap();
    assert_eq!(session.revoked_reason.as_deref(), Some(REASON_USER_LOGOUT));
}

#[tokio::test]
async fn expired_session_rejects_rotation() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture
        .storage
        .update_session(&pair.session_id, |session| session.expires_at = Utc::now() - Duration::seconds(1));

    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;

    assert!(matches!(result, Err(AuthError::SessionInvalid(_))));
    assert!(!fixture.session_manager.validate_session(&pair.session_id).await.unwrap());
}

#[tokio::test]
async fn session_without_live_refresh_token_is_not_valid() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture
        .storage
        .update_record(&pair.refresh_token, |record| {
            record.revoke(Utc::now(), "manual");
        });

    assert!(!fixture.session_manager.validate_session(&pair.session_id).await.unwrap());
    assert!(!fixture.session_manager.validate_session("missing-session").await.unwrap());
}

#[tokio::test]
async fn revoking_a_user_ends_every_session() {
    let fixture = AuthFixture::new(vec![student("user-1"), student("user-2")]).await;
    let laptop = fixture.session_manager.issue(&student("user-1"), &DeviceInfo::default()).await.unwrap();
    let mobile = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    let other = fixture.session_manager.issue(&student("user-2"), &phone()).await.unwrap();

    let revoked = fixture
        .session_manager
        .revoke(&RevocationTarget::User("user-1".to_string()), "Password changed")
        .await
        .unwrap();

    assert_eq!(revoked, 2);
    assert!(!fixture.session_manager.validate_session(&laptop.session_id).await.unwrap());
    assert!(!fixture.session_manager.validate_session(&mobile.session_id).await.unwrap());
    assert!(fixture.session_manager.validate_session(&other.session_id).await.unwrap());
    assert!(fixture.session_manager.list_live_sessions("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn rotation_fails_when_the_user_is_gone() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    // user-9 was never registered in the user store
    let pair = fixture.session_manager.issue(&student("user-9"), &phone()).await.unwrap();

    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;

    assert_eq!(result.unwrap_err(), AuthError::UserNotFound);
    assert!(!fixture.storage.record_for(&pair.refresh_token).unwrap().revoked);
}

#[tokio::test]
async fn failed_rotation_leaves_the_old_token_live() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture.storage.set_failing_rotations(true);

    let result = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await;

    assert!(matches!(result, Err(AuthError::Internal(_))));
    assert!(!fixture.storage.record_for(&pair.refresh_token).unwrap().revoked);
    assert_eq!(fixture.storage.live_token_count(&pair.session_id), 1);
    fixture.storage.assert_live_sessions_hold_tokens();
}

#[tokio::test]
async fn concurrent_rotations_of_one_token_never_strand_the_session() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();

    let manager_a = fixture.session_manager.clone();
    let manager_b = fixture.session_manager.clone();
    let token_a = pair.refresh_token.clone();
    let token_b = pair.refresh_token.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { manager_a.rotate(&token_a, &DeviceInfo::default()).await }),
        tokio::spawn(async move { manager_b.rotate(&token_b, &DeviceInfo::default()).await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert!(!successes.is_empty());
    for success in &successes {
        assert_eq!(success.session_id, pair.session_id);
    }
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(failure, &AuthError::TokenRevoked);
    }

    assert!(fixture.storage.record_for(&pair.refresh_token).unwrap().revoked);
    assert!(fixture.storage.live_token_count(&pair.session_id) >= 1);
    fixture.storage.assert_live_sessions_hold_tokens();
}

#[tokio::test]
async fn live_sessions_are_listed_newest_activity_first() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let first = fixture.session_manager.issue(&student("user-1"), &DeviceInfo::default()).await.unwrap();
    let second = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();
    fixture
        .storage
        .update_session(&first.session_id, |session| session.last_active_at = Utc::now() - Duration::hours(2));

    let sessions = fixture.session_manager.list_live_sessions("user-1").await.unwrap();

    let ids: Vec<&str> = sessions.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![second.session_id.as_str(), first.session_id.as_str()]);
}

#[tokio::test]
async fn rotated_tokens_carry_the_current_role() {
    let fixture = AuthFixture::new(vec![student("user-1")]).await;
    let pair = fixture.session_manager.issue(&student("user-1"), &phone()).await.unwrap();

    let rotated = fixture.session_manager.rotate(&pair.refresh_token, &phone()).await.unwrap();

    match fixture.codec.verify(&rotated.access_token, TokenKind::Access).unwrap() {
        VerifiedToken::SessionBound { claims, session_id } => {
            assert_eq!(session_id, pair.session_id);
            assert_eq!(claims.role.as_deref(), Some("student"));
            assert_eq!(claims.contact.as_deref(), Some("user-1@learnup.test"));
        }
        VerifiedToken::Legacy { .. } => panic!("rotated access token lost its session"),
    }
}
