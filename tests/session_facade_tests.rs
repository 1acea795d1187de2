// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth session lifecycle tests against a scripted identity API.

use jiko_portal::models::{Credentials, LoginRequest, Role};
use jiko_portal::services::IdentityError;
use jiko_portal::session::{
    Fetch, LoginError, QueryStatus, SessionRegistry, TokenStorage, TokenStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

mod common;
use common::{login_response, profile, test_policy, test_session, MockIdentity, Step};

fn valid_login() -> LoginRequest {
    LoginRequest::new("server1", "SecurePass123")
}

fn server_error() -> IdentityError {
    IdentityError::Status {
        status: 503,
        body: "unavailable".into(),
    }
}

/// Yield until `cond` holds (bounded, so a regression fails instead of hanging).
async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn test_login_seeds_session_without_extra_fetch() {
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    let (session, tokens) = test_session(mock.clone());

    let user = session.login(&valid_login()).await.expect("login should succeed");
    assert_eq!(user.username, "server1");

    let view = session.view();
    assert!(view.is_authenticated);
    assert_eq!(view.role, Some(Role::Server));
    assert_eq!(view.staff_name.as_deref(), Some("Staff server1"));
    assert!(view.login_error.is_none());
    assert!(!view.login_loading);

    assert!(tokens.is_present());
    assert_eq!(mock.login_calls(), 1);
    assert_eq!(mock.profile_calls(), 0, "login must not need a profile round trip");
}

#[tokio::test]
async fn test_failed_login_leaves_state_untouched() {
    let mock = MockIdentity::new();
    mock.set_login(Err(IdentityError::InvalidCredentials));
    let (session, tokens) = test_session(mock.clone());

    let err = session
        .login(&LoginRequest::new("baduser", "badpass"))
        .await
        .unwrap_err();
    assert_eq!(err, LoginError::InvalidCredentials);

    let view = session.view();
    assert!(!view.is_authenticated);
    assert_eq!(view.login_error, Some(LoginError::InvalidCredentials));
    assert!(!tokens.is_present());
    assert_eq!(session.query().snapshot().status, QueryStatus::Idle);
}

#[tokio::test]
async fn test_login_validation_skips_network() {
    let mock = MockIdentity::new();
    let (session, _tokens) = test_session(mock.clone());

    let err = session
        .login(&LoginRequest::new("   ", "SecurePass123"))
        .await
        .unwrap_err();
    assert_eq!(err, LoginError::Validation("Username is required".into()));

    let err = session
        .login(&LoginRequest::new("server1", "short"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LoginError::Validation("Password must be at least 6 characters".into())
    );
    assert_eq!(mock.login_calls(), 0);
}

#[tokio::test]
async fn test_logout_is_local_even_if_revoke_hangs() {
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    mock.hang_logout.store(true, Ordering::SeqCst);
    let (session, tokens) = test_session(mock.clone());
    session.login(&valid_login()).await.unwrap();

    let revoke = session.logout().expect("revoke task should be spawned");

    let view = session.view();
    assert!(!view.is_authenticated);
    assert!(!tokens.is_present());

    wait_for(|| mock.logout_calls() == 1).await;
    assert!(!revoke.is_finished());
    assert!(!session.resolve().await.is_authenticated);
    revoke.abort();
}

#[tokio::test]
async fn test_logout_without_tokens_spawns_nothing() {
    let mock = MockIdentity::new();
    let (session, _tokens) = test_session(mock.clone());
    assert!(session.logout().is_none());
    assert_eq!(mock.logout_calls(), 0);
}

#[tokio::test]
async fn test_profile_401_signs_out() {
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    let (session, tokens) = test_session(mock.clone());
    session.login(&valid_login()).await.unwrap();
    assert!(session.view().is_authenticated);

    mock.set_profile(Err(IdentityError::Unauthorized));
    let view = session.refetch().await;

    assert!(!view.is_authenticated);
    assert!(!session.view().is_authenticated);
    assert!(!tokens.is_present());
    assert_eq!(mock.profile_calls(), 1, "401 must not be retried");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock = MockIdentity::new();
    for _ in 0..3 {
        mock.push_profile(Step::now(Err(server_error())));
    }
    mock.set_profile(Ok(profile(9, "chef", Some(Role::HeadChef))));

    let (session, tokens) = test_session(mock.clone());
    tokens
        .set(&Credentials {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .unwrap();

    let view = session.resolve().await;
    assert!(view.is_authenticated);
    assert!(view.is_kitchen_staff());
    assert_eq!(mock.profile_calls(), 4);
}

#[tokio::test]
async fn test_exhausted_retries_fail_closed() {
    let mock = MockIdentity::new();
    mock.set_profile(Err(server_error()));

    let (session, tokens) = test_session(mock.clone());
    tokens
        .set(&Credentials {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .unwrap();

    let view = session.resolve().await;
    assert!(!view.is_authenticated);
    assert!(!view.is_loading);
    assert_eq!(mock.profile_calls(), 4, "one attempt plus three retries");
    // Transient failures keep the credentials for a later attempt
    assert!(tokens.is_present());
    assert!(matches!(
        session.query().snapshot().status,
        QueryStatus::Error(IdentityError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_concurrent_reads_share_one_fetch() {
    let release = Arc::new(Notify::new());
    let mock = MockIdentity::new();
    mock.push_profile(Step::held(
        release.clone(),
        Ok(profile(4, "host", Some(Role::Host))),
    ));

    let (session, tokens) = test_session(mock.clone());
    tokens
        .set(&Credentials {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .unwrap();

    assert!(session.view().is_loading);

    let (a, b, ()) = tokio::join!(session.resolve(), session.resolve(), async {
        wait_for(|| mock.profile_calls() == 1).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        release.notify_one();
    });

    assert!(a.is_authenticated);
    assert!(b.is_authenticated);
    assert_eq!(mock.profile_calls(), 1);
}

#[tokio::test]
async fn test_superseded_fetch_is_discarded() {
    let release = Arc::new(Notify::new());
    let mock = MockIdentity::new();
    // First fetch is slow and returns the old role
    mock.push_profile(Step::held(
        release.clone(),
        Ok(profile(5, "swing", Some(Role::Busser))),
    ));
    mock.push_profile(Step::now(Ok(profile(5, "swing", Some(Role::ShiftSupervisor)))));

    let (session, tokens) = test_session(mock.clone());
    tokens
        .set(&Credentials {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .unwrap();

    let query = session.query().clone();
    let slow = tokio::spawn({
        let query = query.clone();
        async move { query.refetch().await }
    });
    wait_for(|| mock.profile_calls() == 1).await;

    let fresh = query.refetch().await;
    assert_eq!(
        fresh.profile().map(|p| p.profile.current_role),
        Some(Some(Role::ShiftSupervisor))
    );

    release.notify_one();
    assert_eq!(slow.await.unwrap(), Fetch::Superseded);

    let view = session.view();
    assert_eq!(view.role, Some(Role::ShiftSupervisor));
    assert!(view.is_manager());
}

#[tokio::test]
async fn test_late_rejection_does_not_sign_out_newer_login() {
    let release = Arc::new(Notify::new());
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    let (session, tokens) = test_session(mock.clone());
    let session = Arc::new(session);
    session.login(&valid_login()).await.unwrap();

    // A fetch made with the first login's token is rejected, but only after
    // the user has signed out and back in
    mock.push_profile(Step::held(release.clone(), Err(IdentityError::Unauthorized)));
    let old_fetch = tokio::spawn({
        let session = session.clone();
        async move { session.refetch().await }
    });
    wait_for(|| mock.profile_calls() == 1).await;

    session.logout();
    session.login(&valid_login()).await.unwrap();
    assert!(session.view().is_authenticated);

    release.notify_one();
    old_fetch.await.unwrap();

    assert!(tokens.is_present());
    assert!(session.view().is_authenticated);
    assert_eq!(session.view().role, Some(Role::Server));
}

#[tokio::test]
async fn test_logout_during_login_ends_anonymous() {
    let release = Arc::new(Notify::new());
    let user = profile(3, "server1", Some(Role::Server));
    let mock = MockIdentity::accepting(user.clone());
    mock.push_login(Step::held(release.clone(), Ok(login_response(&user))));

    let (session, tokens) = test_session(mock.clone());
    let session = Arc::new(session);

    let login = tokio::spawn({
        let session = session.clone();
        async move { session.login(&valid_login()).await }
    });
    wait_for(|| mock.login_calls() == 1).await;
    assert!(session.view().login_loading);

    session.logout();
    release.notify_one();

    assert_eq!(login.await.unwrap().unwrap_err(), LoginError::Cancelled);
    let view = session.view();
    assert!(!view.is_authenticated);
    assert!(!view.login_loading);
    assert!(!tokens.is_present());
}

#[tokio::test]
async fn test_stale_profile_served_while_revalidating() {
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    let (session, _tokens) = test_session(mock.clone());
    session.login(&valid_login()).await.unwrap();

    // Login invalidates the seeded profile, so the first read revalidates
    mock.set_profile(Ok(profile(3, "server1", Some(Role::Bartender))));
    let view = session.resolve().await;
    assert_eq!(view.role, Some(Role::Server));

    wait_for(|| mock.profile_calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.view().role, Some(Role::Bartender));
}

#[tokio::test]
async fn test_registry_reattaches_file_backed_session() {
    let dir = tempfile::tempdir().unwrap();
    let user = profile(6, "bartender", Some(Role::Bartender));
    let mock = MockIdentity::accepting(user);

    let registry = SessionRegistry::new(
        mock.clone(),
        TokenStorage::Directory(dir.path().to_path_buf()),
        test_policy(),
    );
    let anonymous = registry.anonymous();
    anonymous
        .login(&LoginRequest::new("bartender", "SecurePass123"))
        .await
        .unwrap();
    let (id, session) = registry.promote(&anonymous, None).unwrap().unwrap();
    assert!(session.view().is_authenticated);
    assert!(!anonymous.view().is_authenticated);
    assert!(dir.path().join(format!("{id}.json")).exists());

    // A fresh process sees the same cookie
    let restarted = SessionRegistry::new(
        mock.clone(),
        TokenStorage::Directory(dir.path().to_path_buf()),
        test_policy(),
    );
    let (same_id, session) = restarted.lookup(Some(&id)).unwrap();
    assert_eq!(same_id, id);

    let view = session.resolve().await;
    assert!(view.is_authenticated);
    assert_eq!(view.role, Some(Role::Bartender));
    assert_eq!(mock.profile_calls(), 1);

    // A well-formed id with no credentials file is not adopted
    assert!(restarted.lookup(Some(&"A".repeat(43))).is_none());
}

#[tokio::test]
async fn test_registry_only_holds_signed_in_contexts() {
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    let registry = SessionRegistry::new(mock, TokenStorage::Memory, test_policy());

    assert!(registry.lookup(None).is_none());
    assert!(registry.lookup(Some(&"a".repeat(43))).is_none());
    assert!(registry.lookup(Some("../../etc/passwd")).is_none());

    let anonymous = registry.anonymous();
    assert!(registry.promote(&anonymous, None).unwrap().is_none());
    assert!(registry.is_empty());

    anonymous.login(&valid_login()).await.unwrap();
    let (id, first) = registry.promote(&anonymous, None).unwrap().unwrap();
    let (_, again) = registry.lookup(Some(&id)).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    // Signing in again moves the context to a new id and forgets the old one
    first.login(&valid_login()).await.unwrap();
    let (rotated, second) = registry.promote(&first, Some(&id)).unwrap().unwrap();
    assert_ne!(rotated, id);
    assert!(registry.lookup(Some(&id)).is_none());
    assert!(second.view().is_authenticated);
    assert_eq!(registry.len(), 1);

    assert!(registry.remove(&rotated));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_prunes_idle_sessions() {
    let mock = MockIdentity::accepting(profile(3, "server1", Some(Role::Server)));
    let registry = SessionRegistry::new(mock, TokenStorage::Memory, test_policy());

    for _ in 0..2 {
        let anonymous = registry.anonymous();
        anonymous.login(&valid_login()).await.unwrap();
        registry.promote(&anonymous, None).unwrap().unwrap();
    }
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.prune_idle(Duration::from_secs(3600)), 0);
    assert_eq!(registry.prune_idle(Duration::ZERO), 2);
    assert!(registry.is_empty());
}
