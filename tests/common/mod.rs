// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::http::{header, Response};
use jiko_portal::config::Config;
use jiko_portal::identity::{self, IdentityState};
use jiko_portal::models::{LoginRequest, LoginResponse, Role, StaffProfile, UserProfile};
use jiko_portal::routes::create_router;
use jiko_portal::services::{HttpIdentityClient, IdentityApi, IdentityError};
use jiko_portal::session::{AuthSession, MemoryTokenStore, QueryPolicy};
use jiko_portal::AppState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// One scripted response, optionally held until `release` is notified.
#[allow(dead_code)]
pub struct Step<T> {
    pub release: Option<Arc<Notify>>,
    pub result: Result<T, IdentityError>,
}

#[allow(dead_code)]
impl<T> Step<T> {
    pub fn now(result: Result<T, IdentityError>) -> Self {
        Self {
            release: None,
            result,
        }
    }

    pub fn held(release: Arc<Notify>, result: Result<T, IdentityError>) -> Self {
        Self {
            release: Some(release),
            result,
        }
    }
}

/// Scripted identity API. Each call pops the next scripted step, falling
/// back to the default result once the script is exhausted.
#[derive(Default)]
pub struct MockIdentity {
    pub login_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    login_script: Mutex<VecDeque<Step<LoginResponse>>>,
    profile_script: Mutex<VecDeque<Step<UserProfile>>>,
    login_default: Mutex<Option<Result<LoginResponse, IdentityError>>>,
    profile_default: Mutex<Option<Result<UserProfile, IdentityError>>>,
    /// Logout never completes.
    pub hang_logout: AtomicBool,
}

#[allow(dead_code)]
impl MockIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mock whose login succeeds for `user` and whose profile returns `user`.
    pub fn accepting(user: UserProfile) -> Arc<Self> {
        let mock = Self::new();
        mock.set_login(Ok(login_response(&user)));
        mock.set_profile(Ok(user));
        mock
    }

    pub fn set_login(&self, result: Result<LoginResponse, IdentityError>) {
        *self.login_default.lock().unwrap() = Some(result);
    }

    pub fn set_profile(&self, result: Result<UserProfile, IdentityError>) {
        *self.profile_default.lock().unwrap() = Some(result);
    }

    pub fn push_login(&self, step: Step<LoginResponse>) {
        self.login_script.lock().unwrap().push_back(step);
    }

    pub fn push_profile(&self, step: Step<UserProfile>) {
        self.profile_script.lock().unwrap().push_back(step);
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

async fn play<T: Clone>(
    script: &Mutex<VecDeque<Step<T>>>,
    default: &Mutex<Option<Result<T, IdentityError>>>,
) -> Result<T, IdentityError> {
    let step = script.lock().unwrap().pop_front();
    match step {
        Some(step) => {
            if let Some(release) = step.release {
                release.notified().await;
            }
            step.result
        }
        None => default
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Err(IdentityError::Transport("not scripted".into()))),
    }
}

#[async_trait]
impl IdentityApi for MockIdentity {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, IdentityError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        play(&self.login_script, &self.login_default).await
    }

    async fn profile(&self, _access_token: &str) -> Result<UserProfile, IdentityError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        play(&self.profile_script, &self.profile_default).await
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), IdentityError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_logout.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Profile fixture with the role's default permissions.
#[allow(dead_code)]
pub fn profile(id: u64, username: &str, role: Option<Role>) -> UserProfile {
    UserProfile {
        id,
        username: username.to_string(),
        email: format!("{username}@jikomilele.co.ke"),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        is_active: true,
        last_login: None,
        date_joined: "2026-01-05T08:00:00+00:00".to_string(),
        profile: StaffProfile {
            staff_name: Some(format!("Staff {username}")),
            current_role: role,
            permissions: role
                .map(|r| r.default_permissions().iter().copied().collect())
                .unwrap_or_default(),
            failed_login_attempts: 0,
            is_account_locked: false,
        },
    }
}

#[allow(dead_code)]
pub fn login_response(user: &UserProfile) -> LoginResponse {
    LoginResponse {
        access_token: format!("access-{}", user.username),
        refresh_token: format!("refresh-{}", user.username),
        user: user.clone(),
    }
}

/// Fast retries so failure tests finish quickly.
#[allow(dead_code)]
pub fn test_policy() -> QueryPolicy {
    QueryPolicy {
        stale_after: Duration::from_secs(300),
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
    }
}

/// A session over `api` with an in-memory token store the test can inspect.
#[allow(dead_code)]
pub fn test_session(api: Arc<dyn IdentityApi>) -> (AuthSession, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(MemoryTokenStore::new());
    (AuthSession::new(api, tokens.clone(), test_policy()), tokens)
}

/// Create a test app over a mocked identity API.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(api: Arc<dyn IdentityApi>) -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(api, Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(
    api: Arc<dyn IdentityApi>,
    config: Config,
) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, api, None).expect("Failed to build state"));
    (create_router(state.clone()), state)
}

/// Serve the identity API (seeded with demo accounts) on an ephemeral port.
/// Returns its base URL and state.
#[allow(dead_code)]
pub async fn spawn_identity_server() -> (String, Arc<IdentityState>) {
    let config = Config::test_default();
    let state = Arc::new(IdentityState::from_config(&config));
    let app: axum::Router = axum::Router::new().nest("/api/auth", identity::router(state.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Identity server failed");
    });

    (format!("http://{addr}/api/auth"), state)
}

/// Full stack: portal router talking HTTP to a live identity server.
#[allow(dead_code)]
pub async fn create_live_app() -> (axum::Router, Arc<AppState>, Arc<IdentityState>) {
    let (base_url, identity) = spawn_identity_server().await;
    let client = HttpIdentityClient::new(base_url, Duration::from_secs(5))
        .expect("Failed to build identity client");
    let (app, state) = create_test_app(Arc::new(client));
    (app, state, identity)
}

/// `name=value` of the session cookie set by `response`, if any.
#[allow(dead_code)]
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("jiko_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

#[allow(dead_code)]
pub fn location<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[allow(dead_code)]
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8_lossy(&bytes).into_owned()
}
