// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory user directory with progressive account lockout.

use crate::models::{Role, StaffProfile, UserProfile};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Password shared by the seeded demo accounts.
pub const DEMO_PASSWORD: &str = "SecurePass123";

/// Lockout applied once the failed-attempt counter reaches a threshold:
/// 5 attempts → 15 minutes, 10 → 1 hour, 15 or more → 24 hours.
pub fn lockout_duration(failed_attempts: u32) -> Option<Duration> {
    match failed_attempts {
        n if n >= 15 => Some(Duration::minutes(24 * 60)),
        n if n >= 10 => Some(Duration::minutes(60)),
        n if n >= 5 => Some(Duration::minutes(15)),
        _ => None,
    }
}

/// Why a login attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    InvalidCredentials,
    Locked { until: DateTime<Utc> },
    Disabled,
}

/// Why a password change was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChangeFailure {
    UnknownAccount,
    IncorrectPassword,
}

/// Input for [`UserDirectory::add`].
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub staff_name: Option<&'a str>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
struct Account {
    id: u64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    staff_name: Option<String>,
    role: Option<Role>,
    password_hash: String,
    /// Tokens carrying an older version are refused.
    token_version: u32,
    is_active: bool,
    failed_login_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    date_joined: DateTime<Utc>,
}

impl Account {
    fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    fn to_profile(&self, now: DateTime<Utc>) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            is_active: self.is_active,
            last_login: self.last_login.map(|t| t.to_rfc3339()),
            date_joined: self.date_joined.to_rfc3339(),
            profile: StaffProfile {
                staff_name: self.staff_name.clone(),
                current_role: self.role,
                permissions: self
                    .role
                    .map(|r| r.default_permissions().iter().copied().collect())
                    .unwrap_or_default(),
                failed_login_attempts: self.failed_login_attempts,
                is_account_locked: self.is_locked(now),
            },
        }
    }
}

/// Accounts known to the identity service.
pub struct UserDirectory {
    accounts: DashMap<u64, Account>,
    by_username: DashMap<String, u64>,
    next_id: AtomicU64,
    pepper: Vec<u8>,
}

impl UserDirectory {
    pub fn new(pepper: impl Into<Vec<u8>>) -> Self {
        Self {
            accounts: DashMap::new(),
            by_username: DashMap::new(),
            next_id: AtomicU64::new(1),
            pepper: pepper.into(),
        }
    }

    /// Directory seeded with one account per front-line role used in demos.
    pub fn with_demo_accounts(pepper: impl Into<Vec<u8>>) -> Self {
        let directory = Self::new(pepper);
        let demo = [
            ("admin", "System", "Administrator", "Grace Wanjiku", Role::GeneralManager),
            ("chef", "David", "Kimani", "David Kimani", Role::HeadChef),
            ("server1", "Catherine", "Muthoni", "Catherine Muthoni", Role::Server),
            ("host", "Sarah", "Njeri", "Sarah Njeri", Role::Host),
            ("bartender", "Robert", "Kamau", "Robert Kamau", Role::Bartender),
        ];
        for (username, first_name, last_name, staff_name, role) in demo {
            let email = format!("{username}@jikomilele.co.ke");
            directory.add(NewAccount {
                username,
                email: &email,
                password: DEMO_PASSWORD,
                first_name,
                last_name,
                staff_name: Some(staff_name),
                role: Some(role),
            });
        }
        directory
    }

    fn hash_password(&self, username: &str, password: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(&self.pepper).ok()?;
        mac.update(username.as_bytes());
        mac.update(b":");
        mac.update(password.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn password_matches(&self, account: &Account, password: &str) -> bool {
        // An empty stored hash never matches
        match self.hash_password(&account.username, password) {
            Some(candidate) if !account.password_hash.is_empty() => candidate
                .as_bytes()
                .ct_eq(account.password_hash.as_bytes())
                .into(),
            _ => false,
        }
    }

    /// Add an account and return its id. An existing username is replaced.
    pub fn add(&self, new: NewAccount<'_>) -> u64 {
        let username = new.username.trim().to_string();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let account = Account {
            id,
            password_hash: self
                .hash_password(&username, new.password)
                .unwrap_or_default(),
            username: username.clone(),
            email: new.email.to_string(),
            first_name: new.first_name.to_string(),
            last_name: new.last_name.to_string(),
            staff_name: new.staff_name.map(str::to_string),
            role: new.role,
            token_version: 0,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login: None,
            date_joined: Utc::now(),
        };

        if let Some(old) = self.by_username.insert(username, id) {
            self.accounts.remove(&old);
        }
        self.accounts.insert(id, account);
        id
    }

    pub fn id_for(&self, username: &str) -> Option<u64> {
        self.by_username.get(username).map(|id| *id)
    }

    /// Check a username/password pair.
    ///
    /// The password is checked first. A wrong password counts as a failed
    /// attempt (possibly locking the account); a correct one is then refused
    /// for disabled or locked accounts. Success resets the counter.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, LoginFailure> {
        let Some(id) = self.id_for(username.trim()) else {
            // Same work as a real check, so unknown usernames are not faster.
            let _ = self.hash_password(username, password);
            return Err(LoginFailure::InvalidCredentials);
        };
        let Some(mut account) = self.accounts.get_mut(&id) else {
            return Err(LoginFailure::InvalidCredentials);
        };

        if !self.password_matches(&account, password) {
            account.failed_login_attempts += 1;
            if let Some(duration) = lockout_duration(account.failed_login_attempts) {
                let until = now + duration;
                account.locked_until = Some(until);
                tracing::warn!(
                    event = "account_locked",
                    username = %account.username,
                    attempts = account.failed_login_attempts,
                    until = %until.to_rfc3339(),
                    "Account locked after repeated failures"
                );
            }
            return Err(LoginFailure::InvalidCredentials);
        }

        if !account.is_active {
            return Err(LoginFailure::Disabled);
        }

        if let Some(until) = account.locked_until.filter(|until| now < *until) {
            return Err(LoginFailure::Locked { until });
        }

        account.failed_login_attempts = 0;
        account.locked_until = None;
        account.last_login = Some(now);
        Ok(account.to_profile(now))
    }

    pub fn profile(&self, id: u64, now: DateTime<Utc>) -> Option<UserProfile> {
        self.accounts.get(&id).map(|account| account.to_profile(now))
    }

    /// True if the account exists, is active and is not locked.
    pub fn can_access(&self, id: u64, now: DateTime<Utc>) -> bool {
        self.accounts
            .get(&id)
            .is_some_and(|account| account.is_active && !account.is_locked(now))
    }

    pub fn token_version(&self, id: u64) -> Option<u32> {
        self.accounts.get(&id).map(|account| account.token_version)
    }

    /// True if the account can use a token issued at `version`.
    pub fn accepts_token(&self, id: u64, version: u32, now: DateTime<Utc>) -> bool {
        self.accounts.get(&id).is_some_and(|account| {
            account.is_active && !account.is_locked(now) && account.token_version == version
        })
    }

    /// Replace the password after checking the current one.
    ///
    /// Bumps the token version, so every token issued before the change is
    /// refused from then on. Returns the new version.
    pub fn change_password(
        &self,
        id: u64,
        old_password: &str,
        new_password: &str,
    ) -> Result<u32, PasswordChangeFailure> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(PasswordChangeFailure::UnknownAccount)?;
        if !self.password_matches(&account, old_password) {
            return Err(PasswordChangeFailure::IncorrectPassword);
        }

        account.password_hash = self
            .hash_password(&account.username, new_password)
            .unwrap_or_default();
        account.token_version += 1;
        Ok(account.token_version)
    }

    /// Unlock an account and reset its failed attempts.
    ///
    /// Returns `None` for an unknown id, otherwise whether it was locked.
    pub fn unlock(&self, id: u64, now: DateTime<Utc>) -> Option<bool> {
        let mut account = self.accounts.get_mut(&id)?;
        let was_locked = account.is_locked(now);
        account.locked_until = None;
        account.failed_login_attempts = 0;
        Some(was_locked)
    }

    pub fn set_active(&self, id: u64, active: bool) -> bool {
        match self.accounts.get_mut(&id) {
            Some(mut account) => {
                account.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> UserDirectory {
        UserDirectory::with_demo_accounts(b"test-pepper".to_vec())
    }

    #[test]
    fn test_demo_login() {
        let dir = directory();
        let profile = dir.authenticate("server1", DEMO_PASSWORD, Utc::now()).unwrap();

        assert_eq!(profile.profile.current_role, Some(Role::Server));
        assert_eq!(profile.profile.staff_name.as_deref(), Some("Catherine Muthoni"));
        assert!(profile.last_login.is_some());
    }

    #[test]
    fn test_unknown_user_and_wrong_password() {
        let dir = directory();
        let now = Utc::now();

        assert_eq!(
            dir.authenticate("nonexistent", DEMO_PASSWORD, now),
            Err(LoginFailure::InvalidCredentials)
        );
        assert_eq!(
            dir.authenticate("admin", "wrongpassword", now),
            Err(LoginFailure::InvalidCredentials)
        );
    }

    #[test]
    fn test_lockout_after_five_failures() {
        let dir = directory();
        let now = Utc::now();

        for _ in 0..4 {
            let _ = dir.authenticate("chef", "wrongpassword", now);
        }
        assert!(dir.authenticate("chef", DEMO_PASSWORD, now).is_ok());

        for _ in 0..5 {
            let _ = dir.authenticate("chef", "wrongpassword", now);
        }
        match dir.authenticate("chef", DEMO_PASSWORD, now) {
            Err(LoginFailure::Locked { until }) => assert_eq!(until, now + Duration::minutes(15)),
            other => panic!("expected lockout, got {other:?}"),
        }

        let later = now + Duration::minutes(16);
        assert!(dir.authenticate("chef", DEMO_PASSWORD, later).is_ok());
    }

    #[test]
    fn test_progressive_lockout_durations() {
        assert_eq!(lockout_duration(4), None);
        assert_eq!(lockout_duration(5), Some(Duration::minutes(15)));
        assert_eq!(lockout_duration(10), Some(Duration::minutes(60)));
        assert_eq!(lockout_duration(15), Some(Duration::minutes(1440)));
        assert_eq!(lockout_duration(40), Some(Duration::minutes(1440)));
    }

    #[test]
    fn test_disabled_account() {
        let dir = directory();
        let id = dir.id_for("host").unwrap();
        dir.set_active(id, false);

        assert_eq!(
            dir.authenticate("host", DEMO_PASSWORD, Utc::now()),
            Err(LoginFailure::Disabled)
        );
        assert!(!dir.can_access(id, Utc::now()));
    }

    #[test]
    fn test_change_password() {
        let dir = directory();
        let now = Utc::now();
        let id = dir.id_for("server1").unwrap();

        assert_eq!(
            dir.change_password(id, "wrongpassword", "NewSecret456"),
            Err(PasswordChangeFailure::IncorrectPassword)
        );
        assert_eq!(dir.token_version(id), Some(0));

        assert_eq!(dir.change_password(id, DEMO_PASSWORD, "NewSecret456"), Ok(1));
        assert!(!dir.accepts_token(id, 0, now));
        assert!(dir.accepts_token(id, 1, now));
        assert_eq!(
            dir.authenticate("server1", DEMO_PASSWORD, now),
            Err(LoginFailure::InvalidCredentials)
        );
        assert!(dir.authenticate("server1", "NewSecret456", now).is_ok());
        assert_eq!(
            dir.change_password(4242, "x", "y"),
            Err(PasswordChangeFailure::UnknownAccount)
        );
    }

    #[test]
    fn test_unlock_resets_attempts() {
        let dir = directory();
        let now = Utc::now();
        let id = dir.id_for("bartender").unwrap();

        for _ in 0..5 {
            let _ = dir.authenticate("bartender", "nope-nope", now);
        }
        assert!(!dir.can_access(id, now));
        assert_eq!(dir.unlock(id, now), Some(true));
        assert_eq!(dir.unlock(id, now), Some(false));
        assert_eq!(dir.profile(id, now).unwrap().profile.failed_login_attempts, 0);
        assert_eq!(dir.unlock(9999, now), None);
    }
}
