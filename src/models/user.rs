//! User profile, credentials and login payloads.

use super::role::deserialize_optional_role;
use super::{PermissionSet, Role};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Access/refresh token pair identifying a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Current user as returned by the identity endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub is_active: bool,
    /// ISO 8601, absent before the first login
    #[serde(default)]
    pub last_login: Option<String>,
    pub date_joined: String,
    pub profile: StaffProfile,
}

/// Restaurant-specific part of the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffProfile {
    #[serde(default)]
    pub staff_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_role")]
    pub current_role: Option<Role>,
    #[serde(default)]
    pub permissions: PermissionSet,
    #[serde(default)]
    pub failed_login_attempts: u32,
    #[serde(default)]
    pub is_account_locked: bool,
}

/// Login form submission.
#[derive(Clone, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    /// Collected by the login form; has no effect on persistence.
    #[serde(default, skip_serializing)]
    pub remember_me: bool,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    /// Copy with the username trimmed, as sent to the identity endpoint.
    pub fn normalized(&self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            remember_me: self.remember_me,
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if username.trim().is_empty() {
        let mut err = validator::ValidationError::new("required");
        err.message = Some("Username is required".into());
        return Err(err);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    let (code, message) = if password.is_empty() {
        ("required", "Password is required")
    } else if password.chars().count() < 6 {
        ("length", "Password must be at least 6 characters")
    } else {
        return Ok(());
    };
    let mut err = validator::ValidationError::new(code);
    err.message = Some(message.into());
    Err(err)
}

/// Successful login response from the identity endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

impl LoginResponse {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// First validation message of a failed [`LoginRequest`], in field order.
pub fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    ["username", "password"]
        .iter()
        .filter_map(|field| field_errors.get(*field))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid login request".to_string())
}
