//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use crate::session::{QueryPolicy, TokenStorage};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Externally visible base URL of the portal
    pub public_url: String,
    /// Base URL of the identity API (`/login`, `/profile`, `/logout` below it)
    pub identity_url: String,
    /// Serve the identity API from this process under `/api/auth`
    pub embedded_identity: bool,
    pub identity_timeout: Duration,

    // --- Secrets ---
    /// JWT signing key for identity tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Server-side secret mixed into password hashes
    pub password_pepper: Vec<u8>,

    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub seed_demo_accounts: bool,

    // --- Session behavior ---
    pub session_stale_after: Duration,
    pub session_max_retries: u32,
    pub session_retry_delay: Duration,
    /// Directory for per-session credential files; `None` keeps them in memory
    pub token_store_dir: Option<PathBuf>,
    pub session_idle: Duration,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
            identity_url: "http://localhost:8080/api/auth".to_string(),
            embedded_identity: true,
            identity_timeout: Duration::from_secs(10),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            password_pepper: b"test_pepper".to_vec(),
            access_token_ttl: Duration::from_secs(3600),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            seed_demo_accounts: true,
            session_stale_after: Duration::from_secs(300),
            session_max_retries: 3,
            session_retry_delay: Duration::from_millis(10),
            token_store_dir: None,
            session_idle: Duration::from_secs(24 * 3600),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let public_url = env::var("PUBLIC_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let identity_url = env::var("IDENTITY_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("{public_url}/api/auth"));

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            identity_url,
            public_url,
            embedded_identity: parse_or("EMBEDDED_IDENTITY", true)?,
            identity_timeout: Duration::from_secs(parse_or("IDENTITY_TIMEOUT_SECS", 10)?),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            password_pepper: env::var("PASSWORD_PEPPER")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PASSWORD_PEPPER"))?
                .into_bytes(),

            access_token_ttl: Duration::from_secs(parse_or("ACCESS_TOKEN_TTL_SECS", 3600)?),
            refresh_token_ttl: Duration::from_secs(parse_or("REFRESH_TOKEN_TTL_SECS", 604_800)?),
            seed_demo_accounts: parse_or("SEED_DEMO_ACCOUNTS", false)?,

            session_stale_after: Duration::from_secs(parse_or("SESSION_STALE_SECS", 300)?),
            session_max_retries: parse_or("SESSION_MAX_RETRIES", 3)?,
            session_retry_delay: Duration::from_millis(parse_or("SESSION_RETRY_DELAY_MS", 500)?),
            token_store_dir: env::var("TOKEN_STORE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            session_idle: Duration::from_secs(parse_or("SESSION_IDLE_SECS", 86_400)?),
        })
    }

    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy {
            stale_after: self.session_stale_after,
            max_retries: self.session_max_retries,
            retry_delay: self.session_retry_delay,
        }
    }

    pub fn token_storage(&self) -> TokenStorage {
        match &self.token_store_dir {
            Some(dir) => TokenStorage::Directory(dir.clone()),
            None => TokenStorage::Memory,
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        _ => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("PASSWORD_PEPPER", " pepper ");
        env::set_var("PUBLIC_URL", "https://portal.example.com/");
        env::set_var("SESSION_MAX_RETRIES", "2");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.password_pepper, b"pepper");
        assert_eq!(config.public_url, "https://portal.example.com");
        assert_eq!(config.identity_url, "https://portal.example.com/api/auth");
        assert!(config.secure_cookies());
        assert_eq!(config.query_policy().max_retries, 2);
        assert_eq!(config.access_token_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_default_is_memory_storage() {
        let config = Config::test_default();
        assert!(matches!(config.token_storage(), TokenStorage::Memory));
        assert!(!config.secure_cookies());
    }
}
