// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access/refresh token issuance and verification.

use crate::models::Credentials;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Unique token id, used for revocation
    pub jti: String,
    pub kind: TokenKind,
    /// Account token version at issue time; bumped by a password change
    #[serde(default)]
    pub ver: u32,
}

impl Claims {
    pub fn user_id(&self) -> Option<u64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is invalid or expired")]
    Invalid,
    #[error("Token has the wrong type")]
    WrongKind,
    #[error("Token has been revoked")]
    Revoked,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// Revoked refresh token ids and their expiry.
    revoked: DashMap<String, usize>,
    rng: SystemRandom,
}

impl TokenIssuer {
    pub fn new(signing_key: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            access_ttl,
            refresh_ttl,
            revoked: DashMap::new(),
            rng: SystemRandom::new(),
        }
    }

    fn token_id(&self) -> anyhow::Result<String> {
        let mut bytes = [0u8; 16];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("System RNG failure"))?;
        Ok(hex::encode(bytes))
    }

    pub fn issue(&self, user_id: u64, version: u32, kind: TokenKind) -> anyhow::Result<String> {
        let now = Utc::now().timestamp().max(0) as usize;
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as usize,
            jti: self.token_id()?,
            kind,
            ver: version,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    pub fn issue_pair(&self, user_id: u64, version: u32) -> anyhow::Result<Credentials> {
        Ok(Credentials {
            access_token: self.issue(user_id, version, TokenKind::Access)?,
            refresh_token: self.issue(user_id, version, TokenKind::Refresh)?,
        })
    }

    /// Decode `token`, checking signature, expiry, kind and revocation.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if claims.kind != kind {
            return Err(TokenError::WrongKind);
        }
        if self.revoked.contains_key(&claims.jti) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new access token of the same version.
    pub fn refresh(&self, refresh_token: &str) -> Result<(Claims, String), TokenError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        let user_id = claims.user_id().ok_or(TokenError::Invalid)?;
        let access = self
            .issue(user_id, claims.ver, TokenKind::Access)
            .map_err(|_| TokenError::Invalid)?;
        Ok((claims, access))
    }

    /// Blacklist a refresh token. Revoking twice is an error.
    pub fn revoke(&self, refresh_token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.revoked.insert(claims.jti.clone(), claims.exp);
        Ok(claims)
    }

    /// Forget revocations whose tokens have expired anyway.
    pub fn purge_expired_revocations(&self) -> usize {
        let now = Utc::now().timestamp().max(0) as usize;
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before.saturating_sub(self.revoked.len())
    }
}
