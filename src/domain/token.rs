use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use time::OffsetDateTime;
use uuid::Uuid;

/// A persisted refresh token. The plaintext secret is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub issued_ip: IpAddr,
    pub is_used: bool,
    pub created_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// A refresh token about to be inserted. `created_at` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub issued_ip: IpAddr,
}

impl NewRefreshToken {
    /// Builds a fresh, unused token record issued now.
    ///
    /// Timestamps are truncated to microseconds, the resolution Postgres keeps, and
    /// `expires_at` is always at least one microsecond after `issued_at`. Returns `None`
    /// when the expiry falls outside the representable date range.
    #[must_use]
    pub fn issue(user_id: Uuid, token_hash: String, issued_ip: IpAddr, ttl: time::Duration) -> Option<Self> {
        let now = OffsetDateTime::now_utc();
        let issued_at = now.replace_nanosecond(now.microsecond() * 1_000).unwrap_or(now);
        let expires_at = issued_at.checked_add(ttl.max(time::Duration::microseconds(1)))?;

        Some(Self { id: Uuid::new_v4(), user_id, token_hash, issued_at, expires_at, issued_ip })
    }

    #[must_use]
    pub fn into_record(self, created_at: OffsetDateTime) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: self.id,
            user_id: self.user_id,
            token_hash: self.token_hash,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            issued_ip: self.issued_ip,
            is_used: false,
            created_at,
        }
    }
}

/// Claims carried by a signed access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub uid: Uuid,
    pub ip: IpAddr,
    pub jti: Uuid,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    /// `None` if `exp` would overflow.
    #[must_use]
    pub fn new(user_id: Uuid, ip: IpAddr, ttl: time::Duration) -> Option<Self> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Some(Self {
            sub: user_id,
            uid: user_id,
            ip,
            jti: Uuid::new_v4(),
            iat: now,
            nbf: now,
            exp: now.checked_add(ttl.whole_seconds())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
