use crate::config::AuthConfig;
use crate::domain::token::AccessTokenClaims;
use crate::error::AppError;
use argon2::{
    Algorithm as Argon2Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::{RngCore, rngs::OsRng};
use std::net::IpAddr;
use thiserror::Error;
use uuid::Uuid;

pub const REFRESH_SECRET_LEN: usize = 32;

const DELIMITER: char = ':';

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Malformed refresh token")]
pub struct MalformedToken;

/// Turns key material into transportable token strings and back.
#[derive(Clone)]
pub struct CredentialCodec {
    encoding_key: EncodingKey,
    hash_params: Params,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec").field("hash_params", &self.hash_params).finish_non_exhaustive()
    }
}

impl CredentialCodec {
    /// # Errors
    /// Returns an error if the configured Argon2 cost parameters are out of range.
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let hash_params = Params::new(config.hash_memory_kib, config.hash_iterations, config.hash_parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid refresh secret hash parameters: {e}"))?;

        Ok(Self { encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()), hash_params })
    }

    /// Signs a fresh set of access token claims with HS512.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the expiry overflows, or `AppError::Signing` if
    /// signing fails.
    pub fn mint_access_token(&self, user_id: Uuid, ip: IpAddr, ttl: time::Duration) -> Result<String, AppError> {
        let claims = AccessTokenClaims::new(user_id, ip, ttl).ok_or_else(|| {
            tracing::error!(ttl_secs = ttl.whole_seconds(), "Access token expiry out of range");
            AppError::Internal
        })?;
        Ok(encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)?)
    }

    /// Draws a new refresh secret from the OS random source.
    ///
    /// # Errors
    /// Returns `rand::Error` if the OS random source is unavailable.
    pub fn generate_refresh_secret() -> Result<[u8; REFRESH_SECRET_LEN], rand::Error> {
        let mut bytes = [0u8; REFRESH_SECRET_LEN];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(bytes)
    }

    /// Hashes a refresh secret with Argon2id for storage. CPU heavy, call from a blocking context.
    ///
    /// # Errors
    /// Returns `argon2::password_hash::Error` if hashing fails.
    pub fn hash_secret(&self, secret: &[u8]) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, self.hash_params.clone());
        Ok(argon2.hash_password(secret, &salt)?.to_string())
    }

    /// Checks a secret against a stored hash. An unparsable hash never matches.
    #[must_use]
    pub fn verify_secret(secret: &[u8], hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            tracing::warn!("Stored refresh token hash could not be parsed");
            return false;
        };
        Argon2::default().verify_password(secret, &parsed_hash).is_ok()
    }

    #[must_use]
    pub fn encode_refresh_token(id: Uuid, secret: &[u8]) -> String {
        let payload = format!("{}{DELIMITER}{}", id.hyphenated(), URL_SAFE_NO_PAD.encode(secret));
        URL_SAFE_NO_PAD.encode(payload)
    }

    /// Splits a refresh token string into its identifier and secret.
    ///
    /// Only the canonical encoding is accepted, so two different strings never decode to
    /// the same pair.
    ///
    /// # Errors
    /// Returns `MalformedToken` on invalid base64, a missing delimiter, a non-canonical
    /// identifier, or a secret of the wrong length.
    pub fn decode_refresh_token(token: &str) -> Result<(Uuid, Vec<u8>), MalformedToken> {
        let payload = URL_SAFE_NO_PAD.decode(token).map_err(|_| MalformedToken)?;
        let payload = String::from_utf8(payload).map_err(|_| MalformedToken)?;
        let (id_part, secret_part) = payload.split_once(DELIMITER).ok_or(MalformedToken)?;

        let id = Uuid::parse_str(id_part).map_err(|_| MalformedToken)?;
        if id.hyphenated().to_string() != id_part {
            return Err(MalformedToken);
        }

        let secret = URL_SAFE_NO_PAD.decode(secret_part).map_err(|_| MalformedToken)?;
        if secret.len() != REFRESH_SECRET_LEN {
            return Err(MalformedToken);
        }

        Ok((id, secret))
    }
}
