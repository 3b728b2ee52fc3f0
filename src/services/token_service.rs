use crate::config::{AuthConfig, MAX_TTL_SECS, NotificationConfig};
use crate::domain::token::{NewRefreshToken, TokenPair};
use crate::error::{AppError, Result, StoreError};
use crate::services::credential_codec::{CredentialCodec, REFRESH_SECRET_LEN};
use crate::services::ip_notifier::{IpChangeNotifier, NotifyError};
use crate::services::token_store::{MarkUsed, RefreshTokenStore};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    issued_total: Counter<u64>,
    rotated_total: Counter<u64>,
    rejected_total: Counter<u64>,
    ip_change_notifications_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("ipbound-auth");
        Self {
            issued_total: meter
                .u64_counter("auth_token_pairs_issued_total")
                .with_description("Total number of token pairs issued")
                .build(),
            rotated_total: meter
                .u64_counter("auth_refresh_rotations_total")
                .with_description("Total number of successful refresh token rotations")
                .build(),
            rejected_total: meter
                .u64_counter("auth_refresh_rejected_total")
                .with_description("Refresh attempts rejected, by reason")
                .build(),
            ip_change_notifications_total: meter
                .u64_counter("auth_ip_change_notifications_total")
                .with_description("IP change warnings attempted, by outcome")
                .build(),
        }
    }
}

/// Issues token pairs and rotates refresh tokens.
///
/// Holds no mutable state of its own; every decision about a refresh token is made
/// against the store.
#[derive(Clone, Debug)]
pub struct TokenService {
    codec: Arc<CredentialCodec>,
    store: Arc<dyn RefreshTokenStore>,
    notifier: Arc<dyn IpChangeNotifier>,
    access_ttl: time::Duration,
    refresh_ttl: time::Duration,
    notify_timeout: Duration,
    metrics: Metrics,
}

impl TokenService {
    /// # Errors
    /// Returns an error if the secret hashing parameters are invalid or a TTL exceeds
    /// `MAX_TTL_SECS`.
    pub fn new(
        auth: &AuthConfig,
        notifications: &NotificationConfig,
        store: Arc<dyn RefreshTokenStore>,
        notifier: Arc<dyn IpChangeNotifier>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            codec: Arc::new(CredentialCodec::new(auth)?),
            store,
            notifier,
            access_ttl: ttl_from_secs("access", auth.access_token_ttl_secs)?,
            refresh_ttl: ttl_from_secs("refresh", auth.refresh_token_ttl_secs)?,
            notify_timeout: Duration::from_millis(notifications.timeout_ms),
            metrics: Metrics::new(),
        })
    }

    /// Mints an access token and a fresh refresh token bound to `ip`.
    ///
    /// Nothing is returned unless the refresh token record was persisted.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, ip = %ip), err(level = "warn"))]
    pub async fn create_token_pair(&self, user_id: Uuid, ip: IpAddr) -> Result<TokenPair> {
        let access_token = self.codec.mint_access_token(user_id, ip, self.access_ttl)?;

        let secret = CredentialCodec::generate_refresh_secret().map_err(|e| {
            tracing::error!(error = %e, "OS random source failed");
            AppError::Internal
        })?;
        let token_hash = self.hash_secret(secret).await?;

        let token = NewRefreshToken::issue(user_id, token_hash, ip, self.refresh_ttl).ok_or_else(|| {
            tracing::error!(ttl_secs = self.refresh_ttl.whole_seconds(), "Refresh token expiry out of range");
            AppError::Internal
        })?;
        let record = self.store.save(&token).await?;
        let refresh_token = CredentialCodec::encode_refresh_token(record.id, &secret);

        self.metrics.issued_total.add(1, &[]);
        Ok(TokenPair { access_token, refresh_token })
    }

    /// Consumes a refresh token and issues a new pair for the same user.
    ///
    /// Checks run in a fixed order (decode, lookup, expiry, reuse, secret) and stop at the
    /// first failure without touching the stored record.
    #[tracing::instrument(
        skip(self, refresh_token),
        fields(ip = %ip, token_id = tracing::field::Empty, user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn refresh_tokens(&self, refresh_token: &str, ip: IpAddr) -> Result<TokenPair> {
        let result = self.rotate(refresh_token, ip).await;
        if let Err(e) = &result {
            self.metrics.rejected_total.add(1, &[KeyValue::new("reason", e.kind())]);
        }
        result
    }

    async fn rotate(&self, refresh_token: &str, ip: IpAddr) -> Result<TokenPair> {
        let (token_id, secret) =
            CredentialCodec::decode_refresh_token(refresh_token).map_err(|_| AppError::InvalidToken)?;
        tracing::Span::current().record("token_id", tracing::field::display(token_id));

        let record = match self.store.get(token_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Err(AppError::InvalidToken),
            Err(e) => return Err(e.into()),
        };
        tracing::Span::current().record("user_id", tracing::field::display(record.user_id));

        if record.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(AppError::TokenExpired);
        }

        if record.is_used {
            tracing::warn!("Refresh token reuse detected");
            return Err(AppError::TokenAlreadyUsed);
        }

        if !self.verify_secret(secret, record.token_hash.clone()).await? {
            return Err(AppError::InvalidToken);
        }

        match self.store.mark_used(token_id).await {
            Ok(MarkUsed::Marked) => {}
            Ok(MarkUsed::AlreadyUsed) => {
                tracing::warn!("Refresh token reuse detected (concurrent rotation)");
                return Err(AppError::TokenAlreadyUsed);
            }
            Err(StoreError::NotFound) => return Err(AppError::InvalidToken),
            Err(e) => return Err(e.into()),
        }

        if ip != record.issued_ip {
            self.warn_ip_change(record.user_id, record.issued_ip, ip).await;
        }

        let pair = self.create_token_pair(record.user_id, ip).await?;

        tracing::info!("Tokens rotated successfully");
        self.metrics.rotated_total.add(1, &[]);
        Ok(pair)
    }

    /// Best effort: failures and timeouts are logged, never returned.
    async fn warn_ip_change(&self, user_id: Uuid, old_ip: IpAddr, new_ip: IpAddr) {
        tracing::warn!(old_ip = %old_ip, new_ip = %new_ip, "Refresh token presented from a new IP address");

        let attempt = tokio::time::timeout(self.notify_timeout, self.notifier.notify_ip_change(user_id, old_ip, new_ip));
        let result = attempt.await.unwrap_or(Err(NotifyError::Timeout));

        let outcome = match result {
            Ok(()) => "sent",
            Err(NotifyError::Timeout) => {
                tracing::error!(timeout_ms = %self.notify_timeout.as_millis(), "IP change warning timed out");
                "timeout"
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send IP change warning");
                "failed"
            }
        };
        self.metrics.ip_change_notifications_total.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    async fn hash_secret(&self, secret: [u8; REFRESH_SECRET_LEN]) -> Result<String> {
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || codec.hash_secret(&secret))
            .await
            .map_err(|_| AppError::Internal)?
            .map_err(|e| {
                tracing::error!(error = %e, "Refresh secret hashing failed");
                AppError::Internal
            })
    }

    async fn verify_secret(&self, secret: Vec<u8>, token_hash: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || CredentialCodec::verify_secret(&secret, &token_hash))
            .await
            .map_err(|_| AppError::Internal)
    }
}

fn ttl_from_secs(kind: &str, secs: u64) -> anyhow::Result<time::Duration> {
    anyhow::ensure!(secs <= MAX_TTL_SECS, "{kind} token TTL of {secs}s exceeds the maximum of {MAX_TTL_SECS}s");
    Ok(time::Duration::seconds(i64::try_from(secs)?))
}
