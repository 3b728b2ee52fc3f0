use crate::adapters::database::DbPool;
use crate::adapters::database::records::RefreshTokenRow;
use crate::domain::token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::StoreError;
use crate::services::token_store::{MarkUsed, RefreshTokenStore};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgRefreshTokenStore {
    pool: DbPool,
}

impl PgRefreshTokenStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    /// Creates a new refresh token record.
    /// Note: We store the HASH, not the raw secret.
    #[tracing::instrument(level = "debug", skip(self, token), fields(token_id = %token.id), err)]
    async fn save(&self, token: &NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r"
            INSERT INTO refresh_tokens (id, user_id, token_hash, issued_at, expires_at, issued_ip)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, token_hash, issued_at, expires_at, issued_ip, is_used, created_at
            ",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.issued_ip)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate(token.id),
            other => StoreError::Database(other),
        })?;

        Ok(row.into())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn get(&self, id: Uuid) -> Result<RefreshTokenRecord, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r"
            SELECT id, user_id, token_hash, issued_at, expires_at, issued_ip, is_used, created_at
            FROM refresh_tokens
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(StoreError::NotFound)
    }

    /// The conditional UPDATE takes the row lock, so racing callers serialize and only
    /// the first one sees a returned row.
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn mark_used(&self, id: Uuid) -> Result<MarkUsed, StoreError> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE refresh_tokens SET is_used = TRUE WHERE id = $1 AND is_used = FALSE RETURNING id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(MarkUsed::Marked);
        }

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if exists { Ok(MarkUsed::AlreadyUsed) } else { Err(StoreError::NotFound) }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
