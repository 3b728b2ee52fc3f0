use crate::domain::token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::StoreError;
use async_trait::async_trait;
use uuid::Uuid;

/// Result of flipping a token's used flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkUsed {
    /// This call moved the flag from false to true.
    Marked,
    /// The flag was already set; nothing changed.
    AlreadyUsed,
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new record.
    ///
    /// # Errors
    /// Returns `StoreError::Duplicate` if the identifier exists, or `StoreError::Database`
    /// on connectivity failures.
    async fn save(&self, token: &NewRefreshToken) -> Result<RefreshTokenRecord, StoreError>;

    /// # Errors
    /// Returns `StoreError::NotFound` if no record has this identifier.
    async fn get(&self, id: Uuid) -> Result<RefreshTokenRecord, StoreError>;

    /// Sets the used flag as a single atomic check-and-set.
    ///
    /// Concurrent callers on the same identifier see exactly one `MarkUsed::Marked`.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the identifier does not exist.
    async fn mark_used(&self, id: Uuid) -> Result<MarkUsed, StoreError>;

    /// Readiness probe for the backing storage.
    ///
    /// # Errors
    /// Returns `StoreError::Database` if the storage is unreachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
