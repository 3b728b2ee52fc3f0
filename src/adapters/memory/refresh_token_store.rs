use crate::domain::token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::StoreError;
use crate::services::token_store::{MarkUsed, RefreshTokenStore};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

/// Process-local refresh token store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    records: DashMap<Uuid, RefreshTokenRecord>,
}

impl InMemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(&self, token: &NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        match self.records.entry(token.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(token.id)),
            Entry::Vacant(slot) => {
                let record = token.clone().into_record(OffsetDateTime::now_utc());
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<RefreshTokenRecord, StoreError> {
        self.records.get(&id).map(|r| r.value().clone()).ok_or(StoreError::NotFound)
    }

    async fn mark_used(&self, id: Uuid) -> Result<MarkUsed, StoreError> {
        // The shard write lock is held for the whole check-and-set.
        let mut record = self.records.get_mut(&id).ok_or(StoreError::NotFound)?;
        if record.is_used {
            return Ok(MarkUsed::AlreadyUsed);
        }
        record.is_used = true;
        Ok(MarkUsed::Marked)
    }
}
