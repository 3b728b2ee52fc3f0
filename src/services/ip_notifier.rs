use async_trait::async_trait;
use std::net::IpAddr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification timed out")]
    Timeout,
    #[error("Notification delivery failed: {0}")]
    Delivery(#[from] anyhow::Error),
}

#[async_trait]
pub trait IpChangeNotifier: Send + Sync + std::fmt::Debug {
    /// Warns a user that their refresh token was used from a different address.
    ///
    /// # Errors
    /// Returns `NotifyError` if the warning could not be delivered. Callers treat this as
    /// non-fatal.
    async fn notify_ip_change(&self, user_id: Uuid, old_ip: IpAddr, new_ip: IpAddr) -> Result<(), NotifyError>;
}
