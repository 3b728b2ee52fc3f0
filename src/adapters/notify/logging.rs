use crate::services::ip_notifier::{IpChangeNotifier, NotifyError};
use async_trait::async_trait;
use std::net::IpAddr;
use uuid::Uuid;

/// Records IP-change warnings as structured log events instead of delivering them.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl IpChangeNotifier for LoggingNotifier {
    async fn notify_ip_change(&self, user_id: Uuid, old_ip: IpAddr, new_ip: IpAddr) -> Result<(), NotifyError> {
        tracing::info!(user_id = %user_id, old_ip = %old_ip, new_ip = %new_ip, "IP change warning issued");
        Ok(())
    }
}
