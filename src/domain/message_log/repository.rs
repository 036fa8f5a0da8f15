use async_trait::async_trait;

use super::model::MessageLogEntry;
use crate::domain::DomainResult;

#[async_trait]
pub trait MessageLogRepository: Send + Sync {
    async fn append(&self, entry: MessageLogEntry) -> DomainResult<()>;

    /// Newest first, at most `limit` entries.
    async fn list_for_station(
        &self,
        station_id: &str,
        limit: u64,
    ) -> DomainResult<Vec<MessageLogEntry>>;
}
