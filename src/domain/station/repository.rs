//! Station repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{BootInfo, Station};
use crate::domain::DomainResult;

#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn find_by_id(&self, station_id: &str) -> DomainResult<Option<Station>>;

    /// Insert or replace a station row (provisioning / tests).
    async fn save(&self, station: Station) -> DomainResult<()>;

    /// Persist BootNotification metadata. Returns `false` for an unknown station.
    async fn apply_boot(
        &self,
        station_id: &str,
        boot: &BootInfo,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Update the last-seen clock. Returns `false` for an unknown station.
    async fn touch(&self, station_id: &str, now: DateTime<Utc>) -> DomainResult<bool>;
}
