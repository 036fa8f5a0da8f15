//! Connector repository interface

use async_trait::async_trait;

use super::model::{Connector, ConnectorUpdate};
use crate::domain::DomainResult;

#[async_trait]
pub trait ConnectorRepository: Send + Sync {
    async fn find(&self, station_id: &str, connector_id: i32) -> DomainResult<Option<Connector>>;

    /// Apply `update` to the (station, connector) row, creating it on first sight.
    async fn upsert(
        &self,
        station_id: &str,
        connector_id: i32,
        update: &ConnectorUpdate,
    ) -> DomainResult<Connector>;

    async fn list_for_station(&self, station_id: &str) -> DomainResult<Vec<Connector>>;
}
