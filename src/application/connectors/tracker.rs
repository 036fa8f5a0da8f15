//! Connector status tracker
//!
//! Persists the last known status and meter of each connector, and keeps
//! the ephemeral live metrics of the connection in step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::units::MeterSnapshot;
use crate::domain::{
    Connector, ConnectorUpdate, DomainResult, LiveConnectorMetrics, LiveTelemetry,
    RepositoryProvider,
};

pub struct ConnectorTracker {
    repos: Arc<dyn RepositoryProvider>,
}

impl ConnectorTracker {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Upsert the persisted connector row. Creates it on first sight.
    pub async fn update_status(
        &self,
        station_id: &str,
        connector_id: i32,
        update: ConnectorUpdate,
    ) -> DomainResult<Connector> {
        if let Some(status) = &update.status {
            info!(
                charge_point_id = station_id,
                connector_id,
                status = status.as_str(),
                "Connector status"
            );
        }
        self.repos
            .connectors()
            .upsert(station_id, connector_id, &update)
            .await
    }

    /// Merge a sample into the live map. Entries exist only while the
    /// station stays connected.
    pub fn update_live_metrics(
        &self,
        live: &LiveTelemetry,
        connector_id: i32,
        sample: LiveConnectorMetrics,
    ) -> LiveConnectorMetrics {
        live.merge(connector_id, sample)
    }

    /// Apply a meter snapshot: live metrics, then the persisted meter.
    ///
    /// Connector 0 (the station itself) is ignored.
    pub async fn record_meter(
        &self,
        station_id: &str,
        connector_id: i32,
        live: &LiveTelemetry,
        snapshot: &MeterSnapshot,
    ) -> DomainResult<()> {
        if connector_id <= 0 || snapshot.is_empty() {
            debug!(charge_point_id = station_id, connector_id, "No connector meter to record");
            return Ok(());
        }

        let merged = self.update_live_metrics(live, connector_id, snapshot.live());
        debug!(
            charge_point_id = station_id,
            connector_id,
            charge_rate_kw = merged.charge_rate_kw,
            meter_kwh = merged.meter_kwh,
            soc = merged.soc_percent,
            "Live metrics updated"
        );

        if let Some(meter) = snapshot.meter_kwh {
            self.update_status(
                station_id,
                connector_id,
                ConnectorUpdate::meter(meter, snapshot.meter_time),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn last_meter(
        &self,
        station_id: &str,
        connector_id: i32,
    ) -> DomainResult<Option<(f64, Option<DateTime<Utc>>)>> {
        let connector = self.repos.connectors().find(station_id, connector_id).await?;
        Ok(connector.and_then(|c| c.last_meter.map(|m| (m, c.last_meter_time))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connectors::units::{RawSample, MEASURAND_ENERGY, MEASURAND_POWER};
    use crate::infrastructure::InMemoryRepositoryProvider;

    #[tokio::test]
    async fn meter_updates_live_map_and_persisted_row() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let tracker = ConnectorTracker::new(repos.clone());
        let live = LiveTelemetry::new();

        let samples = vec![
            RawSample::new("7018", Some(MEASURAND_POWER), Some("W")),
            RawSample::new("2662", Some(MEASURAND_ENERGY), Some("Wh")),
        ];
        let snapshot = MeterSnapshot::from_values([(Utc::now(), samples.as_slice())]);
        tracker.record_meter("CP1", 1, &live, &snapshot).await.unwrap();

        let metrics = live.get(1).unwrap();
        assert!((metrics.charge_rate_kw.unwrap() - 7.018).abs() < 1e-9);
        let (meter, time) = tracker.last_meter("CP1", 1).await.unwrap().unwrap();
        assert!((meter - 2.662).abs() < 1e-9);
        assert!(time.is_some());
    }

    #[tokio::test]
    async fn connector_zero_is_not_tracked() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let tracker = ConnectorTracker::new(repos.clone());
        let live = LiveTelemetry::new();
        let samples = vec![RawSample::new("1000", None, None)];
        let snapshot = MeterSnapshot::from_values([(Utc::now(), samples.as_slice())]);

        tracker.record_meter("CP1", 0, &live, &snapshot).await.unwrap();
        assert!(live.snapshot().is_empty());
        assert!(repos.connectors().list_for_station("CP1").await.unwrap().is_empty());
    }
}
