//! Live telemetry held for the lifetime of one connection

use dashmap::DashMap;

use super::model::LiveConnectorMetrics;

/// Per-connector live metrics of one connected station, keyed by connector
/// number. Entries are created on the first sample and dropped with the
/// connection.
#[derive(Debug, Default)]
pub struct LiveTelemetry {
    connectors: DashMap<i32, LiveConnectorMetrics>,
}

impl LiveTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the fields present in `sample`, keeping the others.
    pub fn merge(&self, connector_id: i32, sample: LiveConnectorMetrics) -> LiveConnectorMetrics {
        let mut entry = self.connectors.entry(connector_id).or_default();
        let current = entry.value_mut();
        if sample.charge_rate_kw.is_some() {
            current.charge_rate_kw = sample.charge_rate_kw;
        }
        if sample.meter_kwh.is_some() {
            current.meter_kwh = sample.meter_kwh;
        }
        if sample.soc_percent.is_some() {
            current.soc_percent = sample.soc_percent;
        }
        *current
    }

    pub fn get(&self, connector_id: i32) -> Option<LiveConnectorMetrics> {
        self.connectors.get(&connector_id).map(|m| *m)
    }

    pub fn snapshot(&self) -> Vec<(i32, LiveConnectorMetrics)> {
        let mut all: Vec<_> = self.connectors.iter().map(|e| (*e.key(), *e.value())).collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn clear(&self) {
        self.connectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_missing_from_sample() {
        let live = LiveTelemetry::new();
        live.merge(
            1,
            LiveConnectorMetrics {
                charge_rate_kw: Some(7.0),
                meter_kwh: Some(1.5),
                soc_percent: None,
            },
        );
        let merged = live.merge(
            1,
            LiveConnectorMetrics {
                soc_percent: Some(40.0),
                ..Default::default()
            },
        );
        assert_eq!(merged.charge_rate_kw, Some(7.0));
        assert_eq!(merged.meter_kwh, Some(1.5));
        assert_eq!(merged.soc_percent, Some(40.0));
        assert!(live.get(2).is_none());
    }
}
