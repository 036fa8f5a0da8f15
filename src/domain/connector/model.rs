//! Connector domain entity

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Last known persisted state of one connector on a station.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub station_id: String,
    pub connector_id: i32,
    pub name: Option<String>,
    pub last_status: Option<String>,
    pub last_status_time: Option<DateTime<Utc>>,
    /// Meter reading in kWh
    pub last_meter: Option<f64>,
    pub last_meter_time: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error_code: Option<String>,
}

impl Connector {
    pub fn new(station_id: impl Into<String>, connector_id: i32) -> Self {
        Self {
            station_id: station_id.into(),
            connector_id,
            name: None,
            last_status: None,
            last_status_time: None,
            last_meter: None,
            last_meter_time: None,
            error_code: None,
            info: None,
            vendor_id: None,
            vendor_error_code: None,
        }
    }

    /// Merge an update. Absent fields keep their stored value.
    pub fn apply(&mut self, update: &ConnectorUpdate) {
        if let Some(status) = &update.status {
            self.last_status = Some(status.clone());
            self.last_status_time = update.status_time.or(Some(Utc::now()));
            self.error_code = update.error_code.clone();
            self.info = update.info.clone();
            self.vendor_id = update.vendor_id.clone();
            self.vendor_error_code = update.vendor_error_code.clone();
        }
        if let Some(meter) = update.meter_kwh {
            self.last_meter = Some(meter);
            self.last_meter_time = update.meter_time.or(Some(Utc::now()));
        }
    }
}

/// Partial connector change produced by status and meter events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorUpdate {
    pub status: Option<String>,
    pub status_time: Option<DateTime<Utc>>,
    pub meter_kwh: Option<f64>,
    pub meter_time: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error_code: Option<String>,
}

impl ConnectorUpdate {
    pub fn status(status: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            status: Some(status.into()),
            status_time: Some(time),
            ..Default::default()
        }
    }

    pub fn meter(meter_kwh: f64, time: Option<DateTime<Utc>>) -> Self {
        Self {
            meter_kwh: Some(meter_kwh),
            meter_time: time,
            ..Default::default()
        }
    }

    pub fn with_meter(mut self, meter_kwh: f64, time: Option<DateTime<Utc>>) -> Self {
        self.meter_kwh = Some(meter_kwh);
        self.meter_time = time;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.meter_kwh.is_none()
    }
}

/// Ephemeral telemetry for one online connector, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LiveConnectorMetrics {
    pub charge_rate_kw: Option<f64>,
    pub meter_kwh: Option<f64>,
    pub soc_percent: Option<f64>,
}
