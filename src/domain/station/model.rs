//! Station domain entity

use chrono::{DateTime, Utc};

/// A charging station known to the central system.
///
/// Stations are provisioned externally. The protocol engine only updates the
/// reported metadata and the last-seen clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Station {
    /// External identifier (last path segment of the WebSocket URL)
    pub station_id: String,
    pub name: Option<String>,
    /// Basic-auth username. When `None` the station id is expected.
    pub username: Option<String>,
    /// Basic-auth password, plain text or a bcrypt hash
    pub password: Option<String>,
    /// SHA-256 thumbprint of the client certificate (hex)
    pub client_cert_thumbprint: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub charge_point_serial: Option<String>,
    pub charge_box_serial: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub meter_type: Option<String>,
    pub meter_serial: Option<String>,
    /// Clock value reported by the last BootNotification
    pub current_time: Option<DateTime<Utc>>,
    pub heartbeat_interval: Option<i32>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Station {
    pub fn new(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            ..Default::default()
        }
    }

    /// True when Basic credentials are on file.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }

    pub fn apply_boot(&mut self, boot: &BootInfo, now: DateTime<Utc>) {
        self.vendor = Some(boot.vendor.clone());
        self.model = Some(boot.model.clone());
        self.charge_point_serial = boot.charge_point_serial.clone();
        self.charge_box_serial = boot.charge_box_serial.clone();
        self.firmware_version = boot.firmware_version.clone();
        self.iccid = boot.iccid.clone();
        self.imsi = boot.imsi.clone();
        self.meter_type = boot.meter_type.clone();
        self.meter_serial = boot.meter_serial.clone();
        self.current_time = Some(now);
        self.last_seen = Some(now);
    }
}

/// Metadata reported by a BootNotification (either protocol version).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootInfo {
    pub vendor: String,
    pub model: String,
    pub charge_point_serial: Option<String>,
    pub charge_box_serial: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub meter_type: Option<String>,
    pub meter_serial: Option<String>,
}
