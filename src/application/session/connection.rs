//! Live station connection

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::SessionError;
use crate::domain::{LiveTelemetry, OcppVersion};

/// Handle to one open station socket. Cloning shares the outbox, the
/// wake-up signal and the live telemetry.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Distinguishes a reconnect from the session it replaces
    pub connection_id: Uuid,
    pub station_id: String,
    pub version: OcppVersion,
    sender: mpsc::UnboundedSender<String>,
    /// Signalled when a command is queued for this station
    pub wake: Arc<Notify>,
    pub live: Arc<LiveTelemetry>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        station_id: impl Into<String>,
        version: OcppVersion,
        sender: mpsc::UnboundedSender<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            connection_id: Uuid::new_v4(),
            station_id: station_id.into(),
            version,
            sender,
            wake: Arc::new(Notify::new()),
            live: Arc::new(LiveTelemetry::new()),
            connected_at: now,
            last_activity: now,
        }
    }

    /// Queue a text frame for the socket writer.
    pub fn send(&self, message: String) -> Result<(), SessionError> {
        self.sender
            .send(message)
            .map_err(|_| SessionError::Closed(self.station_id.clone()))
    }

    /// The writer task still holds the receiving end.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn outbox(&self) -> mpsc::UnboundedSender<String> {
        self.sender.clone()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
