//! Outbound command entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::OcppVersion;

/// Delivery state of an outbound command.
///
/// `Queued → Sent → Completed | Failed`, and `Queued → Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    Queued,
    Sent,
    Completed,
    Failed,
    Cancelled,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Sent => "Sent",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Queued" => Some(Self::Queued),
            "Sent" => Some(Self::Sent),
            "Completed" => Some(Self::Completed),
            "Failed" => Some(Self::Failed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of server-initiated command. The wire action depends on the
/// protocol version negotiated by the target station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    Reset,
    UnlockConnector,
    ChangeAvailability,
    ClearCache,
    TriggerMessage,
    ReserveNow,
    CancelReservation,
    ChangeConfiguration,
    SetChargingProfile,
    ClearChargingProfile,
    UpdateFirmware,
    RemoteStartTransaction,
    RemoteStopTransaction,
    DataTransfer,
}

impl CommandType {
    pub const ALL: [CommandType; 14] = [
        Self::Reset,
        Self::UnlockConnector,
        Self::ChangeAvailability,
        Self::ClearCache,
        Self::TriggerMessage,
        Self::ReserveNow,
        Self::CancelReservation,
        Self::ChangeConfiguration,
        Self::SetChargingProfile,
        Self::ClearChargingProfile,
        Self::UpdateFirmware,
        Self::RemoteStartTransaction,
        Self::RemoteStopTransaction,
        Self::DataTransfer,
    ];

    /// Stored name (same as the OCPP 1.6 action).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reset => "Reset",
            Self::UnlockConnector => "UnlockConnector",
            Self::ChangeAvailability => "ChangeAvailability",
            Self::ClearCache => "ClearCache",
            Self::TriggerMessage => "TriggerMessage",
            Self::ReserveNow => "ReserveNow",
            Self::CancelReservation => "CancelReservation",
            Self::ChangeConfiguration => "ChangeConfiguration",
            Self::SetChargingProfile => "SetChargingProfile",
            Self::ClearChargingProfile => "ClearChargingProfile",
            Self::UpdateFirmware => "UpdateFirmware",
            Self::RemoteStartTransaction => "RemoteStartTransaction",
            Self::RemoteStopTransaction => "RemoteStopTransaction",
            Self::DataTransfer => "DataTransfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Action name on the wire for the given protocol version.
    pub fn action(&self, version: OcppVersion) -> &'static str {
        match (version, self) {
            (OcppVersion::V201, Self::ChangeConfiguration) => "SetVariables",
            (OcppVersion::V201, Self::RemoteStartTransaction) => "RequestStartTransaction",
            (OcppVersion::V201, Self::RemoteStopTransaction) => "RequestStopTransaction",
            _ => self.as_str(),
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted outbound command.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCommand {
    pub id: i32,
    /// Correlation id used as the Call's uniqueId
    pub uid: String,
    pub station_id: String,
    pub connector_id: Option<i32>,
    /// Tag a remote start or stop runs under
    pub tag_id: Option<String>,
    pub command_type: CommandType,
    pub payload: Value,
    pub status: CommandStatus,
    /// Raw answer payload (or error text) once answered
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for queueing a command.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommand {
    pub uid: String,
    pub station_id: String,
    pub connector_id: Option<i32>,
    pub tag_id: Option<String>,
    pub command_type: CommandType,
    pub payload: Value,
}

impl NewCommand {
    pub fn into_command(self, id: i32, now: DateTime<Utc>) -> OutboundCommand {
        OutboundCommand {
            id,
            uid: self.uid,
            station_id: self.station_id,
            connector_id: self.connector_id,
            tag_id: self.tag_id,
            command_type: self.command_type,
            payload: self.payload,
            status: CommandStatus::Queued,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}
