//! Transaction domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a charging session. `Completed` and `Terminated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Started,
    Terminated,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Terminated => "Terminated",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Started" => Self::Started,
            "Completed" => Self::Completed,
            _ => Self::Terminated,
        }
    }

    pub fn is_open(&self) -> bool {
        *self == Self::Started
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One charging session on a (station, connector).
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i32,
    pub station_id: String,
    pub connector_id: i32,
    /// Transaction id assigned by an OCPP 2.0.1 station
    pub device_uid: Option<String>,
    pub start_tag_pk: i32,
    pub start_tag_id: String,
    pub start_time: DateTime<Utc>,
    /// kWh
    pub meter_start: f64,
    pub stop_tag_pk: Option<i32>,
    pub stop_tag_id: Option<String>,
    pub stop_time: Option<DateTime<Utc>>,
    /// kWh
    pub meter_stop: Option<f64>,
    pub stop_reason: Option<String>,
    pub status: TransactionStatus,
    /// Sampled values reported with the stop, serialized as JSON
    pub transaction_data: Option<String>,
}

impl Transaction {
    /// Energy charged in kWh, once stopped.
    pub fn energy_kwh(&self) -> Option<f64> {
        self.meter_stop.map(|stop| stop - self.meter_start)
    }
}

/// Data for opening a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub station_id: String,
    pub connector_id: i32,
    pub device_uid: Option<String>,
    pub start_tag_pk: i32,
    pub start_tag_id: String,
    pub start_time: DateTime<Utc>,
    pub meter_start: f64,
}

impl NewTransaction {
    pub fn into_transaction(self, id: i32) -> Transaction {
        Transaction {
            id,
            station_id: self.station_id,
            connector_id: self.connector_id,
            device_uid: self.device_uid,
            start_tag_pk: self.start_tag_pk,
            start_tag_id: self.start_tag_id,
            start_time: self.start_time,
            meter_start: self.meter_start,
            stop_tag_pk: None,
            stop_tag_id: None,
            stop_time: None,
            meter_stop: None,
            stop_reason: None,
            status: TransactionStatus::Started,
            transaction_data: None,
        }
    }
}

/// Data for closing a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStop {
    pub stop_tag_pk: Option<i32>,
    pub stop_tag_id: Option<String>,
    pub stop_time: DateTime<Utc>,
    pub meter_stop: f64,
    pub reason: Option<String>,
    pub transaction_data: Option<String>,
    pub status: TransactionStatus,
}

impl TransactionStop {
    pub fn apply_to(&self, tx: &mut Transaction) {
        tx.stop_tag_pk = self.stop_tag_pk;
        tx.stop_tag_id = self.stop_tag_id.clone();
        tx.stop_time = Some(self.stop_time);
        tx.meter_stop = Some(self.meter_stop);
        tx.stop_reason = self.reason.clone();
        tx.transaction_data = self.transaction_data.clone();
        tx.status = self.status;
    }
}
