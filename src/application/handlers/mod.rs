//! OCPP action handlers
//!
//! One handler set per protocol version. Both share [`ChargingServices`]
//! and differ only in payload shapes.

mod ocpp_v16;
mod ocpp_v16_handler;
mod ocpp_v201;
mod ocpp_v201_handler;

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::connectors::ConnectorTracker;
use crate::application::transactions::TransactionService;
use crate::domain::{BootInfo, ConnectorUpdate, DomainResult, ProtocolError, RepositoryProvider};

pub use ocpp_v16_handler::OcppHandlerV16;
pub use ocpp_v201_handler::OcppHandlerV201;

/// Services every per-connection handler works with.
pub struct ChargingServices {
    pub repos: Arc<dyn RepositoryProvider>,
    pub tracker: Arc<ConnectorTracker>,
    pub transactions: Arc<TransactionService>,
    /// Seconds, sent in BootNotification responses
    pub heartbeat_interval: i32,
}

impl ChargingServices {
    /// Persist boot metadata. `false` means the station is not provisioned.
    pub async fn boot(&self, station_id: &str, boot: &BootInfo) -> DomainResult<bool> {
        let known = self.repos.stations().apply_boot(station_id, boot, Utc::now()).await?;
        if !known {
            warn!(charge_point_id = station_id, "BootNotification from unprovisioned station");
        }
        Ok(known)
    }

    pub async fn heartbeat(&self, station_id: &str) -> DomainResult<()> {
        self.repos.stations().touch(station_id, Utc::now()).await?;
        Ok(())
    }

    /// Connector 0 is the station itself and only logged.
    pub async fn connector_status(
        &self,
        station_id: &str,
        connector_id: i32,
        update: ConnectorUpdate,
    ) -> DomainResult<()> {
        if connector_id <= 0 {
            info!(
                charge_point_id = station_id,
                status = update.status.as_deref().unwrap_or("-"),
                error_code = update.error_code.as_deref().unwrap_or("-"),
                "Station status"
            );
            return Ok(());
        }
        self.tracker.update_status(station_id, connector_id, update).await?;
        Ok(())
    }
}

/// Deserialize a request payload.
pub(crate) fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, ProtocolError> {
    Ok(serde_json::from_value(payload)?)
}

/// Serialize a response payload.
pub(crate) fn to_payload<T: Serialize>(response: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(response).map_err(|e| ProtocolError::Internal(e.to_string()))
}

/// Wire name of a string-valued enum.
pub(crate) fn enum_label<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// A string field of the raw payload, for actions that are only logged.
pub(crate) fn str_field<'a>(payload: &'a Value, pointer: &str) -> &'a str {
    payload.pointer(pointer).and_then(Value::as_str).unwrap_or("-")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::application::authorization::TagResolver;
    use crate::domain::{ChargeTag, LiveTelemetry, Station};
    use crate::infrastructure::InMemoryRepositoryProvider;

    pub struct Harness {
        pub repos: Arc<InMemoryRepositoryProvider>,
        pub services: Arc<ChargingServices>,
        pub live: Arc<LiveTelemetry>,
    }

    /// Station CP1 with tag ABC123.
    pub async fn harness() -> Harness {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.stations().save(Station::new("CP1")).await.unwrap();
        repos.charge_tags().create(ChargeTag::new("ABC123")).await.unwrap();
        let resolver = Arc::new(TagResolver::new(repos.clone(), true));
        let tracker = Arc::new(ConnectorTracker::new(repos.clone()));
        let transactions = Arc::new(TransactionService::new(
            repos.clone(),
            resolver,
            tracker.clone(),
            5,
        ));
        let services = Arc::new(ChargingServices {
            repos: repos.clone(),
            tracker,
            transactions,
            heartbeat_interval: 300,
        });
        Harness {
            repos,
            services,
            live: Arc::new(LiveTelemetry::new()),
        }
    }
}
