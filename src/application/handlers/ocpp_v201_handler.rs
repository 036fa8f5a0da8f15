//! OCPP 2.0.1 protocol handler
//!
//! Dispatches station calls to the action handlers and classifies answers
//! to our commands with the 2.0.1 status vocabulary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::ocpp_v201::action_matcher;
use super::ChargingServices;
use crate::application::commands::answer_status;
use crate::domain::{
    CommandStatus, CommandType, LiveTelemetry, OcppVersion, ProtocolError, ProtocolHandler,
};

pub struct OcppHandlerV201 {
    pub charge_point_id: String,
    pub services: Arc<ChargingServices>,
    pub live: Arc<LiveTelemetry>,
}

impl OcppHandlerV201 {
    pub fn new(
        charge_point_id: impl Into<String>,
        services: Arc<ChargingServices>,
        live: Arc<LiveTelemetry>,
    ) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            services,
            live,
        }
    }
}

#[async_trait]
impl ProtocolHandler for OcppHandlerV201 {
    async fn handle_call(&self, action: &str, payload: Value) -> Result<Value, ProtocolError> {
        action_matcher(self, action, payload).await
    }

    fn version(&self) -> OcppVersion {
        OcppVersion::V201
    }

    fn station_id(&self) -> &str {
        &self.charge_point_id
    }

    fn answer_status(&self, command: CommandType, payload: &Value) -> CommandStatus {
        answer_status(OcppVersion::V201, command, payload)
    }
}
