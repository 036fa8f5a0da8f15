//! OCPP 1.6 protocol handler
//!
//! Dispatches station calls to the action handlers and classifies answers
//! to our commands with the 1.6 status vocabulary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::ocpp_v16::action_matcher;
use super::ChargingServices;
use crate::application::commands::answer_status;
use crate::domain::{
    CommandStatus, CommandType, LiveTelemetry, OcppVersion, ProtocolError, ProtocolHandler,
};

pub struct OcppHandlerV16 {
    pub charge_point_id: String,
    pub services: Arc<ChargingServices>,
    pub live: Arc<LiveTelemetry>,
}

impl OcppHandlerV16 {
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
impl ProtocolHandler for OcppHandlerV16 {
    async fn handle_call(&self, action: &str, payload: Value) -> Result<Value, ProtocolError> {
        action_matcher(self, action, payload).await
    }

    fn version(&self) -> OcppVersion {
        OcppVersion::V16
    }

    fn station_id(&self) -> &str {
        &self.charge_point_id
    }

    fn answer_status(&self, command: CommandType, payload: &Value) -> CommandStatus {
        answer_status(OcppVersion::V16, command, payload)
    }
}
