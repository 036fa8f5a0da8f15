//! Heartbeat handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::heart_beat::HeartbeatResponse;
use serde_json::Value;
use tracing::debug;

use crate::application::handlers::{to_payload, OcppHandlerV16};
use crate::domain::ProtocolError;

pub async fn handle_heartbeat(handler: &OcppHandlerV16, _payload: Value) -> Result<Value, ProtocolError> {
    debug!(charge_point_id = handler.charge_point_id.as_str(), "Heartbeat");
    handler.services.heartbeat(&handler.charge_point_id).await?;

    to_payload(&HeartbeatResponse {
        current_time: Utc::now(),
    })
}
