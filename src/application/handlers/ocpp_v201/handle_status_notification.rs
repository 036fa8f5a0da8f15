//! StatusNotification handler
//!
//! The connector number of the 2.0.1 message is its `evseId`.

use rust_ocpp::v2_0_1::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use serde_json::Value;
use tracing::debug;

use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV201};
use crate::domain::{ConnectorUpdate, ProtocolError};

pub async fn handle_status_notification(
    handler: &OcppHandlerV201,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: StatusNotificationRequest = parse(payload)?;
    debug!(
        charge_point_id = handler.charge_point_id.as_str(),
        evse_id = req.evse_id as i64,
        connector_id = req.connector_id as i64,
        "StatusNotification"
    );

    let status = enum_label(&req.connector_status).unwrap_or_else(|| "Unknown".to_string());
    handler
        .services
        .connector_status(
            &handler.charge_point_id,
            req.evse_id as i32,
            ConnectorUpdate::status(status, req.timestamp),
        )
        .await?;

    to_payload(&StatusNotificationResponse {})
}
