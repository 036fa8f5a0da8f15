//! StatusNotification handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use serde_json::Value;

use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV16};
use crate::domain::{ConnectorUpdate, ProtocolError};

pub async fn handle_status_notification(
    handler: &OcppHandlerV16,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: StatusNotificationRequest = parse(payload)?;

    let status = enum_label(&req.status).unwrap_or_else(|| "Unknown".to_string());
    let update = ConnectorUpdate {
        error_code: enum_label(&req.error_code),
        info: req.info,
        vendor_id: req.vendor_id,
        vendor_error_code: req.vendor_error_code,
        ..ConnectorUpdate::status(status, req.timestamp.unwrap_or_else(Utc::now))
    };

    handler
        .services
        .connector_status(&handler.charge_point_id, req.connector_id as i32, update)
        .await?;

    to_payload(&StatusNotificationResponse {})
}
