//! DiagnosticsStatusNotification and FirmwareStatusNotification handlers

use rust_ocpp::v1_6::messages::diagnostics_status_notification::{
    DiagnosticsStatusNotificationRequest, DiagnosticsStatusNotificationResponse,
};
use rust_ocpp::v1_6::messages::firmware_status_notification::{
    FirmwareStatusNotificationRequest, FirmwareStatusNotificationResponse,
};
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV16};
use crate::domain::ProtocolError;

pub async fn handle_diagnostics_status_notification(
    handler: &OcppHandlerV16,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: DiagnosticsStatusNotificationRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        status = enum_label(&req.status).as_deref().unwrap_or("-"),
        "DiagnosticsStatusNotification"
    );
    to_payload(&DiagnosticsStatusNotificationResponse {})
}

pub async fn handle_firmware_status_notification(
    handler: &OcppHandlerV16,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: FirmwareStatusNotificationRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        status = enum_label(&req.status).as_deref().unwrap_or("-"),
        "FirmwareStatusNotification"
    );
    to_payload(&FirmwareStatusNotificationResponse {})
}
