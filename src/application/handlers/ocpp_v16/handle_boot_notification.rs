//! BootNotification handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::types::RegistrationStatus;
use serde_json::Value;
use tracing::info;

use crate::application::handlers::{parse, to_payload, OcppHandlerV16};
use crate::domain::{BootInfo, ProtocolError};

pub async fn handle_boot_notification(
    handler: &OcppHandlerV16,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: BootNotificationRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        vendor = req.charge_point_vendor.as_str(),
        model = req.charge_point_model.as_str(),
        "BootNotification"
    );

    let boot = BootInfo {
        vendor: req.charge_point_vendor,
        model: req.charge_point_model,
        charge_point_serial: req.charge_point_serial_number,
        charge_box_serial: req.charge_box_serial_number,
        firmware_version: req.firmware_version,
        iccid: req.iccid,
        imsi: req.imsi,
        meter_type: req.meter_type,
        meter_serial: req.meter_serial_number,
    };
    let known = handler.services.boot(&handler.charge_point_id, &boot).await?;

    to_payload(&BootNotificationResponse {
        current_time: Utc::now(),
        interval: handler.services.heartbeat_interval as _,
        status: if known {
            RegistrationStatus::Accepted
        } else {
            RegistrationStatus::Rejected
        },
    })
}
