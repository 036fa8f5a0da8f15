//! BootNotification handler

use chrono::Utc;
use rust_ocpp::v2_0_1::enumerations::registration_status_enum_type::RegistrationStatusEnumType;
use rust_ocpp::v2_0_1::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use serde_json::{json, Value};
use tracing::info;

use crate::application::handlers::{parse, to_payload, OcppHandlerV201};
use crate::domain::{BootInfo, ProtocolError};

fn modem_field(payload: &Value, field: &str) -> Option<String> {
    payload
        .pointer(&format!("/chargingStation/modem/{}", field))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub async fn handle_boot_notification(
    handler: &OcppHandlerV201,
    mut payload: Value,
) -> Result<Value, ProtocolError> {
    // Some stations omit the mandatory `reason`.
    if let Some(obj) = payload.as_object_mut() {
        obj.entry("reason").or_insert(json!("PowerUp"));
    }
    let iccid = modem_field(&payload, "iccid");
    let imsi = modem_field(&payload, "imsi");

    let req: BootNotificationRequest = parse(payload)?;
    let cs = req.charging_station;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        vendor = cs.vendor_name.as_str(),
        model = cs.model.as_str(),
        reason = ?req.reason,
        "BootNotification"
    );

    let boot = BootInfo {
        vendor: cs.vendor_name,
        model: cs.model,
        charge_point_serial: cs.serial_number,
        charge_box_serial: None,
        firmware_version: cs.firmware_version,
        iccid,
        imsi,
        meter_type: None,
        meter_serial: None,
    };
    let known = handler.services.boot(&handler.charge_point_id, &boot).await?;

    to_payload(&BootNotificationResponse {
        current_time: Utc::now(),
        interval: handler.services.heartbeat_interval as _,
        status: if known {
            RegistrationStatusEnumType::Accepted
        } else {
            RegistrationStatusEnumType::Rejected
        },
        status_info: None,
    })
}
