//! Notifications that are only logged

use serde_json::{json, Value};
use tracing::info;

use crate::application::handlers::{str_field, OcppHandlerV201};
use crate::domain::ProtocolError;

/// LogStatusNotification, FirmwareStatusNotification, ClearedChargingLimit
/// and NotifyChargingLimit.
pub async fn handle_logged(
    handler: &OcppHandlerV201,
    action: &str,
    payload: Value,
) -> Result<Value, ProtocolError> {
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        action,
        status = str_field(&payload, "/status"),
        source = str_field(&payload, "/chargingLimitSource"),
        "Notification"
    );
    Ok(json!({}))
}

pub async fn handle_notify_ev_charging_schedule(
    handler: &OcppHandlerV201,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let evse_id = payload.get("evseId").and_then(Value::as_i64);
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        evse_id,
        "NotifyEVChargingSchedule"
    );
    Ok(json!({ "status": "Accepted" }))
}
