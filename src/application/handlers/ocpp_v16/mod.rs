//! OCPP 1.6 action handlers
//!
//! Payloads are deserialized into `rust_ocpp::v1_6` types inside each
//! handler. A payload that does not deserialize is a FormationViolation.

use rust_ocpp::v1_6::types::{AuthorizationStatus, IdTagInfo};
use serde_json::Value;
use tracing::warn;

use crate::application::authorization::AuthorizationReply;
use crate::application::handlers::OcppHandlerV16;
use crate::domain::{AuthStatus, ProtocolError};

mod handle_authorize;
mod handle_boot_notification;
mod handle_data_transfer;
mod handle_heartbeat;
mod handle_meter_values;
mod handle_start_transaction;
mod handle_status_notification;
mod handle_status_reports;
mod handle_stop_transaction;

use handle_authorize::handle_authorize;
use handle_boot_notification::handle_boot_notification;
use handle_data_transfer::handle_data_transfer;
use handle_heartbeat::handle_heartbeat;
use handle_meter_values::handle_meter_values;
use handle_start_transaction::handle_start_transaction;
use handle_status_notification::handle_status_notification;
use handle_status_reports::{
    handle_diagnostics_status_notification, handle_firmware_status_notification,
};
use handle_stop_transaction::handle_stop_transaction;

/// Routes an OCPP 1.6 action to its handler.
pub async fn action_matcher(
    handler: &OcppHandlerV16,
    action: &str,
    payload: Value,
) -> Result<Value, ProtocolError> {
    match action {
        "Authorize" => handle_authorize(handler, payload).await,
        "BootNotification" => handle_boot_notification(handler, payload).await,
        "DataTransfer" => handle_data_transfer(handler, payload).await,
        "DiagnosticsStatusNotification" => {
            handle_diagnostics_status_notification(handler, payload).await
        }
        "FirmwareStatusNotification" => handle_firmware_status_notification(handler, payload).await,
        "Heartbeat" => handle_heartbeat(handler, payload).await,
        "MeterValues" => handle_meter_values(handler, payload).await,
        "StartTransaction" => handle_start_transaction(handler, payload).await,
        "StatusNotification" => handle_status_notification(handler, payload).await,
        "StopTransaction" => handle_stop_transaction(handler, payload).await,
        unknown => {
            warn!(
                charge_point_id = handler.charge_point_id.as_str(),
                action = unknown,
                "Unknown OCPP 1.6 action"
            );
            Err(ProtocolError::NotSupported(unknown.to_string()))
        }
    }
}

fn authorization_status(status: AuthStatus) -> AuthorizationStatus {
    match status {
        AuthStatus::Accepted => AuthorizationStatus::Accepted,
        AuthStatus::Blocked => AuthorizationStatus::Blocked,
        AuthStatus::Expired => AuthorizationStatus::Expired,
        AuthStatus::Invalid => AuthorizationStatus::Invalid,
        AuthStatus::ConcurrentTx => AuthorizationStatus::ConcurrentTx,
    }
}

pub(super) fn id_tag_info(reply: &AuthorizationReply) -> IdTagInfo {
    IdTagInfo {
        status: authorization_status(reply.status),
        expiry_date: Some(reply.expiry),
        parent_id_tag: reply.parent_tag.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::harness;
    use crate::domain::{ProtocolHandler, RepositoryProvider, TransactionStatus};
    use serde_json::json;

    async fn handler() -> (crate::application::handlers::test_support::Harness, OcppHandlerV16) {
        let h = harness().await;
        let handler = OcppHandlerV16::new("CP1", h.services.clone(), h.live.clone());
        (h, handler)
    }

    #[tokio::test]
    async fn unknown_action_is_not_supported() {
        let (_h, handler) = handler().await;
        let err = handler.handle_call("Foo", json!({})).await.unwrap_err();
        assert_eq!(err, ProtocolError::NotSupported("Foo".into()));
    }

    #[tokio::test]
    async fn malformed_payload_is_formation_violation() {
        let (_h, handler) = handler().await;
        let err = handler
            .handle_call("StartTransaction", json!({"connectorId": "one"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FormationViolation(_)));
    }

    #[tokio::test]
    async fn authorize_strips_vendor_suffix() {
        let (_h, handler) = handler().await;
        let reply = handler
            .handle_call("Authorize", json!({"idTag": "ABC123_99"}))
            .await
            .unwrap();
        assert_eq!(reply["idTagInfo"]["status"], "Accepted");
        assert!(reply["idTagInfo"]["expiryDate"].is_string());
    }

    #[tokio::test]
    async fn start_stop_flow_over_payloads() {
        let (h, handler) = handler().await;
        let started = handler
            .handle_call(
                "StartTransaction",
                json!({
                    "connectorId": 1,
                    "idTag": "ABC123",
                    "meterStart": 1000,
                    "timestamp": "2024-05-01T10:00:00Z"
                }),
            )
            .await
            .unwrap();
        assert_eq!(started["idTagInfo"]["status"], "Accepted");
        let tx_id = started["transactionId"].as_i64().unwrap();

        let stopped = handler
            .handle_call(
                "StopTransaction",
                json!({
                    "transactionId": tx_id,
                    "idTag": "ABC123",
                    "meterStop": 5000,
                    "timestamp": "2024-05-01T11:00:00Z",
                    "reason": "Local"
                }),
            )
            .await
            .unwrap();
        assert_eq!(stopped["idTagInfo"]["status"], "Accepted");

        let tx = h
            .repos
            .transactions()
            .find_by_id(tx_id as i32)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.stop_reason.as_deref(), Some("Local"));
        assert_eq!(tx.energy_kwh(), Some(4.0));
    }

    #[tokio::test]
    async fn meter_values_are_normalised() {
        let (h, handler) = handler().await;
        handler
            .handle_call(
                "MeterValues",
                json!({
                    "connectorId": 1,
                    "meterValue": [{
                        "timestamp": "2024-05-01T10:05:00Z",
                        "sampledValue": [
                            {"value": "7018", "measurand": "Power.Active.Import", "unit": "W"},
                            {"value": "2662", "measurand": "Energy.Active.Import.Register", "unit": "Wh"}
                        ]
                    }]
                }),
            )
            .await
            .unwrap();

        let live = h.live.get(1).unwrap();
        assert!((live.charge_rate_kw.unwrap() - 7.018).abs() < 1e-9);
        let connector = h.repos.connectors().find("CP1", 1).await.unwrap().unwrap();
        assert!((connector.last_meter.unwrap() - 2.662).abs() < 1e-9);
    }

    #[tokio::test]
    async fn status_notification_upserts_connector() {
        let (h, handler) = handler().await;
        handler
            .handle_call(
                "StatusNotification",
                json!({"connectorId": 2, "errorCode": "NoError", "status": "Charging"}),
            )
            .await
            .unwrap();
        let connector = h.repos.connectors().find("CP1", 2).await.unwrap().unwrap();
        assert_eq!(connector.last_status.as_deref(), Some("Charging"));
        assert_eq!(connector.error_code.as_deref(), Some("NoError"));

        handler
            .handle_call(
                "StatusNotification",
                json!({"connectorId": 0, "errorCode": "NoError", "status": "Available"}),
            )
            .await
            .unwrap();
        assert!(h.repos.connectors().find("CP1", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn boot_of_unknown_station_is_rejected() {
        let h = harness().await;
        let stranger = OcppHandlerV16::new("CP9", h.services.clone(), h.live.clone());
        let reply = stranger
            .handle_call(
                "BootNotification",
                json!({"chargePointVendor": "V", "chargePointModel": "M"}),
            )
            .await
            .unwrap();
        assert_eq!(reply["status"], "Rejected");
        assert_eq!(reply["interval"], 300);

        let (h, handler) = handler().await;
        let reply = handler
            .handle_call(
                "BootNotification",
                json!({"chargePointVendor": "V", "chargePointModel": "M", "iccid": "8901"}),
            )
            .await
            .unwrap();
        assert_eq!(reply["status"], "Accepted");
        let station = h.repos.stations().find_by_id("CP1").await.unwrap().unwrap();
        assert_eq!(station.vendor.as_deref(), Some("V"));
        assert_eq!(station.iccid.as_deref(), Some("8901"));
    }
}
