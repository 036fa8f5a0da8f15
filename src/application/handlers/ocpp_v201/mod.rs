//! OCPP 2.0.1 action handlers
//!
//! `TransactionEvent` carries what 1.6 splits over StartTransaction,
//! MeterValues and StopTransaction. The station picks the transaction id
//! (kept as `device_uid`); the server keeps its own integer id.

use rust_ocpp::v2_0_1::datatypes::id_token_info_type::IdTokenInfoType;
use rust_ocpp::v2_0_1::datatypes::id_token_type::IdTokenType;
use rust_ocpp::v2_0_1::enumerations::authorization_status_enum_type::AuthorizationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::id_token_enum_type::IdTokenEnumType;
use serde_json::Value;
use tracing::warn;

use crate::application::authorization::AuthorizationReply;
use crate::application::handlers::OcppHandlerV201;
use crate::domain::{AuthStatus, ProtocolError};

mod handle_authorize;
mod handle_boot_notification;
mod handle_data_transfer;
mod handle_heartbeat;
mod handle_meter_values;
mod handle_notifications;
mod handle_status_notification;
mod handle_transaction_event;

use handle_authorize::handle_authorize;
use handle_boot_notification::handle_boot_notification;
use handle_data_transfer::handle_data_transfer;
use handle_heartbeat::handle_heartbeat;
use handle_meter_values::handle_meter_values;
use handle_notifications::{handle_logged, handle_notify_ev_charging_schedule};
use handle_status_notification::handle_status_notification;
use handle_transaction_event::handle_transaction_event;

/// Routes an OCPP 2.0.1 action to its handler.
pub async fn action_matcher(
    handler: &OcppHandlerV201,
    action: &str,
    payload: Value,
) -> Result<Value, ProtocolError> {
    match action {
        "Authorize" => handle_authorize(handler, payload).await,
        "BootNotification" => handle_boot_notification(handler, payload).await,
        "DataTransfer" => handle_data_transfer(handler, payload).await,
        "Heartbeat" => handle_heartbeat(handler, payload).await,
        "MeterValues" => handle_meter_values(handler, payload).await,
        "StatusNotification" => handle_status_notification(handler, payload).await,
        "TransactionEvent" => handle_transaction_event(handler, payload).await,
        "NotifyEVChargingSchedule" => handle_notify_ev_charging_schedule(handler, payload).await,
        "LogStatusNotification"
        | "FirmwareStatusNotification"
        | "ClearedChargingLimit"
        | "NotifyChargingLimit" => handle_logged(handler, action, payload).await,
        unknown => {
            warn!(
                charge_point_id = handler.charge_point_id.as_str(),
                action = unknown,
                "Unknown OCPP 2.0.1 action"
            );
            Err(ProtocolError::NotSupported(unknown.to_string()))
        }
    }
}

pub(super) fn authorization_status(status: AuthStatus) -> AuthorizationStatusEnumType {
    match status {
        AuthStatus::Accepted => AuthorizationStatusEnumType::Accepted,
        AuthStatus::Blocked => AuthorizationStatusEnumType::Blocked,
        AuthStatus::Expired => AuthorizationStatusEnumType::Expired,
        AuthStatus::Invalid => AuthorizationStatusEnumType::Invalid,
        AuthStatus::ConcurrentTx => AuthorizationStatusEnumType::ConcurrentTx,
    }
}

pub(super) fn id_token_info(reply: &AuthorizationReply) -> IdTokenInfoType {
    IdTokenInfoType {
        status: authorization_status(reply.status),
        cache_expiry_date_time: Some(reply.expiry),
        charging_priority: None,
        language1: None,
        evse_id: None,
        language2: None,
        group_id_token: reply.parent_tag.as_ref().map(|parent| IdTokenType {
            id_token: parent.clone(),
            kind: IdTokenEnumType::Central,
            additional_info: None,
        }),
        personal_message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{harness, Harness};
    use crate::domain::{ProtocolHandler, RepositoryProvider};
    use serde_json::json;

    async fn handler() -> (Harness, OcppHandlerV201) {
        let h = harness().await;
        let handler = OcppHandlerV201::new("CP1", h.services.clone(), h.live.clone());
        (h, handler)
    }

    #[tokio::test]
    async fn unknown_action_is_not_supported() {
        let (_h, handler) = handler().await;
        let err = handler.handle_call("StartTransaction", json!({})).await.unwrap_err();
        assert_eq!(err, ProtocolError::NotSupported("StartTransaction".into()));
    }

    #[tokio::test]
    async fn authorize_returns_id_token_info() {
        let (_h, handler) = handler().await;
        let reply = handler
            .handle_call(
                "Authorize",
                json!({"idToken": {"idToken": "ABC123", "type": "ISO14443"}}),
            )
            .await
            .unwrap();
        assert_eq!(reply["idTokenInfo"]["status"], "Accepted");
        assert!(reply["idTokenInfo"]["cacheExpiryDateTime"].is_string());

        let reply = handler
            .handle_call(
                "Authorize",
                json!({"idToken": {"idToken": "NOPE", "type": "ISO14443"}}),
            )
            .await
            .unwrap();
        assert_eq!(reply["idTokenInfo"]["status"], "Invalid");
    }

    #[tokio::test]
    async fn boot_without_reason_is_accepted() {
        let (h, handler) = handler().await;
        let reply = handler
            .handle_call(
                "BootNotification",
                json!({
                    "chargingStation": {
                        "vendorName": "V",
                        "model": "M",
                        "modem": {"iccid": "8901", "imsi": "2400"}
                    }
                }),
            )
            .await
            .unwrap();
        assert_eq!(reply["status"], "Accepted");
        let station = h.repos.stations().find_by_id("CP1").await.unwrap().unwrap();
        assert_eq!(station.model.as_deref(), Some("M"));
        assert_eq!(station.imsi.as_deref(), Some("2400"));
    }

    #[tokio::test]
    async fn status_notification_uses_evse_id() {
        let (h, handler) = handler().await;
        handler
            .handle_call(
                "StatusNotification",
                json!({
                    "timestamp": "2024-05-01T10:00:00Z",
                    "connectorStatus": "Occupied",
                    "evseId": 2,
                    "connectorId": 1
                }),
            )
            .await
            .unwrap();
        let connector = h.repos.connectors().find("CP1", 2).await.unwrap().unwrap();
        assert_eq!(connector.last_status.as_deref(), Some("Occupied"));
    }

    #[tokio::test]
    async fn meter_values_apply_multiplier() {
        let (h, handler) = handler().await;
        handler
            .handle_call(
                "MeterValues",
                json!({
                    "evseId": 1,
                    "meterValue": [{
                        "timestamp": "2024-05-01T10:05:00Z",
                        "sampledValue": [
                            {"value": 7.2, "measurand": "Power.Active.Import",
                             "unitOfMeasure": {"unit": "W", "multiplier": 3}},
                            {"value": 2662, "measurand": "Energy.Active.Import.Register"}
                        ]
                    }]
                }),
            )
            .await
            .unwrap();
        let live = h.live.get(1).unwrap();
        assert!((live.charge_rate_kw.unwrap() - 7.2).abs() < 1e-9);
        let connector = h.repos.connectors().find("CP1", 1).await.unwrap().unwrap();
        assert!((connector.last_meter.unwrap() - 2.662).abs() < 1e-9);
    }

    #[tokio::test]
    async fn logged_actions_reply() {
        let (_h, handler) = handler().await;
        let reply = handler
            .handle_call("LogStatusNotification", json!({"status": "Uploaded"}))
            .await
            .unwrap();
        assert_eq!(reply, json!({}));
        let reply = handler
            .handle_call("NotifyEVChargingSchedule", json!({"evseId": 1}))
            .await
            .unwrap();
        assert_eq!(reply["status"], "Accepted");
        let reply = handler
            .handle_call("DataTransfer", json!({"vendorId": "acme"}))
            .await
            .unwrap();
        assert_eq!(reply["status"], "Accepted");
    }
}
