//! TransactionEvent handler
//!
//! - **Started**: opens (or re-uses) the server transaction and links the
//!   station's transaction id to it
//! - **Updated**: meter and live metrics of the connector
//! - **Ended**: validates the stop token and closes the transaction

use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::messages::transaction_event::{
    TransactionEventRequest, TransactionEventResponse,
};
use serde_json::Value;
use tracing::{info, warn};

use super::handle_meter_values::snapshot;
use super::id_token_info;
use crate::application::authorization::{clean_tag_id, AuthorizationReply};
use crate::application::connectors::MeterSnapshot;
use crate::application::handlers::{enum_label, parse, to_payload, OcppHandlerV201};
use crate::application::transactions::{StartRequest, StopRequest};
use crate::domain::{AuthStatus, ProtocolError, RepositoryProvider, Transaction, INVALID_ID};

/// Connector assumed when a Started event names no EVSE.
const DEFAULT_EVSE: i32 = 1;

fn response(reply: Option<&AuthorizationReply>) -> Result<Value, ProtocolError> {
    to_payload(&TransactionEventResponse {
        total_cost: None,
        charging_priority: None,
        id_token_info: reply.map(id_token_info),
        updated_personal_message: None,
    })
}

/// The station's own running session is not a concurrent one.
fn own_session(mut reply: AuthorizationReply) -> AuthorizationReply {
    if reply.status == AuthStatus::ConcurrentTx {
        reply.status = AuthStatus::Accepted;
    }
    reply
}

fn kwh_to_wh(kwh: f64) -> i64 {
    (kwh * 1000.0).round() as i64
}

pub async fn handle_transaction_event(
    handler: &OcppHandlerV201,
    payload: Value,
) -> Result<Value, ProtocolError> {
    let req: TransactionEventRequest = parse(payload)?;
    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        event_type = ?req.event_type,
        transaction_id = req.transaction_info.transaction_id.as_str(),
        trigger_reason = ?req.trigger_reason,
        evse_id = req.evse.as_ref().map(|e| e.id as i64),
        "TransactionEvent"
    );

    let meter = req.meter_value.as_deref().map(snapshot).unwrap_or_default();
    match req.event_type {
        TransactionEventEnumType::Started => handle_started(handler, &req, &meter).await,
        TransactionEventEnumType::Updated => handle_updated(handler, &req, &meter).await,
        TransactionEventEnumType::Ended => handle_ended(handler, &req, &meter).await,
    }
}

async fn by_device_uid(
    handler: &OcppHandlerV201,
    req: &TransactionEventRequest,
) -> Result<Option<Transaction>, ProtocolError> {
    Ok(handler
        .services
        .repos
        .transactions()
        .find_by_device_uid(&handler.charge_point_id, &req.transaction_info.transaction_id)
        .await?)
}

async fn record_meter(
    handler: &OcppHandlerV201,
    connector_id: i32,
    meter: &MeterSnapshot,
) -> Result<(), ProtocolError> {
    handler
        .services
        .tracker
        .record_meter(&handler.charge_point_id, connector_id, &handler.live, meter)
        .await?;
    Ok(())
}

async fn handle_started(
    handler: &OcppHandlerV201,
    req: &TransactionEventRequest,
    meter: &MeterSnapshot,
) -> Result<Value, ProtocolError> {
    let station = handler.charge_point_id.as_str();
    let uid = req.transaction_info.transaction_id.as_str();
    let transactions = handler.services.repos.transactions();

    if let Some(existing) = by_device_uid(handler, req).await? {
        if existing.status.is_open() {
            // Repeated Started for a session that is already open
            let reply = match &req.id_token {
                Some(token) => Some(own_session(
                    handler.services.transactions.authorize(station, &token.id_token).await?,
                )),
                None => None,
            };
            return response(reply.as_ref());
        }
    }

    let connector_id = req.evse.as_ref().map_or(DEFAULT_EVSE, |e| e.id as i32);
    let Some(token) = &req.id_token else {
        // No token: the session was authorized another way, e.g. a remote start
        match transactions.latest_started(station, connector_id, None).await? {
            Some(tx) if tx.device_uid.is_none() => {
                transactions.set_device_uid(tx.id, uid).await?;
                info!(
                    charge_point_id = station,
                    transaction_id = tx.id,
                    device_uid = uid,
                    "Linked station transaction id"
                );
            }
            _ => warn!(
                charge_point_id = station,
                connector_id,
                device_uid = uid,
                "TransactionEvent Started without idToken and no open transaction"
            ),
        }
        record_meter(handler, connector_id, meter).await?;
        return response(None);
    };

    let meter_start = match meter.meter_kwh {
        Some(kwh) => kwh_to_wh(kwh),
        None => handler
            .services
            .tracker
            .last_meter(station, connector_id)
            .await?
            .map_or(0, |(kwh, _)| kwh_to_wh(kwh)),
    };

    let outcome = handler
        .services
        .transactions
        .start(
            station,
            StartRequest {
                connector_id,
                tag_identifier: token.id_token.clone(),
                meter_start,
                timestamp: req.timestamp,
                device_uid: Some(uid.to_string()),
            },
        )
        .await?;

    if outcome.transaction_id != INVALID_ID {
        // A transaction opened by a remote start has no station id yet
        if let Some(tx) = transactions.find_by_id(outcome.transaction_id).await? {
            if tx.device_uid.is_none() {
                transactions.set_device_uid(tx.id, uid).await?;
            }
        }
        record_meter(handler, connector_id, meter).await?;
    }

    response(Some(&own_session(outcome.reply)))
}

async fn handle_updated(
    handler: &OcppHandlerV201,
    req: &TransactionEventRequest,
    meter: &MeterSnapshot,
) -> Result<Value, ProtocolError> {
    let tx = by_device_uid(handler, req).await?;
    let connector_id = tx
        .as_ref()
        .map(|t| t.connector_id)
        .or_else(|| req.evse.as_ref().map(|e| e.id as i32));

    match connector_id {
        Some(connector_id) => record_meter(handler, connector_id, meter).await?,
        None => warn!(
            charge_point_id = handler.charge_point_id.as_str(),
            device_uid = req.transaction_info.transaction_id.as_str(),
            "TransactionEvent Updated for unknown transaction"
        ),
    }

    let Some(token) = &req.id_token else {
        return response(None);
    };
    let mut reply = handler
        .services
        .transactions
        .authorize(&handler.charge_point_id, &token.id_token)
        .await?;
    if tx.as_ref().is_some_and(|t| t.status.is_open()) {
        reply = own_session(reply);
    }
    response(Some(&reply))
}

async fn handle_ended(
    handler: &OcppHandlerV201,
    req: &TransactionEventRequest,
    meter: &MeterSnapshot,
) -> Result<Value, ProtocolError> {
    let station = handler.charge_point_id.as_str();
    let uid = req.transaction_info.transaction_id.as_str();

    let tx = match by_device_uid(handler, req).await? {
        Some(tx) => Some(tx),
        None => match &req.evse {
            Some(evse) => {
                handler
                    .services
                    .repos
                    .transactions()
                    .latest_started(station, evse.id as i32, None)
                    .await?
            }
            None => None,
        },
    };
    let Some(tx) = tx else {
        warn!(charge_point_id = station, device_uid = uid, "TransactionEvent Ended for unknown transaction");
        return Err(ProtocolError::PropertyConstraint(format!(
            "unknown transaction '{}'",
            uid
        )));
    };

    if let Some(token) = &req.id_token {
        if !may_stop(handler, &tx, &token.id_token).await? {
            warn!(
                charge_point_id = station,
                transaction_id = tx.id,
                id_token = token.id_token.as_str(),
                "Stop token does not match the start tag or its group"
            );
            let mut reply = handler.services.transactions.authorize(station, &token.id_token).await?;
            reply.status = AuthStatus::Invalid;
            return response(Some(&reply));
        }
    }

    let meter_stop = match meter.meter_kwh {
        Some(kwh) => kwh_to_wh(kwh),
        None => match handler.services.tracker.last_meter(station, tx.connector_id).await? {
            Some((kwh, _)) => kwh_to_wh(kwh),
            None => kwh_to_wh(tx.meter_start),
        },
    };
    record_meter(handler, tx.connector_id, meter).await?;

    let transaction_data = match &req.meter_value {
        Some(values) => serde_json::to_string(values).ok(),
        None => None,
    };
    let outcome = handler
        .services
        .transactions
        .stop(
            station,
            StopRequest {
                transaction_id: tx.id,
                tag_identifier: req.id_token.as_ref().map(|t| t.id_token.clone()),
                meter_stop,
                timestamp: req.timestamp,
                reason: req.transaction_info.stopped_reason.as_ref().and_then(enum_label),
                transaction_data,
            },
        )
        .await?;

    match &req.id_token {
        Some(_) => response(Some(&outcome.reply)),
        None => response(None),
    }
}

/// The stop token must be the start tag or the start tag's group.
async fn may_stop(handler: &OcppHandlerV201, tx: &Transaction, token: &str) -> Result<bool, ProtocolError> {
    let token = clean_tag_id(token);
    if token == tx.start_tag_id {
        return Ok(true);
    }
    let start_tag = handler
        .services
        .repos
        .charge_tags()
        .find_by_tag_id(&tx.start_tag_id)
        .await?;
    Ok(start_tag
        .and_then(|t| t.parent_tag_id)
        .is_some_and(|parent| parent == token))
}
